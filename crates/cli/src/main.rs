use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use epub_normalize_core::config::{
    config_path, load_config, load_config_from, parse_options_from_config, save_config,
    set_config_key, AppConfig,
};
use epub_normalize_core::document::Book;
use epub_normalize_core::parse_epub_path;
use epub_normalize_core::storage::{BookStore, DirStore};
use epub_normalize_core::structured::{split_units, BodyUnit};

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "epub-normalize")]
#[command(about = "Parse EPUB files into chapters of structured text, images, cover and TOC")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show book metadata and counts
    Info {
        /// Input file
        #[arg(required = true)]
        input: String,
    },

    /// List chapters
    Chapters {
        /// Input file
        #[arg(required = true)]
        input: String,

        /// Print full chapter bodies
        #[arg(long)]
        full: bool,
    },

    /// Print the table of contents
    Toc {
        /// Input file
        #[arg(required = true)]
        input: String,
    },

    /// Parse a book and store it in a folder
    Export {
        /// Input file
        #[arg(required = true)]
        input: String,

        /// Storage root (defaults to export.output_dir, then the current directory)
        #[arg(short, long)]
        out: Option<String>,

        /// Folder name under the root (defaults to the book's file name)
        #[arg(long)]
        folder: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Initialize default config file
    Init,
    /// Show current configuration
    Show,
    /// Print the config file location
    Path,
    /// Set a configuration value
    Set {
        /// Key (section.name)
        key: String,
        /// Value
        value: String,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Info { input } => run_info(input, cli.json),
        Commands::Chapters { input, full } => run_chapters(input, *full, cli.json),
        Commands::Toc { input } => run_toc(input, cli.json),
        Commands::Export { input, out, folder } => {
            run_export(input, out.as_deref(), folder.as_deref(), cli.json)
        }
        Commands::Config { action } => run_config(action, cli.json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_book(input: &str) -> Result<Book, Box<dyn std::error::Error + Send + Sync>> {
    let path = Path::new(input);
    if !path.exists() {
        return Err(format!("Input file not found: {}", path.display()).into());
    }
    let opts = parse_options_from_config(&load_config());
    tracing::debug!("Parse options: {:?}", opts);
    Ok(parse_epub_path(path, &opts)?)
}

#[derive(Serialize)]
struct InfoView<'a> {
    title: &'a str,
    author: Option<&'a str>,
    description: Option<&'a str>,
    file_name: &'a str,
    cover: Option<&'a str>,
    chapters: usize,
    images: usize,
    toc_entries: usize,
}

fn run_info(input: &str, json: bool) -> CliResult {
    let book = load_book(input)?;
    let view = InfoView {
        title: &book.title,
        author: book.author.as_deref(),
        description: book.description.as_deref(),
        file_name: &book.file_name,
        cover: book.cover.as_ref().map(|c| c.path.as_str()),
        chapters: book.chapters.len(),
        images: book.images.len(),
        toc_entries: book.toc.len(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("Title: {}", view.title);
        if let Some(author) = view.author {
            println!("Author: {}", author);
        }
        if let Some(description) = view.description {
            println!("Description: {}", description);
        }
        if let Some(cover) = view.cover {
            println!("Cover: {}", cover);
        }
        println!("Chapters: {}", view.chapters);
        println!("Images: {}", view.images);
        println!("TOC entries: {}", view.toc_entries);
    }
    Ok(())
}

#[derive(Serialize)]
struct ChapterView<'a> {
    ordinal: usize,
    title: Option<&'a str>,
    path: &'a str,
    paragraphs: usize,
    images: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
}

fn run_chapters(input: &str, full: bool, json: bool) -> CliResult {
    let book = load_book(input)?;
    let views: Vec<ChapterView<'_>> = book
        .chapters
        .iter()
        .map(|c| {
            let units = split_units(&c.body);
            let images = units.iter().filter(|u| matches!(u, BodyUnit::Image(_))).count();
            ChapterView {
                ordinal: c.ordinal,
                title: c.title.as_deref(),
                path: &c.path,
                paragraphs: units.len() - images,
                images,
                body: full.then_some(c.body.as_str()),
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }
    for view in &views {
        println!(
            "{:>4}  {}  ({}, {} paragraphs, {} images)",
            view.ordinal,
            view.title.unwrap_or("(untitled)"),
            view.path,
            view.paragraphs,
            view.images
        );
        if let Some(body) = view.body {
            println!("{}", body);
        }
    }
    Ok(())
}

fn run_toc(input: &str, json: bool) -> CliResult {
    let book = load_book(input)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&book.toc)?);
        return Ok(());
    }
    if book.toc.is_empty() {
        println!("(no table of contents)");
    }
    for entry in &book.toc {
        println!("{}{}  -> {}", "  ".repeat(entry.depth), entry.title, entry.target_path);
    }
    Ok(())
}

fn run_export(input: &str, out: Option<&str>, folder: Option<&str>, json: bool) -> CliResult {
    let cfg = load_config();
    let book = load_book(input)?;

    let root = out
        .map(PathBuf::from)
        .or_else(|| cfg.export.output_dir.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let folder = folder.unwrap_or(&book.file_name);

    let store = DirStore::new(root).with_pretty_json(cfg.export.pretty_json);
    let stored = store.store(folder, &book)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stored)?);
    } else {
        println!(
            "Exported '{}' to {} ({} chapters, {} images{})",
            book.title,
            stored.folder.display(),
            stored.chapter_files,
            stored.image_files,
            if stored.has_cover { ", cover" } else { "" }
        );
    }
    Ok(())
}

fn run_config(action: &ConfigAction, json: bool) -> CliResult {
    match action {
        ConfigAction::Init => {
            let path = config_path()?;
            save_config(&AppConfig::default(), &path)?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Show => {
            let cfg = load_config();
            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else {
                println!("{}", toml::to_string_pretty(&cfg)?);
            }
        }
        ConfigAction::Path => {
            let path = config_path()?;
            println!("{}", path.display());
        }
        ConfigAction::Set { key, value } => {
            let path = config_path()?;
            let mut cfg = if path.exists() {
                load_config_from(&path).unwrap_or_default()
            } else {
                AppConfig::default()
            };

            set_config_key(&mut cfg, key, value)?;
            save_config(&cfg, &path)?;
            if !json {
                println!("Updated {}", key);
            }
        }
    }
    Ok(())
}
