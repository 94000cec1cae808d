//! Basic CLI integration tests.

#![allow(deprecated)] // Command::cargo_bin deprecated for custom build-dir; still works for default

use std::io::Write;
use std::path::Path;

use assert_cmd::Command;

fn write_epub(path: &Path) {
    let files: &[(&str, &str)] = &[
        ("mimetype", "application/epub+zip"),
        (
            "META-INF/container.xml",
            r#"<container><rootfiles><rootfile full-path="OEBPS/content.opf"/></rootfiles></container>"#,
        ),
        (
            "OEBPS/content.opf",
            r#"<package><metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
<dc:title>Cli Book</dc:title><dc:creator>Someone</dc:creator></metadata>
<manifest>
<item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
<item id="c1" href="c1.xhtml" media-type="application/xhtml+xml"/>
</manifest><spine><itemref idref="c1"/></spine></package>"#,
        ),
        (
            "OEBPS/toc.ncx",
            r#"<ncx><navMap><navPoint><navLabel><text>Start</text></navLabel><content src="c1.xhtml"/></navPoint></navMap></ncx>"#,
        ),
        ("OEBPS/c1.xhtml", "<html><body><h1>Intro</h1><p>Hello</p></body></html>"),
    ];

    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let opts = zip::write::SimpleFileOptions::default();
    for (name, data) in files {
        zip.start_file(*name, opts).unwrap();
        zip.write_all(data.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn cli() -> Command {
    Command::cargo_bin("epub-normalize").unwrap()
}

#[test]
fn help_prints_and_exits_success() {
    cli().arg("--help").assert().success();
}

#[test]
fn config_show_json_valid() {
    let out = cli().args(["config", "show", "--json"]).assert().success();
    let stdout = std::str::from_utf8(&out.get_output().stdout).unwrap();
    let _: serde_json::Value = serde_json::from_str(stdout).expect("config show --json should output valid JSON");
}

#[test]
fn info_nonexistent_file_fails() {
    let out = cli().args(["info", "/nonexistent/file.epub"]).assert().failure();
    let stderr = std::str::from_utf8(&out.get_output().stderr).unwrap();
    assert!(stderr.contains("Input file not found"));
}

#[test]
fn info_reports_metadata_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let epub = dir.path().join("book.epub");
    write_epub(&epub);

    let out = cli()
        .args(["info", "--json", epub.to_str().unwrap()])
        .assert()
        .success();
    let info: serde_json::Value = serde_json::from_slice(&out.get_output().stdout).unwrap();
    assert_eq!(info["title"], "Cli Book");
    assert_eq!(info["author"], "Someone");
    assert_eq!(info["chapters"], 1);
}

#[test]
fn chapters_full_prints_bodies() {
    let dir = tempfile::tempdir().unwrap();
    let epub = dir.path().join("book.epub");
    write_epub(&epub);

    let out = cli()
        .args(["chapters", "--full", "--json", epub.to_str().unwrap()])
        .assert()
        .success();
    let chapters: serde_json::Value = serde_json::from_slice(&out.get_output().stdout).unwrap();
    assert_eq!(chapters[0]["title"], "Start");
    assert_eq!(chapters[0]["body"], "Hello\n\n");
    assert_eq!(chapters[0]["paragraphs"], 1);
}

#[test]
fn toc_prints_entries() {
    let dir = tempfile::tempdir().unwrap();
    let epub = dir.path().join("book.epub");
    write_epub(&epub);

    let out = cli().args(["toc", epub.to_str().unwrap()]).assert().success();
    let stdout = std::str::from_utf8(&out.get_output().stdout).unwrap();
    assert!(stdout.contains("Start  -> OEBPS/c1.xhtml"));
}

#[test]
fn export_writes_folder() {
    let dir = tempfile::tempdir().unwrap();
    let epub = dir.path().join("book.epub");
    write_epub(&epub);
    let out_root = dir.path().join("library");

    cli()
        .args(["export", epub.to_str().unwrap(), "--out", out_root.to_str().unwrap()])
        .assert()
        .success();

    let folder = out_root.join("Cli Book");
    assert!(folder.join("book.json").is_file());
    assert_eq!(
        std::fs::read_to_string(folder.join("chapters/OEBPS/c1.xhtml.txt")).unwrap(),
        "Hello\n\n"
    );
}

#[test]
fn broken_epub_fails() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad.epub");
    std::fs::write(&bad, b"not a zip").unwrap();
    cli().args(["info", bad.to_str().unwrap()]).assert().failure();
}
