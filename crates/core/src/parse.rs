//! Parse entry points: bytes, readers, paths and an async wrapper.
//!
//! Every entry point is a pure function of the archive bytes and the options;
//! nothing is cached between calls.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use crate::archive::Archive;
use crate::document::Book;
use crate::error::ParseError;
use crate::readers::{EpubReader, ParseOptions};

/// Parse an in-memory EPUB with default options.
pub fn parse_epub_bytes(bytes: &[u8]) -> Result<Book, ParseError> {
    parse_epub_bytes_with(bytes, &ParseOptions::default())
}

pub fn parse_epub_bytes_with(bytes: &[u8], opts: &ParseOptions) -> Result<Book, ParseError> {
    EpubReader::read(Cursor::new(bytes), opts)
}

/// Parse from a seekable source.
pub fn parse_epub_reader<R: Read + Seek>(input: R, opts: &ParseOptions) -> Result<Book, ParseError> {
    EpubReader::read(input, opts)
}

/// Parse from a forward-only stream. The stream is buffered in full first.
pub fn parse_epub_stream<R: Read>(input: R, opts: &ParseOptions) -> Result<Book, ParseError> {
    let archive = Archive::from_stream(input, &opts.security)?;
    EpubReader::read_archive(&archive, opts)
}

pub fn parse_epub_path(path: &Path, opts: &ParseOptions) -> Result<Book, ParseError> {
    let file = File::open(path)?;
    tracing::debug!("Parsing {}", path.display());
    EpubReader::read(BufReader::new(file), opts)
}

/// Run the parse on tokio's blocking pool so an async caller is never stalled.
pub async fn parse_epub_async(bytes: Vec<u8>, opts: ParseOptions) -> Result<Book, ParseError> {
    tokio::task::spawn_blocking(move || parse_epub_bytes_with(&bytes, &opts))
        .await
        .map_err(|e| ParseError::Join(e.to_string()))?
}
