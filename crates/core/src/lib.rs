pub mod archive;
pub mod config;
pub mod document;
pub mod encoding;
pub mod error;
pub mod markup;
pub mod parse;
pub mod path;
pub mod readers;
pub mod security;
pub mod storage;
pub mod structured;

pub use parse::{
    parse_epub_async, parse_epub_bytes, parse_epub_bytes_with, parse_epub_path, parse_epub_reader,
    parse_epub_stream,
};

pub mod prelude {
    pub use crate::document::*;
    pub use crate::error::*;
    pub use crate::readers::{EpubReader, ParseOptions};
    pub use crate::structured::{split_units, BodyUnit, ImagePlaceholder};
}
