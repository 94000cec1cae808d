//! Archive reader: ZIP byte source → immutable map of archive path → bytes.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek};

use crate::encoding;
use crate::error::ParseError;
use crate::path;
use crate::security::{self, SecurityLimits};

/// Every non-directory entry of an EPUB, keyed by canonical archive path.
///
/// Built once per parse and then only read; components receive it as `&Archive`.
#[derive(Debug, Clone, Default)]
pub struct Archive {
    entries: BTreeMap<String, Vec<u8>>,
}

/// A borrowed view of one archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveEntry<'a> {
    pub path: &'a str,
    pub bytes: &'a [u8],
}

impl Archive {
    /// Read a seekable ZIP source.
    pub fn from_reader<R: Read + Seek>(input: R, limits: &SecurityLimits) -> Result<Self, ParseError> {
        let mut zip = zip::ZipArchive::new(input)?;
        limits.check_file_count(zip.len() as u64)?;

        let mut entries = BTreeMap::new();
        let mut budget = limits.budget();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if file.is_dir() {
                continue;
            }

            let raw_name = file.name().replace('\\', "/");
            if let Err(e) = security::check_path_traversal(&raw_name) {
                tracing::warn!("Skipping archive entry: {}", e);
                continue;
            }
            let name = path::normalize(&raw_name);
            if name.is_empty() {
                continue;
            }

            budget.admit(&name, file.compressed_size(), file.size())?;

            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf)
                .map_err(|e| ParseError::Archive(format!("Failed to read {name}: {e}")))?;
            limits.check_resource_size(&name, buf.len() as u64)?;

            entries.insert(name, buf);
        }

        tracing::debug!("Read {} archive entries ({} bytes)", entries.len(), budget.total());
        Ok(Self { entries })
    }

    pub fn from_bytes(bytes: &[u8], limits: &SecurityLimits) -> Result<Self, ParseError> {
        Self::from_reader(Cursor::new(bytes), limits)
    }

    /// Read a non-seekable stream. The ZIP central directory sits at the end of
    /// the file, so the stream is buffered in full first.
    pub fn from_stream<R: Read>(mut input: R, limits: &SecurityLimits) -> Result<Self, ParseError> {
        let mut buf = Vec::new();
        input
            .read_to_end(&mut buf)
            .map_err(|e| ParseError::Archive(format!("Failed to read archive stream: {e}")))?;
        Self::from_bytes(&buf, limits)
    }

    /// Build an archive from in-memory entries. Later duplicates replace earlier ones.
    pub fn from_entries<I, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, Vec<u8>)>,
        P: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(p, bytes)| (path::normalize(p.as_ref()), bytes))
                .collect(),
        }
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Entry decoded as text (BOM stripped, invalid UTF-8 replaced).
    pub fn read_text(&self, path: &str) -> Option<String> {
        self.get(path).map(encoding::decode_text)
    }

    /// Entries in path order.
    pub fn entries(&self) -> impl Iterator<Item = ArchiveEntry<'_>> {
        self.entries.iter().map(|(path, bytes)| ArchiveEntry {
            path: path.as_str(),
            bytes: bytes.as_slice(),
        })
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
