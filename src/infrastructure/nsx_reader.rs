//! Reader for NoteStation `.nsx` exports.
//!
//! An export is a zip archive holding a `config.json` manifest, one JSON
//! entry per notebook/note id and one `file_<md5>` entry per attachment.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use serde::Deserialize;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::domain::{AppError, Result};

/// Name of the manifest entry.
const MANIFEST_NAME: &str = "config.json";

/// Prefix of attachment blob entries.
const BLOB_PREFIX: &str = "file_";

/// Entity ids enumerated by the manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub notebook: Vec<String>,
    #[serde(default)]
    pub note: Vec<String>,
    #[serde(default)]
    pub shortcut: Vec<String>,
}

/// Random-access reader over the primary export container.
pub struct NsxReader<R: Read + Seek = BufReader<File>> {
    archive: RefCell<ZipArchive<R>>,
    names: HashSet<String>,
}

impl NsxReader {
    /// Opens an export file.
    ///
    /// # Errors
    /// Returns error if the file is missing or not a zip archive.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(AppError::ArchiveNotFound {
                path: path.to_path_buf(),
            });
        }

        let file = File::open(path)
            .map_err(|e| AppError::io(format!("Failed to open {}", path.display()), e))?;

        tracing::info!("Opening export: {}", path.display());
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> NsxReader<R> {
    /// Wraps any seekable zip source.
    ///
    /// # Errors
    /// Returns error if the source is not a zip archive.
    pub fn from_reader(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader)
            .map_err(|e| AppError::archive("Failed to read export archive", e))?;
        let names: HashSet<String> = archive.file_names().map(String::from).collect();

        tracing::debug!("Export holds {} entries", names.len());

        Ok(Self {
            archive: RefCell::new(archive),
            names,
        })
    }

    /// Reads and parses the manifest.
    ///
    /// # Errors
    /// Returns error if the manifest is missing or malformed.
    pub fn manifest(&self) -> Result<Manifest> {
        let data = self.read_entity(MANIFEST_NAME)?;
        serde_json::from_slice(&data).map_err(AppError::json_parse)
    }

    /// Reads an entity entry by id.
    ///
    /// # Errors
    /// Returns error if the entry does not exist or cannot be read.
    pub fn read_entity(&self, id: &str) -> Result<Vec<u8>> {
        self.read_entry(id)?.ok_or_else(|| AppError::EntryNotFound {
            name: id.to_string(),
        })
    }

    /// Reads an attachment blob by content hash.
    ///
    /// # Errors
    /// Returns error if the blob exists but cannot be read.
    pub fn read_blob(&self, md5: &str) -> Result<Option<Vec<u8>>> {
        self.read_entry(&blob_name(md5))
    }

    fn read_entry(&self, name: &str) -> Result<Option<Vec<u8>>> {
        if !self.names.contains(name) {
            return Ok(None);
        }

        let mut archive = self.archive.borrow_mut();
        let mut entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(AppError::archive(format!("Failed to open entry {name}"), e)),
        };

        let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
        entry
            .read_to_end(&mut data)
            .map_err(|e| AppError::io(format!("Failed to read entry {name}"), e))?;

        Ok(Some(data))
    }
}

fn blob_name(md5: &str) -> String {
    format!("{BLOB_PREFIX}{md5}")
}
