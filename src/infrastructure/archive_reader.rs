//! Combined access to the primary export and the optional raw dump.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use crate::domain::{AppError, Result};

use super::nsx_reader::{Manifest, NsxReader};
use super::raw_archive::{RawArchive, RawEntry};

/// Entity and blob lookup over both containers.
pub struct ArchiveReader<R: Read + Seek = BufReader<File>> {
    primary: NsxReader<R>,
    secondary: Option<RawArchive>,
}

impl ArchiveReader {
    /// Opens the export and, when given and present, the raw dump.
    ///
    /// A missing dump file is logged and treated as absent.
    ///
    /// # Errors
    /// Returns error if the export cannot be opened or the dump is unreadable.
    pub fn open(export: &Path, raw: Option<&Path>) -> Result<Self> {
        let primary = NsxReader::open(export)?;

        let secondary = match raw {
            Some(path) => match RawArchive::open(path) {
                Ok(archive) => Some(archive),
                Err(AppError::ArchiveNotFound { path }) => {
                    tracing::warn!("Raw archive not found, continuing without it: {}", path.display());
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        Ok(Self { primary, secondary })
    }
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Assembles a reader from already opened containers.
    pub const fn new(primary: NsxReader<R>, secondary: Option<RawArchive>) -> Self {
        Self { primary, secondary }
    }

    /// Reads the primary container's manifest.
    ///
    /// # Errors
    /// Returns error if the manifest is missing or malformed.
    pub fn manifest(&self) -> Result<Manifest> {
        self.primary.manifest()
    }

    /// Reads an entity description from the primary container.
    ///
    /// # Errors
    /// Returns error if the entity is missing.
    pub fn read_entity(&self, id: &str) -> Result<Vec<u8>> {
        self.primary.read_entity(id)
    }

    /// Reads a blob from the primary container.
    ///
    /// # Errors
    /// Returns error if the blob exists but cannot be read.
    pub fn read_blob(&self, md5: &str) -> Result<Option<Vec<u8>>> {
        self.primary.read_blob(md5)
    }

    /// Whether a raw dump is available.
    #[must_use]
    pub const fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    /// Raw dump entries for a note, or `None` without a dump.
    #[must_use]
    pub fn secondary_entries(&self, note_id: &str) -> Option<Vec<RawEntry>> {
        self.secondary
            .as_ref()
            .map(|raw| raw.entries_for(note_id).cloned().collect())
    }

    /// Reads a raw dump entry.
    ///
    /// # Errors
    /// Returns `SecondaryUnavailable` without a dump, or an archive error.
    pub fn read_secondary_entry(&self, path: &str) -> Result<Vec<u8>> {
        self.secondary
            .as_ref()
            .ok_or(AppError::SecondaryUnavailable)?
            .read_entry(path)
    }

    /// Reads several raw dump entries in one pass.
    ///
    /// # Errors
    /// Returns `SecondaryUnavailable` without a dump, or an archive error.
    pub fn read_secondary_entries(
        &self,
        paths: &[&str],
    ) -> Result<std::collections::HashMap<String, Vec<u8>>> {
        self.secondary
            .as_ref()
            .ok_or(AppError::SecondaryUnavailable)?
            .read_entries(paths)
    }
}
