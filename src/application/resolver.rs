//! Attachment resolution across both containers.
//!
//! Blobs are looked up by content hash in the export first. When the export
//! lacks a blob, the raw dump is scanned: `version/text` entries map
//! attachment names to hashes, and each `metabinary_info` entry declares the
//! hash of the payload stored at the sibling `metabinary` path.

use std::io::{Read, Seek};

use serde::Deserialize;

use crate::domain::{AppError, ExportModel, Result};
use crate::infrastructure::{ArchiveReader, RawEntry};

const VERSION_TEXT: &str = "version/text";
const METABINARY_INFO: &str = "metabinary_info";
const METABINARY: &str = "metabinary";

/// Where resolved bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Export,
    RawArchive,
}

/// Attachment bytes and the name to store them under.
#[derive(Debug, Clone)]
pub struct ResolvedAttachment {
    pub data: Vec<u8>,
    pub file_name: String,
    pub origin: Origin,
}

#[derive(Debug, Deserialize)]
struct MetabinaryInfo {
    name: String,
}

/// Locates attachment bytes and names.
pub struct AttachmentResolver<'a, R: Read + Seek> {
    archive: &'a ArchiveReader<R>,
    model: &'a ExportModel,
}

impl<'a, R: Read + Seek> AttachmentResolver<'a, R> {
    #[must_use]
    pub const fn new(archive: &'a ArchiveReader<R>, model: &'a ExportModel) -> Self {
        Self { archive, model }
    }

    /// Resolves an attachment of a note by content hash.
    ///
    /// Without `preferred_name`, the name comes from the note's descriptor on
    /// the fast path and from the raw dump's `version/text` entries otherwise.
    ///
    /// # Errors
    /// Returns `AttachmentNotFound` when neither container yields the
    /// attachment, or an archive error if a container cannot be read.
    pub fn resolve(
        &self,
        note_id: &str,
        md5: &str,
        preferred_name: Option<&str>,
    ) -> Result<ResolvedAttachment> {
        if let Some(data) = self.archive.read_blob(md5)? {
            let file_name = preferred_name
                .map(String::from)
                .or_else(|| self.descriptor_name(note_id, md5))
                .unwrap_or_else(|| md5.to_string());

            return Ok(ResolvedAttachment {
                data,
                file_name,
                origin: Origin::Export,
            });
        }

        let Some(entries) = self.archive.secondary_entries(note_id) else {
            return Err(AppError::attachment_not_found(
                md5,
                "not in export and no raw archive available",
            ));
        };

        let file_name = match preferred_name {
            Some(name) => name.to_string(),
            None => self.discover_name(&entries, md5)?.ok_or_else(|| {
                AppError::attachment_not_found(md5, "file name not found in raw archive")
            })?,
        };

        let data = self.find_binary(&entries, md5)?.ok_or_else(|| {
            AppError::attachment_not_found(md5, format!("{file_name} not found in raw archive"))
        })?;

        tracing::debug!(note = note_id, md5, "Resolved {file_name} from raw archive");

        Ok(ResolvedAttachment {
            data,
            file_name,
            origin: Origin::RawArchive,
        })
    }

    fn descriptor_name(&self, note_id: &str, md5: &str) -> Option<String> {
        self.model
            .note_by_id(note_id)?
            .attachments
            .iter()
            .find(|a| a.md5 == md5)
            .map(|a| a.name.clone())
    }

    /// Scans `version/text` entries for a name/hash pair matching `md5`.
    ///
    /// Many of these entries are not JSON, or are JSON of another shape;
    /// those are skipped.
    fn discover_name(&self, entries: &[RawEntry], md5: &str) -> Result<Option<String>> {
        let paths: Vec<&str> = entries
            .iter()
            .filter(|e| e.is_file && e.path.contains(VERSION_TEXT))
            .map(|e| e.path.as_str())
            .collect();
        let contents = self.archive.read_secondary_entries(&paths)?;

        for path in paths {
            let Some(data) = contents.get(path) else {
                continue;
            };
            match name_for_hash(data, md5) {
                Some(name) => return Ok(Some(name)),
                None => tracing::trace!("No match in {path}"),
            }
        }
        Ok(None)
    }

    /// Finds the `metabinary_info` entry declaring `md5` and reads its payload.
    fn find_binary(&self, entries: &[RawEntry], md5: &str) -> Result<Option<Vec<u8>>> {
        let paths: Vec<&str> = entries
            .iter()
            .filter(|e| e.is_file && e.path.contains(METABINARY_INFO))
            .map(|e| e.path.as_str())
            .collect();
        let contents = self.archive.read_secondary_entries(&paths)?;

        for path in paths {
            let Some(data) = contents.get(path) else {
                continue;
            };
            let info: MetabinaryInfo = match serde_json::from_slice(data) {
                Ok(info) => info,
                Err(e) => {
                    tracing::debug!("Skipping unreadable {path}: {e}");
                    continue;
                }
            };
            if info.name != md5 {
                continue;
            }

            let binary = payload_path(path);
            return match self.archive.read_secondary_entry(&binary) {
                Ok(data) => Ok(Some(data)),
                Err(AppError::EntryNotFound { .. }) => {
                    tracing::warn!("Metadata {path} has no payload at {binary}");
                    Ok(None)
                }
                Err(e) => Err(e),
            };
        }
        Ok(None)
    }
}

/// Looks for `md5` among the `{name, md5}` values of a JSON object.
fn name_for_hash(data: &[u8], md5: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(data).ok()?;
    value.as_object()?.values().find_map(|item| {
        let name = item.get("name")?.as_str()?;
        let hash = item.get("md5")?.as_str()?;
        (hash == md5).then(|| name.to_string())
    })
}

/// Path of the payload described by a `metabinary_info` entry.
fn payload_path(info_path: &str) -> String {
    let marker = format!("/{METABINARY_INFO}/");
    match info_path.rfind(&marker) {
        Some(pos) => format!(
            "{}/{METABINARY}/{}",
            &info_path[..pos],
            &info_path[pos + marker.len()..]
        ),
        None => info_path.replacen(METABINARY_INFO, METABINARY, 1),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::Path;

    use tempfile::tempdir;

    use crate::application::extractor::load_export;
    use crate::infrastructure::nsx_reader::tests::zip_bytes;
    use crate::infrastructure::nsx_reader::NsxReader;
    use crate::infrastructure::raw_archive::tests::write_tgz;
    use crate::infrastructure::raw_archive::RawArchive;

    use super::*;

    const NOTE_JSON: &[u8] = br#"{
        "title": "Trip",
        "parent_id": "nb1",
        "attachment": {
            "a1": {"md5": "hash-primary", "name": "photo.jpg"},
            "a2": {"md5": "hash-raw", "name": "scan.pdf"}
        }
    }"#;

    /// Raw dump holding `hash-raw` under its original name `original scan.pdf`.
    fn write_dump(path: &Path) {
        write_tgz(
            path,
            &[
                ("NoteStation/n1/version/text/0001", b"plain text, not json"),
                ("NoteStation/n1/version/text/0002", br#"{"x":{"title":"no md5"}}"#),
                (
                    "NoteStation/n1/version/text/0003",
                    br#"{"k":{"name":"original scan.pdf","md5":"hash-raw"}}"#,
                ),
                ("NoteStation/n1/metabinary_info/b1", br#"{"name":"other"}"#),
                ("NoteStation/n1/metabinary_info/b2", br#"{"name":"hash-raw"}"#),
                ("NoteStation/n1/metabinary/b1", b"wrong"),
                ("NoteStation/n1/metabinary/b2", b"raw bytes"),
                ("NoteStation/n2/metabinary_info/b9", br#"{"name":"hash-raw"}"#),
            ],
            &["NoteStation/n1/"],
        );
    }

    fn export_entries() -> Vec<u8> {
        zip_bytes(&[
            ("config.json", br#"{"notebook":["nb1"],"note":["n1"]}"#),
            ("nb1", br#"{"title":"Travel"}"#),
            ("n1", NOTE_JSON),
            ("file_hash-primary", b"primary bytes"),
        ])
    }

    fn reader(with_dump: bool, dir: &Path) -> ArchiveReader<Cursor<Vec<u8>>> {
        let primary = NsxReader::from_reader(Cursor::new(export_entries())).unwrap();
        let secondary = with_dump.then(|| {
            let path = dir.join("dump.tgz");
            write_dump(&path);
            RawArchive::open(&path).unwrap()
        });
        ArchiveReader::new(primary, secondary)
    }

    #[test]
    fn test_primary_fast_path() {
        let dir = tempdir().unwrap();
        let archive = reader(true, dir.path());
        let model = load_export(&archive).unwrap();
        let resolver = AttachmentResolver::new(&archive, &model);

        let found = resolver.resolve("n1", "hash-primary", None).unwrap();
        assert_eq!(found.data, b"primary bytes");
        assert_eq!(found.file_name, "photo.jpg");
        assert_eq!(found.origin, Origin::Export);

        let named = resolver.resolve("n1", "hash-primary", Some("x.jpg")).unwrap();
        assert_eq!(named.file_name, "x.jpg");
    }

    #[test]
    fn test_primary_never_touches_raw_archive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.tgz");
        write_tgz(
            &path,
            &[
                ("NoteStation/n1/metabinary_info/b1", br#"{"name":"hash-primary"}"#),
                ("NoteStation/n1/metabinary/b1", b"raw copy"),
            ],
            &[],
        );
        let primary = NsxReader::from_reader(Cursor::new(export_entries())).unwrap();
        let archive = ArchiveReader::new(primary, Some(RawArchive::open(&path).unwrap()));
        let model = load_export(&archive).unwrap();

        // Removing the dump proves it is never opened again.
        std::fs::remove_file(&path).unwrap();

        let found = AttachmentResolver::new(&archive, &model)
            .resolve("n1", "hash-primary", None)
            .unwrap();
        assert_eq!(found.data, b"primary bytes");
    }

    #[test]
    fn test_raw_archive_with_name_discovery() {
        let dir = tempdir().unwrap();
        let archive = reader(true, dir.path());
        let model = load_export(&archive).unwrap();
        let resolver = AttachmentResolver::new(&archive, &model);

        let found = resolver.resolve("n1", "hash-raw", None).unwrap();
        assert_eq!(found.data, b"raw bytes");
        assert_eq!(found.file_name, "original scan.pdf");
        assert_eq!(found.origin, Origin::RawArchive);
    }

    #[test]
    fn test_raw_archive_with_preferred_name() {
        let dir = tempdir().unwrap();
        let archive = reader(true, dir.path());
        let model = load_export(&archive).unwrap();

        let found = AttachmentResolver::new(&archive, &model)
            .resolve("n1", "hash-raw", Some("scan_1.pdf"))
            .unwrap();
        assert_eq!(found.file_name, "scan_1.pdf");
        assert_eq!(found.data, b"raw bytes");
    }

    #[test]
    fn test_not_found_without_dump() {
        let dir = tempdir().unwrap();
        let archive = reader(false, dir.path());
        let model = load_export(&archive).unwrap();

        let err = AttachmentResolver::new(&archive, &model)
            .resolve("n1", "hash-raw", None)
            .unwrap_err();
        assert!(matches!(err, AppError::AttachmentNotFound { .. }));
    }

    #[test]
    fn test_unknown_name() {
        let dir = tempdir().unwrap();
        let archive = reader(true, dir.path());
        let model = load_export(&archive).unwrap();

        let err = AttachmentResolver::new(&archive, &model)
            .resolve("n1", "hash-missing", None)
            .unwrap_err();
        assert!(err.to_string().contains("file name not found"));
    }

    #[test]
    fn test_unknown_binary() {
        let dir = tempdir().unwrap();
        let archive = reader(true, dir.path());
        let model = load_export(&archive).unwrap();

        let err = AttachmentResolver::new(&archive, &model)
            .resolve("n1", "hash-missing", Some("x.pdf"))
            .unwrap_err();
        assert!(err.to_string().contains("x.pdf not found"));
    }

    #[test]
    fn test_payload_path() {
        assert_eq!(
            payload_path("NoteStation/n1/metabinary_info/b2"),
            "NoteStation/n1/metabinary/b2"
        );
        assert_eq!(payload_path("metabinary_info_b2"), "metabinary_b2");
    }

    #[test]
    fn test_name_for_hash() {
        assert_eq!(name_for_hash(b"not json", "x"), None);
        assert_eq!(name_for_hash(br#"[1,2]"#, "x"), None);
        assert_eq!(
            name_for_hash(br#"{"a":{"name":"n.pdf","md5":"x"}}"#, "x"),
            Some("n.pdf".to_string())
        );
    }
}
