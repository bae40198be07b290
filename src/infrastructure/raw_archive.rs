//! Reader for a raw NoteStation data dump.
//!
//! The dump is a tar archive (optionally gzip-compressed) copied by hand
//! from the NAS. Entries are path-qualified by note id. Tar only supports
//! sequential access, so the entry list is indexed once at open time and
//! every read re-streams the archive.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};

use crate::domain::{AppError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One entry of the raw dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Path inside the archive.
    pub path: String,
    /// Whether the entry is a regular file.
    pub is_file: bool,
}

/// Sequential reader over the secondary container.
#[derive(Debug)]
pub struct RawArchive {
    path: PathBuf,
    gzipped: bool,
    entries: Vec<RawEntry>,
}

impl RawArchive {
    /// Opens a dump and indexes its entries.
    ///
    /// # Errors
    /// Returns error if the file is missing or not a tar archive.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(AppError::ArchiveNotFound {
                path: path.to_path_buf(),
            });
        }

        let gzipped = detect_gzip(path)?;
        let mut archive = Self {
            path: path.to_path_buf(),
            gzipped,
            entries: Vec::new(),
        };
        archive.entries = archive.index()?;

        tracing::info!(
            entries = archive.entries.len(),
            gzipped,
            "Opened raw archive: {}",
            path.display()
        );

        Ok(archive)
    }

    /// Entries whose path contains the note id.
    pub fn entries_for<'a>(&'a self, note_id: &'a str) -> impl Iterator<Item = &'a RawEntry> + 'a {
        self.entries.iter().filter(move |e| e.path.contains(note_id))
    }

    /// Reads a single entry.
    ///
    /// # Errors
    /// Returns error if the archive cannot be streamed or the entry is absent.
    pub fn read_entry(&self, path: &str) -> Result<Vec<u8>> {
        let mut found = self.read_entries(&[path])?;
        found.remove(path).ok_or_else(|| AppError::EntryNotFound {
            name: path.to_string(),
        })
    }

    /// Reads several entries in one pass over the archive.
    ///
    /// Paths that are not present are simply absent from the result.
    ///
    /// # Errors
    /// Returns error if the archive cannot be streamed.
    pub fn read_entries(&self, paths: &[&str]) -> Result<HashMap<String, Vec<u8>>> {
        let mut found = HashMap::with_capacity(paths.len());
        if paths.is_empty() {
            return Ok(found);
        }

        let mut archive = Archive::new(self.stream()?);
        let iter = archive
            .entries()
            .map_err(|e| AppError::archive("Failed to read raw archive", e))?;

        for entry in iter {
            let mut entry =
                entry.map_err(|e| AppError::archive("Failed to read raw archive entry", e))?;
            let name = entry_path(&entry)?;

            if !paths.contains(&name.as_str()) || found.contains_key(&name) {
                continue;
            }

            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| AppError::io(format!("Failed to read {name}"), e))?;
            found.insert(name, data);

            if found.len() == paths.len() {
                break;
            }
        }

        Ok(found)
    }

    fn index(&self) -> Result<Vec<RawEntry>> {
        let mut archive = Archive::new(self.stream()?);
        let iter = archive
            .entries()
            .map_err(|e| AppError::archive("Failed to read raw archive", e))?;

        let mut entries = Vec::new();
        for entry in iter {
            let entry =
                entry.map_err(|e| AppError::archive("Failed to read raw archive entry", e))?;
            let is_file = matches!(
                entry.header().entry_type(),
                EntryType::Regular | EntryType::Continuous
            );
            entries.push(RawEntry {
                path: entry_path(&entry)?,
                is_file,
            });
        }
        Ok(entries)
    }

    fn stream(&self) -> Result<Box<dyn Read>> {
        let file = File::open(&self.path)
            .map_err(|e| AppError::io(format!("Failed to open {}", self.path.display()), e))?;
        let reader = BufReader::new(file);

        if self.gzipped {
            Ok(Box::new(GzDecoder::new(reader)))
        } else {
            Ok(Box::new(reader))
        }
    }
}

fn entry_path<R: Read>(entry: &tar::Entry<'_, R>) -> Result<String> {
    let path = entry
        .path()
        .map_err(|e| AppError::archive("Invalid path in raw archive", e))?;
    Ok(path.to_string_lossy().trim_start_matches("./").to_string())
}

fn detect_gzip(path: &Path) -> Result<bool> {
    let mut file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open {}", path.display()), e))?;
    let mut magic = [0u8; 2];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == GZIP_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(AppError::io("Failed to read archive header", e)),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::tempdir;

    use super::*;

    /// Writes a tar.gz with the given regular files and directories.
    pub(crate) fn write_tgz(path: &Path, files: &[(&str, &[u8])], dirs: &[&str]) {
        let file = File::create(path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for dir in dirs {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, dir, std::io::empty())
                .unwrap();
        }

        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }

        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_index_and_filter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.tgz");
        write_tgz(
            &path,
            &[
                ("NoteStation/n1/version/text/1", b"{}"),
                ("NoteStation/n2/version/text/1", b"{}"),
            ],
            &["NoteStation/n1/"],
        );

        let raw = RawArchive::open(&path).unwrap();
        let for_n1: Vec<_> = raw.entries_for("n1").collect();
        assert_eq!(for_n1.len(), 2);
        assert!(for_n1.iter().any(|e| !e.is_file));
        assert!(for_n1.iter().any(|e| e.is_file));
    }

    #[test]
    fn test_read_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.tgz");
        write_tgz(&path, &[("a/one", b"1"), ("a/two", b"2")], &[]);

        let raw = RawArchive::open(&path).unwrap();
        assert_eq!(raw.read_entry("a/two").unwrap(), b"2");

        let both = raw.read_entries(&["a/one", "a/two", "a/three"]).unwrap();
        assert_eq!(both.len(), 2);
        assert!(matches!(
            raw.read_entry("a/three"),
            Err(AppError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn test_plain_tar() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.tar");
        {
            let file = File::create(&path).unwrap();
            let mut builder = tar::Builder::new(file);
            let mut header = tar::Header::new_gnu();
            header.set_size(3);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, "x/y", &b"abc"[..]).unwrap();
            builder.finish().unwrap();
        }

        let raw = RawArchive::open(&path).unwrap();
        assert_eq!(raw.read_entry("x/y").unwrap(), b"abc");
    }
}
