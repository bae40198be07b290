//! Markdown export.
//!
//! Writes one directory per notebook and one `.md` file per note, with the
//! note's attachments copied into the notebook's `media` folder.

use std::fs;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use crate::domain::{AppError, Attachment, ExportModel, MarkdownConfig, Note, NotebookPaths, Result};
use crate::infrastructure::ArchiveReader;

use super::formatter::{attachment_link, format_date, metadata_block};
use super::paths::{sanitize, unique_dir, unique_file_name};
use super::resolver::AttachmentResolver;

const MEDIA_DIR: &str = "media";

/// Counters for a finished export.
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    /// Notes written.
    pub notes: usize,
    /// Attachments copied into media folders.
    pub attachments: usize,
    /// Attachments replaced by their source URL.
    pub linked: usize,
    /// Attachments that could not be found anywhere.
    pub missing: usize,
    /// Absolute output root.
    pub root: PathBuf,
}

/// Exports an [`ExportModel`] as a Markdown tree.
pub struct MarkdownExporter<'a, R: Read + Seek> {
    model: &'a ExportModel,
    config: &'a MarkdownConfig,
    resolver: AttachmentResolver<'a, R>,
}

impl<'a, R: Read + Seek> MarkdownExporter<'a, R> {
    #[must_use]
    pub const fn new(
        archive: &'a ArchiveReader<R>,
        model: &'a ExportModel,
        config: &'a MarkdownConfig,
    ) -> Self {
        Self {
            model,
            config,
            resolver: AttachmentResolver::new(archive, model),
        }
    }

    /// Writes the whole export under `basepath`.
    ///
    /// # Errors
    /// Returns error if a directory or file cannot be written, or if an
    /// archive cannot be read.
    pub fn export(&self, basepath: &Path) -> Result<ExportSummary> {
        let root = std::path::absolute(basepath)
            .map_err(|e| AppError::io(format!("Invalid output path {}", basepath.display()), e))?;
        fs::create_dir_all(&root)
            .map_err(|e| AppError::io(format!("Failed to create {}", root.display()), e))?;

        self.create_tree(&root)?;

        let mut summary = ExportSummary {
            root,
            ..ExportSummary::default()
        };
        for note in self.model.notes() {
            self.write_note(note, &mut summary)?;
        }

        self.remove_empty_dirs();

        tracing::info!(
            "Wrote {} notes and {} attachments to {}",
            summary.notes,
            summary.attachments,
            summary.root.display()
        );
        Ok(summary)
    }

    fn create_tree(&self, root: &Path) -> Result<()> {
        for notebook in self.model.notebooks() {
            let dir = unique_dir(root, notebook.name());
            let media = dir.join(MEDIA_DIR);
            fs::create_dir_all(&media)
                .map_err(|e| AppError::io(format!("Failed to create {}", media.display()), e))?;

            if !notebook.assign_paths(NotebookPaths { root: dir, media }) {
                tracing::warn!("Notebook {} already has an output directory", notebook.title);
            }
        }
        Ok(())
    }

    fn write_note(&self, note: &Note, summary: &mut ExportSummary) -> Result<()> {
        let notebook = self.model.notebook_of(note);
        let paths = notebook.paths().ok_or_else(|| AppError::Config {
            message: format!("Notebook {} has no output directory", notebook.title),
        })?;

        let mut body = note.content.clone();
        let mut unreferenced = Vec::new();

        for attachment in &note.attachments {
            let file_name = unique_file_name(&paths.media, &attachment.name);
            let link = attachment_link(
                &paths.media,
                &file_name,
                self.config.absolute_links,
                self.config.links_as_uri,
            );
            let entry = self.save_attachment(note, attachment, &paths.media, &file_name, &link, summary)?;

            match (&attachment.reference, &attachment.source) {
                (Some(reference), Some(source)) => body = body.replace(reference, source),
                (Some(reference), None) => body = body.replace(reference, &link),
                (None, _) => unreferenced.push(entry),
            }
        }

        let block = metadata_block(self.config, note, &unreferenced);
        let content = if block.is_empty() {
            body
        } else {
            format!("{block}\n\n{body}")
        };

        let title = match note.ctime.filter(|_| self.config.creation_date_in_filename) {
            Some(ctime) => format_date(ctime).map_or_else(
                || note.title.clone(),
                |date| format!("{date} {}", note.title),
            ),
            None => note.title.clone(),
        };
        let file_name = unique_file_name(&paths.root, &format!("{}.md", sanitize(&title)));
        let path = paths.root.join(&file_name);

        fs::write(&path, content)
            .map_err(|e| AppError::io(format!("Failed to write {}", path.display()), e))?;
        tracing::debug!("Wrote {}", path.display());

        summary.notes += 1;
        Ok(())
    }

    /// Stores one attachment and returns its formatted link entry.
    fn save_attachment(
        &self,
        note: &Note,
        attachment: &Attachment,
        media: &Path,
        file_name: &str,
        link: &str,
        summary: &mut ExportSummary,
    ) -> Result<String> {
        match self.resolver.resolve(&note.id, &attachment.md5, Some(file_name)) {
            Ok(found) => {
                let target = media.join(file_name);
                fs::write(&target, &found.data)
                    .map_err(|e| AppError::io(format!("Failed to write {}", target.display()), e))?;
                summary.attachments += 1;
                Ok(format!("[{}]({link})", attachment.name))
            }
            Err(e) if e.is_not_found() => {
                if let Some(source) = &attachment.source {
                    summary.linked += 1;
                    Ok(format!("[{}]({source})", attachment.name))
                } else {
                    tracing::warn!(
                        "Can't find attachment \"{}\" of note \"{}\": {e}",
                        attachment.name,
                        note.title
                    );
                    summary.missing += 1;
                    Ok(format!("[NOT FOUND]({link})"))
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Drops empty media folders and an empty recycle bin. Failures mean the
    /// directory is in use and are ignored.
    fn remove_empty_dirs(&self) {
        for notebook in self.model.notebooks() {
            if let Some(paths) = notebook.paths() {
                let _ = fs::remove_dir(&paths.media);
            }
        }
        if let Some(paths) = self.model.recycle_bin().paths() {
            let _ = fs::remove_dir(&paths.root);
        }
    }
}
