//! Export model construction.
//!
//! Reads the manifest and every notebook and note entity, then attaches
//! each note to its notebook.

use std::io::{Read, Seek};

use crate::domain::{ExportModel, Result};
use crate::infrastructure::ArchiveReader;

use super::parser::{parse_note, parse_notebook};

/// Builds the notebook/note graph from the primary container.
///
/// # Errors
/// Returns error if an entity is missing, malformed, or lacks a required field.
pub fn load_export<R: Read + Seek>(archive: &ArchiveReader<R>) -> Result<ExportModel> {
    let manifest = archive.manifest()?;
    let mut model = ExportModel::new();

    for id in &manifest.notebook {
        let notebook = parse_notebook(id, &archive.read_entity(id)?)?;
        tracing::debug!("Loaded notebook {}: {}", id, notebook.title);
        model.add_notebook(notebook);
    }

    for id in &manifest.note {
        let draft = parse_note(id, &archive.read_entity(id)?)?;
        tracing::debug!("Loaded note {}: {}", id, draft.title);
        model.add_note(draft);
    }

    if !manifest.shortcut.is_empty() {
        tracing::debug!("Ignoring {} shortcuts", manifest.shortcut.len());
    }

    let stats = model.stats();
    tracing::info!(
        "Loaded {} notebooks, {} notes and {} attachments",
        stats.notebook_count,
        stats.note_count,
        stats.attachment_count
    );

    Ok(model)
}
