//! Domain models for NoteStation export data.
//!
//! These models represent the notebook/note/attachment graph rebuilt from
//! an `.nsx` export. Notes refer to their notebook by index into the
//! notebook table, never by pointer.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;

/// Reserved id of the synthetic notebook holding orphaned notes.
pub const RECYCLE_BIN_ID: &str = "1027_#00000000";

/// Title of the synthetic notebook holding orphaned notes.
pub const RECYCLE_BIN_TITLE: &str = "Recycle bin";

/// Title used for notebooks without one.
pub const UNTITLED: &str = "Untitled";

/// Extensions that classify an attachment as an HTML document.
const HTML_EXTENSIONS: &[&str] = &["htm", "html"];

/// Index of a notebook in the export model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NotebookIdx(usize);

impl NotebookIdx {
    /// Position in the notebook table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// An attachment descriptor from a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    /// Sanitized file name.
    pub name: String,
    /// Content hash, the lookup key into both containers.
    pub md5: String,
    /// Token marking where the attachment is referenced in the note body.
    pub reference: Option<String>,
    /// Original external URL, if any.
    pub source: Option<String>,
}

impl Attachment {
    /// Lower-cased file extension, if the name has one.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }

    /// Whether the attachment is an HTML document.
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.extension()
            .is_some_and(|ext| HTML_EXTENSIONS.contains(&ext.as_str()))
    }
}

/// Output directories assigned to a notebook once materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookPaths {
    /// Directory holding the notebook's Markdown files.
    pub root: PathBuf,
    /// Directory holding the notebook's attachments.
    pub media: PathBuf,
}

/// A notebook and the notes it owns.
#[derive(Debug, Clone)]
pub struct Notebook {
    /// Opaque id from the export.
    pub id: String,
    /// Display title, never empty.
    pub title: String,
    /// Creation time (epoch seconds).
    pub ctime: Option<i64>,
    /// Modification time (epoch seconds).
    pub mtime: Option<i64>,
    notes: Vec<usize>,
    paths: OnceCell<NotebookPaths>,
}

impl Notebook {
    /// Create an empty notebook.
    #[must_use]
    pub fn new(id: impl Into<String>, title: Option<String>) -> Self {
        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());

        Self {
            id: id.into(),
            title,
            ctime: None,
            mtime: None,
            notes: Vec::new(),
            paths: OnceCell::new(),
        }
    }

    /// Set timestamps.
    #[must_use]
    pub const fn with_times(mut self, ctime: Option<i64>, mtime: Option<i64>) -> Self {
        self.ctime = ctime;
        self.mtime = mtime;
        self
    }

    /// Name used for the output directory and the notebook tag.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.title
    }

    /// Whether this is the synthetic recycle bin.
    #[must_use]
    pub fn is_recycle_bin(&self) -> bool {
        self.id == RECYCLE_BIN_ID
    }

    /// Number of notes owned.
    #[must_use]
    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    /// Output directories, once assigned.
    #[must_use]
    pub fn paths(&self) -> Option<&NotebookPaths> {
        self.paths.get()
    }

    /// Record the output directories. Only the first assignment wins.
    ///
    /// Returns false if paths were already assigned.
    pub fn assign_paths(&self, paths: NotebookPaths) -> bool {
        self.paths.set(paths).is_ok()
    }
}

/// A single note.
#[derive(Debug, Clone)]
pub struct Note {
    /// Opaque id from the export.
    pub id: String,
    /// Title, never empty.
    pub title: String,
    /// Creation time (epoch seconds).
    pub ctime: Option<i64>,
    /// Modification time (epoch seconds).
    pub mtime: Option<i64>,
    /// Free-text tags, de-duplicated.
    pub tags: Vec<String>,
    /// Markdown body converted from the note's HTML.
    pub content: String,
    /// Attachment descriptors in export order.
    pub attachments: Vec<Attachment>,
    notebook: NotebookIdx,
}

impl Note {
    /// Owning notebook.
    #[must_use]
    pub const fn notebook(&self) -> NotebookIdx {
        self.notebook
    }

    /// Whether any attachment is an HTML document.
    #[must_use]
    pub fn has_html_attachment(&self) -> bool {
        self.attachments.iter().any(Attachment::is_html)
    }
}

/// Note fields parsed from the export, before being attached to a notebook.
#[derive(Debug, Clone)]
pub struct NoteDraft {
    pub id: String,
    pub title: String,
    pub ctime: Option<i64>,
    pub mtime: Option<i64>,
    /// Declared parent notebook id.
    pub parent_id: String,
    pub tags: Vec<String>,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

/// The reconstructed notebook/note graph.
#[derive(Debug, Clone)]
pub struct ExportModel {
    notebooks: Vec<Notebook>,
    notes: Vec<Note>,
    by_id: HashMap<String, NotebookIdx>,
}

impl Default for ExportModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportModel {
    /// Create a model seeded with the recycle bin.
    #[must_use]
    pub fn new() -> Self {
        let mut model = Self {
            notebooks: Vec::new(),
            notes: Vec::new(),
            by_id: HashMap::new(),
        };
        model.add_notebook(Notebook::new(
            RECYCLE_BIN_ID,
            Some(RECYCLE_BIN_TITLE.to_string()),
        ));
        model
    }

    /// Add a notebook, replacing the lookup entry of any notebook with the same id.
    pub fn add_notebook(&mut self, notebook: Notebook) -> NotebookIdx {
        let idx = NotebookIdx(self.notebooks.len());
        self.by_id.insert(notebook.id.clone(), idx);
        self.notebooks.push(notebook);
        idx
    }

    /// Attach a note to its declared notebook, or to the recycle bin if the
    /// parent is unknown.
    pub fn add_note(&mut self, draft: NoteDraft) -> NotebookIdx {
        let notebook = match self.by_id.get(&draft.parent_id) {
            Some(idx) => *idx,
            None => {
                tracing::warn!(
                    note = %draft.title,
                    parent = %draft.parent_id,
                    "Unknown parent notebook, filing note under {RECYCLE_BIN_TITLE}"
                );
                self.recycle_bin_idx()
            }
        };

        let position = self.notes.len();
        self.notes.push(Note {
            id: draft.id,
            title: draft.title,
            ctime: draft.ctime,
            mtime: draft.mtime,
            tags: draft.tags,
            content: draft.content,
            attachments: draft.attachments,
            notebook,
        });
        self.notebooks[notebook.0].notes.push(position);
        notebook
    }

    /// All notebooks, recycle bin first.
    #[must_use]
    pub fn notebooks(&self) -> &[Notebook] {
        &self.notebooks
    }

    /// All notes in export order.
    #[must_use]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Notebook by index.
    #[must_use]
    pub fn notebook(&self, idx: NotebookIdx) -> &Notebook {
        &self.notebooks[idx.0]
    }

    /// Owning notebook of a note.
    #[must_use]
    pub fn notebook_of(&self, note: &Note) -> &Notebook {
        self.notebook(note.notebook)
    }

    /// Notes owned by a notebook, in insertion order.
    pub fn notes_in<'a>(&'a self, notebook: &'a Notebook) -> impl Iterator<Item = &'a Note> + 'a {
        notebook.notes.iter().map(move |&i| &self.notes[i])
    }

    /// Find a note by its export id.
    #[must_use]
    pub fn note_by_id(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// The synthetic recycle bin notebook.
    #[must_use]
    pub fn recycle_bin(&self) -> &Notebook {
        self.notebook(self.recycle_bin_idx())
    }

    fn recycle_bin_idx(&self) -> NotebookIdx {
        self.by_id
            .get(RECYCLE_BIN_ID)
            .copied()
            .unwrap_or(NotebookIdx(0))
    }

    /// Note tags plus the notebook name, lower-cased and de-duplicated.
    #[must_use]
    pub fn effective_tags(&self, note: &Note) -> Vec<String> {
        let mut tags: Vec<String> = Vec::with_capacity(note.tags.len() + 1);
        let notebook_name = self.notebook_of(note).name();

        for tag in note.tags.iter().map(String::as_str).chain([notebook_name]) {
            let tag = tag.to_lowercase();
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }

    /// Summary counts.
    #[must_use]
    pub fn stats(&self) -> ExportStats {
        ExportStats {
            notebook_count: self.notebooks.len(),
            note_count: self.notes.len(),
            attachment_count: self.notes.iter().map(|n| n.attachments.len()).sum(),
            orphan_count: self.recycle_bin().note_count(),
        }
    }
}

/// Summary statistics for an export.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportStats {
    /// Number of notebooks, recycle bin included.
    pub notebook_count: usize,
    /// Number of notes.
    pub note_count: usize,
    /// Total attachment descriptors.
    pub attachment_count: usize,
    /// Notes filed under the recycle bin.
    pub orphan_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(id: &str, title: &str, parent: &str) -> NoteDraft {
        NoteDraft {
            id: id.into(),
            title: title.into(),
            ctime: None,
            mtime: None,
            parent_id: parent.into(),
            tags: vec!["Travel".into(), "travel".into(), "Food".into()],
            content: String::new(),
            attachments: Vec::new(),
        }
    }

    fn attachment(name: &str) -> Attachment {
        Attachment {
            name: name.into(),
            md5: "abc".into(),
            reference: None,
            source: None,
        }
    }

    #[test]
    fn test_untitled_notebook() {
        assert_eq!(Notebook::new("nb", None).title, "Untitled");
        assert_eq!(Notebook::new("nb", Some(String::new())).title, "Untitled");
        assert_eq!(Notebook::new("nb", Some("Work".into())).title, "Work");
    }

    #[test]
    fn test_model_seeds_recycle_bin() {
        let model = ExportModel::new();
        assert_eq!(model.notebooks().len(), 1);
        assert!(model.recycle_bin().is_recycle_bin());
        assert_eq!(model.recycle_bin().title, "Recycle bin");
    }

    #[test]
    fn test_note_attached_to_parent() {
        let mut model = ExportModel::new();
        let work = model.add_notebook(Notebook::new("nb1", Some("Work".into())));
        let idx = model.add_note(draft("n1", "Plan", "nb1"));

        assert_eq!(idx, work);
        let note = &model.notes()[0];
        assert_eq!(model.notebook_of(note).title, "Work");
        assert_eq!(model.notes_in(model.notebook(work)).count(), 1);
    }

    #[test]
    fn test_unknown_parent_goes_to_recycle_bin() {
        let mut model = ExportModel::new();
        model.add_notebook(Notebook::new("nb1", Some("Work".into())));
        model.add_note(draft("n1", "Lost", "missing"));

        assert_eq!(model.recycle_bin().note_count(), 1);
        assert_eq!(model.stats().orphan_count, 1);
    }

    #[test]
    fn test_effective_tags() {
        let mut model = ExportModel::new();
        model.add_notebook(Notebook::new("nb1", Some("Travel".into())));
        model.add_note(draft("n1", "Trip", "nb1"));

        let tags = model.effective_tags(&model.notes()[0]);
        assert_eq!(tags, vec!["travel".to_string(), "food".to_string()]);
    }

    #[test]
    fn test_paths_assigned_once() {
        let notebook = Notebook::new("nb", None);
        let first = NotebookPaths {
            root: PathBuf::from("/a"),
            media: PathBuf::from("/a/media"),
        };
        let second = NotebookPaths {
            root: PathBuf::from("/b"),
            media: PathBuf::from("/b/media"),
        };

        assert!(notebook.assign_paths(first.clone()));
        assert!(!notebook.assign_paths(second));
        assert_eq!(notebook.paths(), Some(&first));
    }

    #[test]
    fn test_attachment_extension() {
        assert_eq!(attachment("Photo.JPG").extension().as_deref(), Some("jpg"));
        assert_eq!(attachment("README").extension(), None);
        assert_eq!(attachment(".hidden").extension(), None);
        assert!(attachment("page.htm").is_html());
        assert!(!attachment("page.pdf").is_html());
    }
}
