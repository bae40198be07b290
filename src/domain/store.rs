//! Document store port.
//!
//! The sync pipeline talks to the remote document-management system only
//! through this trait.

use std::collections::HashMap;
use std::path::Path;

use super::error::Result;

/// Remote tag id.
pub type TagId = u64;

/// Remote document id.
pub type DocumentId = u64;

/// A document already present in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDocument {
    pub id: DocumentId,
    pub title: String,
    /// File name the document was uploaded with.
    pub original_file_name: Option<String>,
}

/// Metadata submitted with a document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentFields {
    pub title: String,
    pub tags: Vec<TagId>,
    /// Creation date already rendered in the configured timezone.
    pub created: Option<String>,
}

/// State of an asynchronous processing task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Started,
    Success,
    Failure,
    Revoked,
    Other(String),
}

impl TaskStatus {
    /// Parse a status string reported by the store.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "PENDING" => Self::Pending,
            "STARTED" => Self::Started,
            "SUCCESS" => Self::Success,
            "FAILURE" => Self::Failure,
            "REVOKED" => Self::Revoked,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether the task has finished.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Revoked)
    }
}

/// Snapshot of a processing task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub status: TaskStatus,
    /// Free-text result, usually an error message on failure.
    pub result: Option<String>,
    /// Document created by the task.
    pub related_document: Option<DocumentId>,
}

/// Operations consumed from the document store.
pub trait DocumentStore {
    /// All tags, keyed by name.
    fn tags(&self) -> Result<HashMap<String, TagId>>;

    /// Create a tag and return its id.
    fn create_tag(&self, name: &str) -> Result<TagId>;

    /// Documents whose title matches `title`.
    fn find_documents(&self, title: &str) -> Result<Vec<RemoteDocument>>;

    /// Submit a document for processing and return the task id.
    fn post_document(&self, file: &Path, fields: &DocumentFields) -> Result<String>;

    /// Current state of a processing task.
    fn task_status(&self, task_id: &str) -> Result<TaskInfo>;

    /// Attach a note to a document.
    fn add_note(&self, document: DocumentId, note: &str) -> Result<()>;
}
