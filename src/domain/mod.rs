//! Domain layer - core business logic and types.
//!
//! This layer contains pure domain models and error types
//! without any external dependencies (archives, HTTP, etc.).

pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod sync;

pub use config::{AppConfig, Credentials, MarkdownConfig, PaperlessConfig};
pub use error::{AppError, Result};
pub use models::{Attachment, ExportModel, ExportStats, Note, NoteDraft, Notebook, NotebookPaths};
pub use store::{
    DocumentFields, DocumentId, DocumentStore, RemoteDocument, TagId, TaskInfo, TaskStatus,
};
pub use sync::{CancellationToken, IgnoreReason, SyncOptions, SyncReport, SyncStop};
