//! Sync-related domain models.
//!
//! Contains the run options, the cooperative cancellation token and the
//! report produced by the Paperless sync pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Cooperative cancellation flag shared with an interrupt watcher.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Caller-supplied options for one sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Count would-be uploads without posting anything.
    pub dry_run: bool,
    /// Stop after this many successful uploads.
    pub limit: Option<usize>,
    /// Skip every note before the first note with this exact title.
    pub restart_from: Option<String>,
}

/// Why an attachment was not uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IgnoreReason {
    /// Extension not in the allowed set.
    WrongExtension,
    /// Already present in the document store.
    Duplicate,
    /// Bytes could not be located in either container.
    NotFound,
    /// Processing task failed or returned no document.
    FailedUpload,
    /// A remote call raised.
    Exception(String),
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongExtension => write!(f, "WRONG EXTENSION"),
            Self::Duplicate => write!(f, "DUPLICATE"),
            Self::NotFound => write!(f, "NOT FOUND"),
            Self::FailedUpload => write!(f, "FAILED UPLOAD"),
            Self::Exception(message) => write!(f, "EXCEPTION: {message}"),
        }
    }
}

/// An attachment that was skipped or failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IgnoredAttachment {
    /// Title of the owning note.
    pub note: String,
    /// Attachment file name.
    pub attachment: String,
    /// Why it was skipped.
    pub reason: IgnoreReason,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SyncStop {
    /// Every note was visited.
    #[default]
    Completed,
    /// The upload limit was reached.
    LimitReached,
    /// Cancellation was requested.
    Cancelled,
}

/// Outcome of a sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Successful uploads (or would-be uploads in dry-run).
    pub uploaded: usize,
    /// Notes skipped before the restart marker.
    pub skipped_notes: usize,
    /// Notes whose attachments were processed.
    pub processed_notes: usize,
    /// Every skipped or failed attachment.
    pub ignored: Vec<IgnoredAttachment>,
    /// Why the run stopped.
    pub stop: SyncStop,
}

impl SyncReport {
    /// Record a skipped or failed attachment.
    pub fn ignore(&mut self, note: &str, attachment: &str, reason: IgnoreReason) {
        tracing::warn!(note, attachment, reason = %reason, "Attachment not uploaded");
        self.ignored.push(IgnoredAttachment {
            note: note.to_string(),
            attachment: attachment.to_string(),
            reason,
        });
    }
}
