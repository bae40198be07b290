//! Domain-level error types for notestation-migrate.
//!
//! All errors are typed with `thiserror` and provide meaningful context
//! without exposing internal details to end users.

use std::path::PathBuf;
use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Export or archive file not found at the given location.
    #[error("Archive not found at: {path}")]
    ArchiveNotFound { path: PathBuf },

    /// Failed to open or read a container.
    #[error("Archive error: {message}")]
    Archive {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An entity referenced by the manifest is missing from the export.
    #[error("Entry not found in export: {name}")]
    EntryNotFound { name: String },

    /// A required identity field is absent from an entity description.
    #[error("Missing required field `{field}` in {entity}")]
    MissingField { entity: String, field: &'static str },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Document store request failed.
    #[error("HTTP error: {message}")]
    Http {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Attachment bytes or filename could not be located in any container.
    #[error("Attachment {hash} not found: {reason}")]
    AttachmentNotFound { hash: String, reason: String },

    /// The raw NoteStation archive was not provided.
    #[error("Secondary archive not available")]
    SecondaryUnavailable,
}

impl AppError {
    /// Create an archive error from any container error.
    pub fn archive(
        message: impl Into<String>,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Archive {
            message: message.into(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create an HTTP error from a reqwest error.
    pub fn http(err: reqwest::Error) -> Self {
        Self::Http {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an attachment-not-found error.
    pub fn attachment_not_found(hash: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AttachmentNotFound {
            hash: hash.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a resolution miss rather than a hard failure.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::AttachmentNotFound { .. } | Self::SecondaryUnavailable
        )
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message() {
        let err = AppError::MissingField {
            entity: "note 1026_ABC".into(),
            field: "title",
        };
        assert_eq!(
            err.to_string(),
            "Missing required field `title` in note 1026_ABC"
        );
    }

    #[test]
    fn test_not_found_classification() {
        assert!(AppError::attachment_not_found("abc", "no metadata").is_not_found());
        assert!(AppError::SecondaryUnavailable.is_not_found());
        assert!(!AppError::Config {
            message: "bad".into()
        }
        .is_not_found());
    }
}
