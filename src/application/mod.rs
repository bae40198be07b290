//! Application layer - use cases and orchestration.
//!
//! This layer rebuilds the export model and turns it into a Markdown tree
//! or a Paperless-ngx upload.

pub mod convert;
pub mod extractor;
pub mod formatter;
pub mod markdown_exporter;
pub mod parser;
pub mod paths;
pub mod resolver;
pub mod sync_service;

pub use extractor::load_export;
pub use formatter::{format_notebooks_table, format_stats, format_sync_report};
pub use markdown_exporter::MarkdownExporter;
pub use paths::sanitize;
pub use resolver::{AttachmentResolver, Origin};
pub use sync_service::SyncPipeline;
