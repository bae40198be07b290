//! Infrastructure layer - external adapters (archives, HTTP, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod archive_reader;
pub mod config;
pub mod interrupt;
pub mod nsx_reader;
pub mod paperless;
pub mod raw_archive;

pub use archive_reader::ArchiveReader;
pub use config::load_config;
pub use interrupt::watch_interrupts;
pub use paperless::PaperlessClient;
pub use raw_archive::RawEntry;
