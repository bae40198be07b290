//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// NoteStation Migrate - Rebuild Synology NoteStation exports as Markdown or
/// Paperless-ngx documents.
#[derive(Parser, Debug)]
#[command(name = "notestation-migrate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file (YAML, or TOML with a .toml extension).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// NoteStation export file.
    #[arg(short, long, default_value = "export.nsx")]
    pub export: PathBuf,

    /// Raw NoteStation data archive, used for attachments missing from the export.
    #[arg(short, long, default_value = "archive.tgz")]
    pub archive: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write notebooks and notes as a Markdown tree.
    Markdown {
        /// Output directory (defaults to `basepath` from the configuration).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload attachments to Paperless-ngx.
    Paperless {
        /// Count uploads without sending anything.
        #[arg(short, long)]
        dry_run: bool,

        /// Stop after this many uploads.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Skip notes until the first note with this exact title.
        #[arg(short, long)]
        restart: Option<String>,
    },

    /// Extract a single attachment by note id and content hash.
    Extract {
        /// Note id.
        #[arg(short, long)]
        note: String,

        /// Attachment content hash.
        #[arg(long)]
        hash: String,

        /// File name to write (looked up in the archives if omitted).
        #[arg(long)]
        name: Option<String>,

        /// Output directory.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Show notebooks with note and attachment counts.
    Stats,
}
