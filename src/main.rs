//! NoteStation Migrate - Rebuild Synology NoteStation exports.
//!
//! Reads an `.nsx` export (and optionally a raw archive of the NoteStation
//! data) and writes the notes as a Markdown tree or uploads their
//! attachments to Paperless-ngx.
//!
//!   notestation-migrate -e export.nsx markdown -o notes
//!   notestation-migrate -c config.yml paperless --dry-run
//!   notestation-migrate paperless --restart "Tax 2021" --limit 50
//!   notestation-migrate extract --note 1026_ABC --hash 0f3e...
//!   notestation-migrate stats

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::path::Path;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    format_notebooks_table, format_stats, format_sync_report, load_export, sanitize,
    AttachmentResolver, MarkdownExporter, Origin, SyncPipeline,
};
use cli::{Cli, Commands};
use domain::{AppConfig, CancellationToken, SyncOptions};
use infrastructure::{load_config, watch_interrupts, ArchiveReader, PaperlessClient};

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
fn run(cli: Cli) -> domain::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let archive = ArchiveReader::open(&cli.export, Some(cli.archive.as_path()))?;

    match cli.command {
        Commands::Markdown { output } => {
            cmd_markdown(&archive, &config, output.as_deref())?;
        }
        Commands::Paperless {
            dry_run,
            limit,
            restart,
        } => {
            let options = SyncOptions {
                dry_run,
                limit,
                restart_from: restart,
            };
            cmd_paperless(&archive, &config, &options)?;
        }
        Commands::Extract {
            note,
            hash,
            name,
            output,
        } => {
            cmd_extract(&archive, &note, &hash, name.as_deref(), &output)?;
        }
        Commands::Stats => {
            cmd_stats(&archive)?;
        }
    }

    Ok(())
}

/// Markdown export command.
fn cmd_markdown(
    archive: &ArchiveReader,
    config: &AppConfig,
    output: Option<&Path>,
) -> domain::Result<()> {
    let model = load_export(archive)?;
    let basepath = output.unwrap_or(&config.markdown.basepath);

    let summary = MarkdownExporter::new(archive, &model, &config.markdown).export(basepath)?;

    println!(
        "{} Exported {} notes and {} attachments to {}",
        "✓".green().bold(),
        summary.notes,
        summary.attachments,
        summary.root.display()
    );
    if summary.linked > 0 {
        println!("  {} attachments linked to their source URL", summary.linked);
    }
    if summary.missing > 0 {
        println!(
            "  {} attachments not found",
            summary.missing.to_string().yellow()
        );
    }

    Ok(())
}

/// Paperless upload command.
fn cmd_paperless(
    archive: &ArchiveReader,
    config: &AppConfig,
    options: &SyncOptions,
) -> domain::Result<()> {
    // Fail on bad settings before any remote call.
    config.paperless.tz()?;
    config.paperless.credentials()?;

    let model = load_export(archive)?;
    let client = PaperlessClient::connect(&config.paperless)?;

    let token = CancellationToken::new();
    watch_interrupts(token.clone())?;

    let report = SyncPipeline::new(archive, &model, &client, &config.paperless)?
        .with_cancellation(token)
        .run(options);

    println!("{}", format_sync_report(&report, options.dry_run));

    Ok(())
}

/// Single attachment extraction command.
fn cmd_extract(
    archive: &ArchiveReader,
    note_id: &str,
    hash: &str,
    name: Option<&str>,
    output: &Path,
) -> domain::Result<()> {
    let model = load_export(archive)?;
    let found = AttachmentResolver::new(archive, &model).resolve(note_id, hash, name)?;

    std::fs::create_dir_all(output).map_err(|e| {
        domain::AppError::io(format!("Failed to create directory {}", output.display()), e)
    })?;
    let path = output.join(sanitize(&found.file_name));
    std::fs::write(&path, &found.data)
        .map_err(|e| domain::AppError::io(format!("Failed to write {}", path.display()), e))?;

    let origin = match found.origin {
        Origin::Export => "export",
        Origin::RawArchive => "raw archive",
    };
    println!(
        "{} {} ({} bytes, from {origin}) → {}",
        "✓".green(),
        found.file_name.cyan(),
        found.data.len(),
        path.display()
    );

    Ok(())
}

/// Show statistics command.
fn cmd_stats(archive: &ArchiveReader) -> domain::Result<()> {
    let model = load_export(archive)?;

    println!("{}", format_notebooks_table(&model));
    println!();
    println!("{}", format_stats(&model.stats()));
    if archive.has_secondary() {
        println!("  Raw archive: {}", "available".green());
    }

    Ok(())
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
