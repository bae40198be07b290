//! Output formatting.
//!
//! Attachment links, note metadata blocks and the tables printed by the CLI.

use std::path::Path;

use chrono::{DateTime, Local};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::{ExportModel, ExportStats, MarkdownConfig, Note, SyncReport, SyncStop};

/// Directory name of a notebook's attachment folder, as seen from its notes.
const MEDIA_DIR: &str = "media";

/// Builds the link to an attachment stored in `media_dir`.
///
/// Relative links point into the sibling `media` folder. URI links use the
/// `file://` scheme; plain links are bare paths.
#[must_use]
pub fn attachment_link(media_dir: &Path, file_name: &str, absolute: bool, as_uri: bool) -> String {
    match (as_uri, absolute) {
        (true, true) => {
            let path = media_dir.join(file_name);
            url::Url::from_file_path(&path).map_or_else(
                |()| format!("file://{}", path.display()),
                |url| url.to_string(),
            )
        }
        (true, false) => format!("file://{MEDIA_DIR}/{}", urlencoding::encode(file_name)),
        (false, true) => media_dir.join(file_name).display().to_string(),
        (false, false) => format!("{MEDIA_DIR}/{file_name}"),
    }
}

/// Local time as `YYYY-MM-DD HH:MM`.
#[must_use]
pub fn format_time(epoch: i64) -> Option<String> {
    local(epoch).map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
}

/// Local date as `YYYY-MM-DD`.
#[must_use]
pub fn format_date(epoch: i64) -> Option<String> {
    local(epoch).map(|dt| dt.format("%Y-%m-%d").to_string())
}

fn local(epoch: i64) -> Option<DateTime<Local>> {
    DateTime::from_timestamp(epoch, 0).map(|dt| dt.with_timezone(&Local))
}

/// Renders a note's metadata header.
///
/// Returns an empty string when the configuration and the note leave
/// nothing to show. `attachments` holds the formatted links of attachments
/// not referenced from the body.
#[must_use]
pub fn metadata_block(config: &MarkdownConfig, note: &Note, attachments: &[String]) -> String {
    if config.meta_data_in_yaml {
        yaml_block(config, note, attachments)
    } else {
        text_block(config, note, attachments)
    }
}

fn yaml_block(config: &MarkdownConfig, note: &Note, attachments: &[String]) -> String {
    let mut fields = String::new();

    if config.insert_title {
        fields.push_str(&format!("Title: \"{}\"\n", note.title));
    }
    if let Some(created) = note.ctime.filter(|_| config.insert_ctime).and_then(format_time) {
        fields.push_str(&format!("Created: \"{created}\"\n"));
    }
    if let Some(modified) = note.mtime.filter(|_| config.insert_mtime).and_then(format_time) {
        fields.push_str(&format!("Modified: \"{modified}\"\n"));
    }
    if let Some(tags) = tag_list(config, note) {
        fields.push_str(&format!("Tags: [{tags}]\n"));
    }

    if fields.is_empty() && attachments.is_empty() {
        return String::new();
    }

    let mut block = format!("---\n{fields}---\n");
    if !attachments.is_empty() {
        block.push_str(&format!("\nAttachments:  {}\n", attachments.join(", ")));
    }
    block
}

fn text_block(config: &MarkdownConfig, note: &Note, attachments: &[String]) -> String {
    let mut block = String::new();

    if config.insert_title {
        let underline = "=".repeat(note.title.chars().count());
        block.push_str(&format!("{}\n{underline}\n", note.title));
    }
    if let Some(tags) = tag_list(config, note) {
        block.push_str(&format!("Tags: {tags}  \n"));
    }
    if !attachments.is_empty() {
        block.push_str(&format!("Attachments: {}  \n", attachments.join(", ")));
    }
    if let Some(created) = note.ctime.filter(|_| config.insert_ctime).and_then(format_time) {
        block.push_str(&format!("Created: {created}  \n"));
    }
    if let Some(modified) = note.mtime.filter(|_| config.insert_mtime).and_then(format_time) {
        block.push_str(&format!("Modified: {modified}  \n"));
    }

    block
}

fn tag_list(config: &MarkdownConfig, note: &Note) -> Option<String> {
    if !config.tags || note.tags.is_empty() {
        return None;
    }

    let tags: Vec<String> = note
        .tags
        .iter()
        .map(|tag| {
            let tag = if config.no_spaces_in_tags {
                tag.replace(' ', "_")
            } else {
                tag.clone()
            };
            format!("{}{tag}", config.tag_prepend)
        })
        .collect();

    Some(tags.join(&config.tag_delimiter))
}

/// Formats the end-of-run sync summary.
pub fn format_sync_report(report: &SyncReport, dry_run: bool) -> String {
    let mut out = String::new();

    if !report.ignored.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Note", "Attachment", "Reason"]);
        for item in &report.ignored {
            table.add_row(vec![
                truncate(&item.note, 40),
                truncate(&item.attachment, 40),
                item.reason.to_string(),
            ]);
        }
        out.push_str(&table.to_string());
        out.push_str("\n\n");
    }

    let verb = if dry_run { "Would upload" } else { "Uploaded" };
    let stop = match report.stop {
        SyncStop::Completed => "completed".green(),
        SyncStop::LimitReached => "limit reached".yellow(),
        SyncStop::Cancelled => "interrupted".red(),
    };
    out.push_str(&format!(
        "{}\n  {verb}: {}\n  Ignored: {}\n  Notes processed: {}\n  Notes skipped: {}\n  Run: {stop}",
        "📤 Paperless sync".bold(),
        report.uploaded.to_string().green(),
        report.ignored.len().to_string().yellow(),
        report.processed_notes.to_string().cyan(),
        report.skipped_notes.to_string().cyan(),
    ));

    out
}

/// Formats a table of notebooks with their note and attachment counts.
pub fn format_notebooks_table(model: &ExportModel) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Notebook", "Notes", "Attachments"]);

    for notebook in model.notebooks() {
        let attachments: usize = model
            .notes_in(notebook)
            .map(|note| note.attachments.len())
            .sum();
        table.add_row(vec![
            truncate(notebook.name(), 50),
            notebook.note_count().to_string(),
            attachments.to_string(),
        ]);
    }

    table.to_string()
}

/// Formats export statistics for display.
pub fn format_stats(stats: &ExportStats) -> String {
    format!(
        "{}\n  Notebooks: {}\n  Notes: {}\n  Attachments: {}\n  Orphaned notes: {}",
        "📊 Statistics".bold(),
        stats.notebook_count.to_string().cyan(),
        stats.note_count.to_string().cyan(),
        stats.attachment_count.to_string().green(),
        stats.orphan_count.to_string().yellow()
    )
}

/// Truncates a string to max characters with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::domain::{IgnoreReason, NoteDraft, Notebook};

    use super::*;

    fn note(tags: &[&str], ctime: Option<i64>) -> Note {
        let mut model = ExportModel::new();
        model.add_notebook(Notebook::new("nb", Some("Work".into())));
        model.add_note(NoteDraft {
            id: "n1".into(),
            title: "Trip".into(),
            ctime,
            mtime: None,
            parent_id: "nb".into(),
            tags: tags.iter().map(ToString::to_string).collect(),
            content: "body".into(),
            attachments: Vec::new(),
        });
        model.notes()[0].clone()
    }

    fn quiet() -> MarkdownConfig {
        MarkdownConfig {
            insert_title: false,
            tags: false,
            ..MarkdownConfig::default()
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world!", 8), "hello...");
        assert_eq!(truncate("ééééé", 4), "é...");
    }

    #[test]
    fn test_links() {
        let media = PathBuf::from("/out/Work/media");
        assert_eq!(
            attachment_link(&media, "my photo.jpg", false, true),
            "file://media/my%20photo.jpg"
        );
        assert_eq!(
            attachment_link(&media, "my photo.jpg", true, true),
            "file:///out/Work/media/my%20photo.jpg"
        );
        assert_eq!(
            attachment_link(&media, "my photo.jpg", false, false),
            "media/my photo.jpg"
        );
        assert_eq!(
            attachment_link(&media, "my photo.jpg", true, false),
            "/out/Work/media/my photo.jpg"
        );
    }

    #[test]
    fn test_text_block() {
        let config = MarkdownConfig {
            tag_prepend: "#".into(),
            no_spaces_in_tags: true,
            ..MarkdownConfig::default()
        };
        let block = metadata_block(
            &config,
            &note(&["road trip", "food"], None),
            &["[a.pdf](media/a.pdf)".to_string()],
        );
        assert_eq!(
            block,
            "Trip\n====\nTags: #road_trip, #food  \nAttachments: [a.pdf](media/a.pdf)  \n"
        );
    }

    #[test]
    fn test_yaml_block() {
        let config = MarkdownConfig {
            meta_data_in_yaml: true,
            ..MarkdownConfig::default()
        };
        let block = metadata_block(&config, &note(&["food"], None), &["[a](b)".to_string()]);
        assert_eq!(
            block,
            "---\nTitle: \"Trip\"\nTags: [food]\n---\n\nAttachments:  [a](b)\n"
        );
    }

    #[test]
    fn test_times_only_when_enabled() {
        let stamped = note(&[], Some(1_700_000_000));
        assert_eq!(metadata_block(&quiet(), &stamped, &[]), "");

        let config = MarkdownConfig {
            insert_ctime: true,
            ..quiet()
        };
        let block = metadata_block(&config, &stamped, &[]);
        let expected = format_time(1_700_000_000).unwrap();
        assert_eq!(block, format!("Created: {expected}  \n"));
    }

    #[test]
    fn test_empty_block() {
        let yaml = MarkdownConfig {
            meta_data_in_yaml: true,
            ..quiet()
        };
        assert_eq!(metadata_block(&quiet(), &note(&["x"], None), &[]), "");
        assert_eq!(metadata_block(&yaml, &note(&[], None), &[]), "");
    }

    #[test]
    fn test_sync_report_lists_ignored() {
        let mut report = SyncReport::default();
        report.ignore("Trip", "photo.jpg", IgnoreReason::Duplicate);
        report.uploaded = 2;

        let out = format_sync_report(&report, false);
        assert!(out.contains("photo.jpg"));
        assert!(out.contains("DUPLICATE"));
        assert!(out.contains("Uploaded"));
    }
}
