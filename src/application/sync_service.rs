//! Paperless-ngx synchronization pipeline.
//!
//! Uploads every eligible attachment as a document, tagged with the note's
//! tags and notebook, and attaches the note body to the created document.
//! Re-runs skip documents already present in the store.

use std::collections::HashMap;
use std::fs;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::DateTime;
use chrono_tz::Tz;
use tempfile::TempDir;

use crate::domain::{
    AppError, Attachment, CancellationToken, DocumentFields, DocumentId, DocumentStore,
    ExportModel, IgnoreReason, Note, PaperlessConfig, Result, SyncOptions, SyncReport, SyncStop,
    TagId, TaskInfo, TaskStatus,
};
use crate::infrastructure::ArchiveReader;

use super::resolver::AttachmentResolver;

/// Delay between two task status polls.
pub const POLL_DELAY: Duration = Duration::from_secs(5);

/// Status queries before a task is given up on.
pub const MAX_POLLS: usize = 360;

/// Result of handling one attachment.
enum Outcome {
    Uploaded,
    Ignored(IgnoreReason),
}

/// Drives the upload of an export to a [`DocumentStore`].
pub struct SyncPipeline<'a, R: Read + Seek, S: DocumentStore> {
    model: &'a ExportModel,
    store: &'a S,
    resolver: AttachmentResolver<'a, R>,
    allowed: Vec<String>,
    html_ignored: Vec<String>,
    tz: Tz,
    cancel: CancellationToken,
    poll_delay: Duration,
    tag_cache: Option<HashMap<String, TagId>>,
    scratch: TempDir,
}

impl<'a, R: Read + Seek, S: DocumentStore> SyncPipeline<'a, R, S> {
    /// Creates a pipeline with its own scratch directory.
    ///
    /// # Errors
    /// Returns error if the timezone is unknown or the scratch directory
    /// cannot be created.
    pub fn new(
        archive: &'a ArchiveReader<R>,
        model: &'a ExportModel,
        store: &'a S,
        config: &PaperlessConfig,
    ) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("notestation-sync")
            .tempdir()
            .map_err(|e| AppError::io("Failed to create scratch directory", e))?;

        Ok(Self {
            model,
            store,
            resolver: AttachmentResolver::new(archive, model),
            allowed: config.allowed_extensions(),
            html_ignored: config.ignored_for_html_notes(),
            tz: config.tz()?,
            cancel: CancellationToken::new(),
            poll_delay: POLL_DELAY,
            tag_cache: None,
            scratch,
        })
    }

    /// Uses `token` to stop the run between attachments.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Overrides the delay between task status polls.
    #[must_use]
    pub const fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    /// Processes every note in export order.
    ///
    /// Per-attachment failures are recorded in the report and never abort
    /// the run.
    pub fn run(&mut self, options: &SyncOptions) -> SyncReport {
        let mut report = SyncReport::default();
        let mut started = options.restart_from.is_none();

        if options.limit == Some(0) {
            report.stop = SyncStop::LimitReached;
            return report;
        }

        let model = self.model;
        'notes: for note in model.notes() {
            if !started {
                if options.restart_from.as_deref() == Some(note.title.as_str()) {
                    tracing::info!("Restarting from note \"{}\"", note.title);
                    started = true;
                } else {
                    report.skipped_notes += 1;
                    continue;
                }
            }

            report.processed_notes += 1;
            let allowed = self.allowed_for(note);
            let tags = model.effective_tags(note);

            for attachment in &note.attachments {
                match self.process(note, attachment, &allowed, &tags, options.dry_run) {
                    Outcome::Uploaded => report.uploaded += 1,
                    Outcome::Ignored(reason) => report.ignore(&note.title, &attachment.name, reason),
                }

                if options.limit.is_some_and(|limit| report.uploaded >= limit) {
                    tracing::info!("Upload limit reached");
                    report.stop = SyncStop::LimitReached;
                    break 'notes;
                }
                if self.cancel.is_cancelled() {
                    tracing::warn!("Sync interrupted after \"{}\"", attachment.name);
                    report.stop = SyncStop::Cancelled;
                    break 'notes;
                }
            }
        }

        if !started {
            if let Some(title) = &options.restart_from {
                tracing::warn!("No note titled \"{title}\", nothing was processed");
            }
        }

        tracing::info!(
            uploaded = report.uploaded,
            ignored = report.ignored.len(),
            "Sync finished"
        );
        report
    }

    /// Allowed extensions for a note. Notes with an HTML attachment exclude
    /// the HTML ignore list for all their attachments.
    fn allowed_for(&self, note: &Note) -> Vec<String> {
        if note.has_html_attachment() {
            self.allowed
                .iter()
                .filter(|ext| !self.html_ignored.contains(ext))
                .cloned()
                .collect()
        } else {
            self.allowed.clone()
        }
    }

    fn process(
        &mut self,
        note: &Note,
        attachment: &Attachment,
        allowed: &[String],
        tags: &[String],
        dry_run: bool,
    ) -> Outcome {
        if !attachment
            .extension()
            .is_some_and(|ext| allowed.contains(&ext))
        {
            return Outcome::Ignored(IgnoreReason::WrongExtension);
        }

        match self.is_duplicate(note, attachment) {
            Ok(true) => return Outcome::Ignored(IgnoreReason::Duplicate),
            Ok(false) => {}
            Err(e) => return Outcome::Ignored(IgnoreReason::Exception(e.to_string())),
        }

        if dry_run {
            tracing::info!("Would upload \"{}\" from \"{}\"", attachment.name, note.title);
            return Outcome::Uploaded;
        }

        let file = match self.extract(note, attachment) {
            Ok(file) => file,
            Err(e) if e.is_not_found() => return Outcome::Ignored(IgnoreReason::NotFound),
            Err(e) => return Outcome::Ignored(IgnoreReason::Exception(e.to_string())),
        };

        let posted = self.post(note, &file, tags);
        let _ = fs::remove_file(&file);

        match posted {
            Ok(Some(document)) => {
                tracing::info!("Uploaded \"{}\" as document {document}", attachment.name);
                match self.store.add_note(document, &note.content) {
                    Ok(()) => Outcome::Uploaded,
                    Err(e) => Outcome::Ignored(IgnoreReason::Exception(e.to_string())),
                }
            }
            Ok(None) => Outcome::Ignored(IgnoreReason::FailedUpload),
            Err(e) => Outcome::Ignored(IgnoreReason::Exception(e.to_string())),
        }
    }

    fn is_duplicate(&self, note: &Note, attachment: &Attachment) -> Result<bool> {
        let documents = self.store.find_documents(&note.title)?;
        Ok(documents.iter().any(|doc| {
            doc.title == note.title
                && doc.original_file_name.as_deref() == Some(attachment.name.as_str())
        }))
    }

    /// Writes the attachment bytes into the scratch directory.
    fn extract(&self, note: &Note, attachment: &Attachment) -> Result<PathBuf> {
        let found = self
            .resolver
            .resolve(&note.id, &attachment.md5, Some(&attachment.name))?;

        let path = self.scratch.path().join(&found.file_name);
        fs::write(&path, &found.data)
            .map_err(|e| AppError::io(format!("Failed to write {}", path.display()), e))?;
        Ok(path)
    }

    /// Posts a document and waits for its processing task.
    ///
    /// Returns `None` when the task fails or yields no document.
    fn post(&mut self, note: &Note, file: &Path, tags: &[String]) -> Result<Option<DocumentId>> {
        let fields = DocumentFields {
            title: note.title.clone(),
            tags: self.tag_ids(tags)?,
            created: note.ctime.and_then(|ctime| self.render_created(ctime)),
        };

        let task = self.store.post_document(file, &fields)?;
        let info = self.wait_for(&task)?;

        match (info.status, info.related_document) {
            (TaskStatus::Success, Some(document)) => Ok(Some(document)),
            (status, _) => {
                tracing::warn!(
                    task = %task,
                    "Processing ended with {status:?}: {}",
                    info.result.as_deref().unwrap_or("no result")
                );
                Ok(None)
            }
        }
    }

    fn wait_for(&self, task: &str) -> Result<TaskInfo> {
        for _ in 0..MAX_POLLS {
            let info = self.store.task_status(task)?;
            if info.status.is_terminal() {
                return Ok(info);
            }
            tracing::debug!(task, "Task status {:?}", info.status);
            thread::sleep(self.poll_delay);
        }
        Err(AppError::Http {
            message: format!("Task {task} not finished after {MAX_POLLS} status queries"),
            source: None,
        })
    }

    /// Resolves tag names to ids, creating missing tags.
    fn tag_ids(&mut self, tags: &[String]) -> Result<Vec<TagId>> {
        let cache = match &mut self.tag_cache {
            Some(cache) => cache,
            empty => {
                let known = self
                    .store
                    .tags()?
                    .into_iter()
                    .map(|(name, id)| (name.to_lowercase(), id))
                    .collect();
                empty.insert(known)
            }
        };

        let mut ids = Vec::with_capacity(tags.len());
        for tag in tags {
            let id = match cache.get(tag) {
                Some(id) => *id,
                None => {
                    let id = self.store.create_tag(tag)?;
                    tracing::info!("Created tag \"{tag}\"");
                    cache.insert(tag.clone(), id);
                    id
                }
            };
            ids.push(id);
        }
        Ok(ids)
    }

    fn render_created(&self, ctime: i64) -> Option<String> {
        DateTime::from_timestamp(ctime, 0).map(|dt| {
            dt.with_timezone(&self.tz)
                .format("%Y-%m-%d %H:%M:%S%:z")
                .to_string()
        })
    }
}
