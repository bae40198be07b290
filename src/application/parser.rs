//! JSON parsing for NoteStation entities.
//!
//! Handles conversion from raw export entries to domain models.

use serde::{Deserialize, Deserializer};

use crate::domain::{AppError, Attachment, NoteDraft, Notebook, Result};

use super::convert::html_to_markdown;
use super::paths::sanitize;

/// Prefix NoteStation adds to pasted image names.
const IMAGE_NAME_PREFIX: &str = "ns_attach_image_";

/// Raw notebook data as stored in the export.
#[derive(Debug, Deserialize)]
struct RawNotebook {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, deserialize_with = "epoch")]
    ctime: Option<i64>,
    #[serde(default, deserialize_with = "epoch")]
    mtime: Option<i64>,
}

/// Raw note data as stored in the export.
#[derive(Debug, Deserialize)]
struct RawNote {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, deserialize_with = "epoch")]
    ctime: Option<i64>,
    #[serde(default, deserialize_with = "epoch")]
    mtime: Option<i64>,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    tag: Option<Vec<String>>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    attachment: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Raw attachment descriptor.
#[derive(Debug, Deserialize)]
struct RawAttachment {
    #[serde(default)]
    md5: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "ref")]
    reference: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

/// Parses a notebook from raw JSON bytes.
///
/// # Errors
/// Returns error if JSON parsing fails.
pub fn parse_notebook(id: &str, data: &[u8]) -> Result<Notebook> {
    let raw: RawNotebook = serde_json::from_slice(data).map_err(AppError::json_parse)?;
    Ok(Notebook::new(id, raw.title).with_times(raw.ctime, raw.mtime))
}

/// Parses a note from raw JSON bytes.
///
/// # Errors
/// Returns error if JSON parsing fails or a required field is missing.
pub fn parse_note(id: &str, data: &[u8]) -> Result<NoteDraft> {
    let raw: RawNote = serde_json::from_slice(data).map_err(AppError::json_parse)?;

    let title = raw
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::MissingField {
            entity: format!("note {id}"),
            field: "title",
        })?;

    let attachments = raw
        .attachment
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| parse_attachment(id, &key, value))
        .collect::<Result<Vec<_>>>()?;

    let mut tags: Vec<String> = Vec::new();
    for tag in raw.tag.unwrap_or_default() {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    Ok(NoteDraft {
        id: id.to_string(),
        title,
        ctime: raw.ctime,
        mtime: raw.mtime,
        parent_id: raw.parent_id.unwrap_or_default(),
        tags,
        content: html_to_markdown(raw.content.as_deref().unwrap_or_default()),
        attachments,
    })
}

fn parse_attachment(note_id: &str, key: &str, value: serde_json::Value) -> Result<Attachment> {
    let raw: RawAttachment = serde_json::from_value(value).map_err(AppError::json_parse)?;

    let md5 = raw
        .md5
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::MissingField {
            entity: format!("attachment {key} of note {note_id}"),
            field: "md5",
        })?;

    let name = raw.name.unwrap_or_else(|| md5.clone());
    let name = sanitize(&name).replace(IMAGE_NAME_PREFIX, "");

    Ok(Attachment {
        name,
        md5,
        reference: raw.reference.filter(|r| !r.is_empty()),
        source: raw.source.filter(|s| !s.is_empty()),
    })
}

/// Epoch seconds given as an integer, a float or a numeric string; zero,
/// empty and null mean absent.
fn epoch<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    #[allow(clippy::cast_possible_truncation)]
    let seconds = match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    };
    Ok(seconds.filter(|s| *s != 0))
}
