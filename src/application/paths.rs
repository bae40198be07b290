//! Filesystem-safe naming.
//!
//! Titles become bounded file and directory names; collisions are resolved
//! with numeric suffixes.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Maximum length of a generated name, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Maximum length of a generated name, in bytes. Leaves room under the
/// common 255-byte limit for a collision suffix and an extension.
pub const MAX_NAME_BYTES: usize = 240;

/// Name used when sanitizing leaves nothing usable.
const FALLBACK_NAME: &str = "Untitled";

/// Makes a title safe to use as a single path component.
///
/// Path separators and other hostile characters are replaced or removed,
/// percent-escapes are decoded and the result is truncated to
/// [`MAX_NAME_LEN`] characters and [`MAX_NAME_BYTES`] bytes. Decoding and
/// substitution repeat until the name is stable, so sanitizing twice yields
/// the same name.
#[must_use]
pub fn sanitize(name: &str) -> String {
    let mut current = name.to_string();
    loop {
        let next = substitute(&percent_decode(&current));
        if next == current {
            break;
        }
        current = next;
    }

    let truncated = truncate(&current);
    if truncated.trim().is_empty() || truncated.chars().all(|c| c == '.') {
        FALLBACK_NAME.to_string()
    } else {
        truncated
    }
}

/// Cuts on a char boundary within both length limits.
fn truncate(name: &str) -> String {
    let mut bytes = 0;
    name.chars()
        .take(MAX_NAME_LEN)
        .take_while(|c| {
            bytes += c.len_utf8();
            bytes <= MAX_NAME_BYTES
        })
        .collect()
}

fn substitute(name: &str) -> String {
    name.chars()
        .filter_map(|c| match c {
            ':' | '/' | '\\' | '|' => Some('-'),
            '?' | '*' => None,
            '<' => Some('('),
            '>' => Some(')'),
            '"' => Some('\''),
            other => Some(other),
        })
        .collect()
}

fn percent_decode(name: &str) -> String {
    match urlencoding::decode_binary(name.as_bytes()) {
        Cow::Borrowed(_) => name.to_string(),
        Cow::Owned(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
    }
}

/// Picks a directory path under `base` that does not exist yet.
///
/// Tries `name`, then `name_1`, `name_2`, ...
#[must_use]
pub fn unique_dir(base: &Path, name: &str) -> PathBuf {
    let name = sanitize(name);
    let mut candidate = base.join(&name);
    let mut n = 1;
    while candidate.exists() {
        candidate = base.join(format!("{name}_{n}"));
        n += 1;
    }
    candidate
}

/// Picks a file name inside `dir` that does not exist yet.
///
/// Tries `file_name`, then `stem_1.ext`, `stem_2.ext`, ...
#[must_use]
pub fn unique_file_name(dir: &Path, file_name: &str) -> String {
    let mut candidate = file_name.to_string();
    let mut n = 1;
    while dir.join(&candidate).exists() {
        candidate = numbered(file_name, n);
        n += 1;
    }
    candidate
}

fn numbered(file_name: &str, n: usize) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{n}.{ext}"),
        _ => format!("{file_name}_{n}"),
    }
}
