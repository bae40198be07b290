//! Configuration models.
//!
//! The configuration file uses flat keys, shared by the Markdown exporter
//! and the Paperless sync pipeline.

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::error::{AppError, Result};

/// Options for the Markdown export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownConfig {
    /// Output root directory.
    pub basepath: PathBuf,
    /// Include the note title in the metadata block.
    pub insert_title: bool,
    /// Include the creation time in the metadata block.
    pub insert_ctime: bool,
    /// Include the modification time in the metadata block.
    pub insert_mtime: bool,
    /// Include tags in the metadata block.
    pub tags: bool,
    /// Prefix added to every tag (e.g. `#`).
    pub tag_prepend: String,
    /// Separator between tags.
    pub tag_delimiter: String,
    /// Replace spaces in tags with underscores.
    pub no_spaces_in_tags: bool,
    /// Emit YAML front-matter instead of a plain-text header.
    pub meta_data_in_yaml: bool,
    /// Prefix note file names with the creation date.
    pub creation_date_in_filename: bool,
    /// Use absolute attachment links.
    pub absolute_links: bool,
    /// Render attachment links as `file://` URIs.
    #[serde(rename = "links_as_URI", alias = "links_as_uri")]
    pub links_as_uri: bool,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            basepath: PathBuf::from("export"),
            insert_title: true,
            insert_ctime: false,
            insert_mtime: false,
            tags: true,
            tag_prepend: String::new(),
            tag_delimiter: ", ".to_string(),
            no_spaces_in_tags: false,
            meta_data_in_yaml: false,
            creation_date_in_filename: false,
            absolute_links: false,
            links_as_uri: true,
        }
    }
}

/// Options for the Paperless-ngx upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperlessConfig {
    /// Base URL of the Paperless-ngx instance.
    pub paperless_url: String,
    /// Username, used when no token is configured.
    pub username: Option<String>,
    /// Password, used when no token is configured.
    pub password: Option<String>,
    /// API token.
    pub token: Option<String>,
    /// Request timeout in seconds.
    pub timeout: f64,
    /// Extensions eligible for upload.
    pub extensions: Vec<String>,
    /// Extensions skipped for notes that carry an HTML attachment.
    pub htmlnote_ignore: Vec<String>,
    /// IANA timezone used to render creation dates.
    pub timezone: String,
}

impl Default for PaperlessConfig {
    fn default() -> Self {
        Self {
            paperless_url: "http://localhost:8000".to_string(),
            username: None,
            password: None,
            token: None,
            timeout: 5.0,
            extensions: default_extensions(),
            htmlnote_ignore: vec!["htm".to_string(), "html".to_string()],
            timezone: "UTC".to_string(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    [
        "pdf", "jpg", "jpeg", "png", "gif", "tif", "tiff", "webp", "txt", "doc", "docx", "odt",
        "xls", "xlsx", "ods", "ppt", "pptx", "odp", "eml", "htm", "html",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// Paperless credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Pre-issued API token.
    Token(String),
    /// Username and password exchanged for a token.
    Password { username: String, password: String },
}

impl PaperlessConfig {
    /// Request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout).unwrap_or(Duration::from_secs(5))
    }

    /// Parse the configured timezone.
    ///
    /// # Errors
    /// Returns error if the name is not a known IANA timezone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone.parse::<Tz>().map_err(|e| AppError::Config {
            message: format!("Unknown timezone '{}': {e}", self.timezone),
        })
    }

    /// Credentials to authenticate with.
    ///
    /// # Errors
    /// Returns error if neither a token nor a username/password pair is set.
    pub fn credentials(&self) -> Result<Credentials> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(Credentials::Token(token.clone()));
        }

        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Ok(Credentials::Password {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => Err(AppError::Config {
                message: "Paperless requires either `token` or `username` and `password`".into(),
            }),
        }
    }

    /// Normalized set of uploadable extensions.
    #[must_use]
    pub fn allowed_extensions(&self) -> Vec<String> {
        normalize_extensions(&self.extensions)
    }

    /// Normalized set of extensions skipped for HTML notes.
    #[must_use]
    pub fn ignored_for_html_notes(&self) -> Vec<String> {
        normalize_extensions(&self.htmlnote_ignore)
    }
}

fn normalize_extensions(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Markdown export options.
    #[serde(flatten)]
    pub markdown: MarkdownConfig,

    /// Paperless upload options.
    #[serde(flatten)]
    pub paperless: PaperlessConfig,
}

impl AppConfig {
    /// Get the default configuration directory.
    #[must_use]
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("notestation-migrate")
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.markdown.insert_title);
        assert!(config.markdown.links_as_uri);
        assert_eq!(config.markdown.tag_delimiter, ", ");
        assert_eq!(config.paperless.timeout(), Duration::from_secs(5));
        assert!(config.paperless.allowed_extensions().contains(&"pdf".to_string()));
    }

    #[test]
    fn test_credentials() {
        let mut config = PaperlessConfig::default();
        assert!(config.credentials().is_err());

        config.username = Some("admin".into());
        config.password = Some("secret".into());
        assert_eq!(
            config.credentials().unwrap(),
            Credentials::Password {
                username: "admin".into(),
                password: "secret".into()
            }
        );

        config.token = Some("tok".into());
        assert_eq!(config.credentials().unwrap(), Credentials::Token("tok".into()));
    }

    #[test]
    fn test_timezone() {
        let mut config = PaperlessConfig::default();
        config.timezone = "Europe/Brussels".into();
        assert!(config.tz().is_ok());

        config.timezone = "Mars/Olympus".into();
        assert!(config.tz().is_err());
    }

    #[test]
    fn test_extension_normalization() {
        let config = PaperlessConfig {
            extensions: vec![".PDF".into(), " jpg ".into(), String::new()],
            ..PaperlessConfig::default()
        };
        assert_eq!(config.allowed_extensions(), vec!["pdf", "jpg"]);
    }
}
