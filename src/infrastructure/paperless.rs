//! Paperless-ngx REST client.
//!
//! Blocking client with a shared cookie jar. Authentication follows the
//! web UI: fetch the CSRF cookie, then exchange credentials for an API
//! token unless one is configured.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::domain::{
    AppError, Credentials, DocumentFields, DocumentId, DocumentStore, PaperlessConfig,
    RemoteDocument, Result, TagId, TaskInfo, TaskStatus,
};

const CSRF_COOKIE: &str = "csrftoken";
const CSRF_HEADER: &str = "x-csrftoken";

/// Matching algorithm "none": tags are only assigned explicitly.
const MATCH_NONE: u8 = 6;

#[derive(Debug, Deserialize)]
struct Page<T> {
    next: Option<String>,
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RawTag {
    id: TagId,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    id: DocumentId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    original_file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    status: String,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    related_document: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Authenticated Paperless-ngx session.
pub struct PaperlessClient {
    client: Client,
    base_url: String,
}

impl PaperlessClient {
    /// Connects and authenticates.
    ///
    /// # Errors
    /// Returns error if credentials are missing or any request fails.
    pub fn connect(config: &PaperlessConfig) -> Result<Self> {
        let credentials = config.credentials()?;
        let base_url = config.paperless_url.trim_end_matches('/').to_string();
        let jar = Arc::new(Jar::default());

        let bootstrap = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(config.timeout())
            .build()
            .map_err(AppError::http)?;

        let response = send(bootstrap.get(&base_url))?;
        let csrf = response
            .cookies()
            .find(|c| c.name() == CSRF_COOKIE)
            .map(|c| c.value().to_string());
        if csrf.is_none() {
            tracing::debug!("No CSRF cookie returned by {base_url}");
        }

        let token = match credentials {
            Credentials::Token(token) => token,
            Credentials::Password { username, password } => {
                let mut request = bootstrap
                    .post(format!("{base_url}/api/token/"))
                    .json(&json!({ "username": username, "password": password }));
                if let Some(csrf) = &csrf {
                    request = request.header(CSRF_HEADER, csrf);
                }
                let response: TokenResponse = send_json(request)?;
                response.token
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&format!("Token {token}"))?);
        if let Some(csrf) = &csrf {
            headers.insert(CSRF_HEADER, header_value(csrf)?);
        }

        let client = Client::builder()
            .cookie_provider(jar)
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(AppError::http)?;

        tracing::info!("Connected to Paperless at {base_url}");

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends `first` and follows `next` links until the last page.
    fn all_pages<T: DeserializeOwned>(&self, first: RequestBuilder) -> Result<Vec<T>> {
        let page: Page<T> = send_json(first)?;
        let mut items = page.results;
        let mut next = page.next;

        while let Some(url) = next {
            let page: Page<T> = send_json(self.client.get(&url))?;
            items.extend(page.results);
            next = page.next;
        }
        Ok(items)
    }
}

impl DocumentStore for PaperlessClient {
    fn tags(&self) -> Result<HashMap<String, TagId>> {
        let tags: HashMap<String, TagId> = self
            .all_pages::<RawTag>(self.client.get(self.url("/api/tags/")))?
            .into_iter()
            .map(|t| (t.name, t.id))
            .collect();

        tracing::debug!("Fetched {} tags", tags.len());
        Ok(tags)
    }

    fn create_tag(&self, name: &str) -> Result<TagId> {
        let request = self
            .client
            .post(self.url("/api/tags/"))
            .json(&json!({ "name": name, "matching_algorithm": MATCH_NONE }));
        let tag: RawTag = send_json(request)?;

        tracing::info!(tag = %tag.name, id = tag.id, "Created tag");
        Ok(tag.id)
    }

    fn find_documents(&self, title: &str) -> Result<Vec<RemoteDocument>> {
        let request = self
            .client
            .get(self.url("/api/documents/"))
            .query(&[("title__iexact", title)]);
        let documents: Vec<RawDocument> = self.all_pages(request)?;

        Ok(documents
            .into_iter()
            .map(|d| RemoteDocument {
                id: d.id,
                title: d.title,
                original_file_name: d.original_file_name,
            })
            .collect())
    }

    fn post_document(&self, file: &Path, fields: &DocumentFields) -> Result<String> {
        let mut form = multipart::Form::new()
            .file("document", file)
            .map_err(|e| AppError::io(format!("Failed to attach {}", file.display()), e))?
            .text("title", fields.title.clone());
        for tag in &fields.tags {
            form = form.text("tags", tag.to_string());
        }
        if let Some(created) = &fields.created {
            form = form.text("created", created.clone());
        }

        let request = self
            .client
            .post(self.url("/api/documents/post_document/"))
            .multipart(form);
        send_json(request)
    }

    fn task_status(&self, task_id: &str) -> Result<TaskInfo> {
        let request = self
            .client
            .get(self.url("/api/tasks/"))
            .query(&[("task_id", task_id)]);
        let tasks: Vec<RawTask> = send_json(request)?;

        let task = tasks.into_iter().next().ok_or_else(|| AppError::Http {
            message: format!("Unknown task {task_id}"),
            source: None,
        })?;

        Ok(TaskInfo {
            status: TaskStatus::parse(&task.status),
            result: task.result,
            related_document: task.related_document.as_ref().and_then(document_id),
        })
    }

    fn add_note(&self, document: DocumentId, note: &str) -> Result<()> {
        let request = self
            .client
            .post(self.url(&format!("/api/documents/{document}/notes/")))
            .json(&json!({ "note": note }));
        send(request)?;
        Ok(())
    }
}

/// Document ids are reported either as integers or as numeric strings.
fn document_id(value: &serde_json::Value) -> Option<DocumentId> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| AppError::Config {
        message: format!("Invalid header value: {e}"),
    })
}

fn send(request: RequestBuilder) -> Result<Response> {
    request
        .send()
        .and_then(Response::error_for_status)
        .map_err(AppError::http)
}

fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    send(request)?.json().map_err(AppError::http)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::Mutex;
    use std::thread;

    use super::*;

    #[test]
    fn test_document_id_formats() {
        assert_eq!(document_id(&json!(42)), Some(42));
        assert_eq!(document_id(&json!("17")), Some(17));
        assert_eq!(document_id(&json!(null)), None);
        assert_eq!(document_id(&json!("abc")), None);
    }

    #[test]
    fn test_task_payload() {
        let tasks: Vec<RawTask> = serde_json::from_str(
            r#"[{"status":"SUCCESS","result":"done","related_document":"12"}]"#,
        )
        .unwrap();
        assert_eq!(TaskStatus::parse(&tasks[0].status), TaskStatus::Success);
        assert_eq!(tasks[0].related_document.as_ref().and_then(document_id), Some(12));
    }

    #[test]
    fn test_document_page() {
        let page: Page<RawDocument> = serde_json::from_str(
            r#"{"count":1,"next":null,"results":[{"id":3,"title":"Trip","original_file_name":"photo.jpg"}]}"#,
        )
        .unwrap();
        assert!(page.next.is_none());
        assert_eq!(page.results[0].original_file_name.as_deref(), Some("photo.jpg"));
    }

    /// Answers one request per connection with the body registered for its
    /// target, and records every requested target.
    fn serve(listener: TcpListener, pages: Vec<(String, String)>) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        thread::spawn(move || {
            for stream in listener.incoming().take(pages.len()) {
                let mut stream = stream.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut buf).unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                let head = String::from_utf8_lossy(&request);
                let target = head.split_whitespace().nth(1).unwrap_or("").to_string();
                let body = pages
                    .iter()
                    .find(|(path, _)| *path == target)
                    .map_or_else(|| "{}".to_string(), |(_, body)| body.clone());
                log.lock().unwrap().push(target);
                write!(
                    stream,
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
                .unwrap();
            }
        });

        seen
    }

    #[test]
    fn test_find_documents_follows_pages() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let first = json!({
            "count": 2,
            "next": format!("{base}/api/documents/?page=2&title__iexact=Trip"),
            "results": [{"id": 1, "title": "Trip", "original_file_name": "photo1.jpg"}],
        });
        let second = json!({
            "count": 2,
            "next": null,
            "results": [{"id": 26, "title": "Trip", "original_file_name": "photo26.jpg"}],
        });
        let seen = serve(
            listener,
            vec![
                ("/api/documents/?title__iexact=Trip".into(), first.to_string()),
                (
                    "/api/documents/?page=2&title__iexact=Trip".into(),
                    second.to_string(),
                ),
            ],
        );

        let store = PaperlessClient {
            client: Client::new(),
            base_url: base,
        };
        let documents = store.find_documents("Trip").unwrap();

        let names: Vec<Option<&str>> = documents
            .iter()
            .map(|d| d.original_file_name.as_deref())
            .collect();
        assert_eq!(names, vec![Some("photo1.jpg"), Some("photo26.jpg")]);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_connect_requires_credentials() {
        let config = PaperlessConfig::default();
        assert!(matches!(
            PaperlessClient::connect(&config),
            Err(AppError::Config { .. })
        ));
    }
}
