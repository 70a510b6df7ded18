//! Catalog document sources.
//!
//! A source resolves an opaque document id (`controls.json`,
//! `control-tips.json`, ...) to raw bytes. Directory and HTTP sources ship
//! with the core.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CACHE_CONTROL};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use url::Url;

/// Failure while fetching one document.
#[derive(Debug)]
pub enum SourceError {
    Io {
        document: String,
        source: std::io::Error,
    },
    Http {
        document: String,
        source: reqwest::Error,
    },
    InvalidLocation(String),
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { document, source } => write!(f, "failed to read `{document}`: {source}"),
            Self::Http { document, source } => {
                write!(f, "failed to fetch `{document}`: {source}")
            }
            Self::InvalidLocation(value) => write!(f, "invalid catalog location: {value}"),
        }
    }
}

impl Error for SourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Http { source, .. } => Some(source),
            Self::InvalidLocation(_) => None,
        }
    }
}

/// Fetches static catalog documents by id.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self, document: &str) -> Result<Vec<u8>, SourceError>;

    /// Short description for log lines (`dir:/srv/data`, `http://...`).
    fn describe(&self) -> String;
}

/// Reads documents from a local directory.
#[derive(Debug, Clone)]
pub struct FileCatalogSource {
    root: PathBuf,
}

impl FileCatalogSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    async fn fetch(&self, document: &str) -> Result<Vec<u8>, SourceError> {
        tokio::fs::read(self.root.join(document))
            .await
            .map_err(|source| SourceError::Io {
                document: document.to_string(),
                source,
            })
    }

    fn describe(&self) -> String {
        format!("dir:{}", self.root.display())
    }
}

/// Fetches documents relative to a base URL, bypassing HTTP caches.
#[derive(Debug, Clone)]
pub struct HttpCatalogSource {
    client: reqwest::Client,
    base: Url,
}

impl HttpCatalogSource {
    pub fn new(base: &str) -> Result<Self, SourceError> {
        let mut base =
            Url::parse(base).map_err(|err| SourceError::InvalidLocation(format!("{base}: {err}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base,
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch(&self, document: &str) -> Result<Vec<u8>, SourceError> {
        let url = self
            .base
            .join(document)
            .map_err(|err| SourceError::InvalidLocation(format!("{document}: {err}")))?;
        let http_error = |source: reqwest::Error| SourceError::Http {
            document: document.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, HeaderValue::from_static("no-store"))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(http_error)?;
        let body = response.bytes().await.map_err(http_error)?;
        Ok(body.to_vec())
    }

    fn describe(&self) -> String {
        self.base.to_string()
    }
}

/// Picks an HTTP source for `http(s)://` locations and a directory source
/// otherwise.
pub fn source_for_location(location: &str) -> Result<Box<dyn CatalogSource>, SourceError> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return Err(SourceError::InvalidLocation(
            "location cannot be empty".to_string(),
        ));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Ok(Box::new(HttpCatalogSource::new(trimmed)?));
    }
    Ok(Box::new(FileCatalogSource::new(trimmed)))
}

#[cfg(test)]
mod tests {
    use super::{
        source_for_location, CatalogSource, FileCatalogSource, HttpCatalogSource, SourceError,
    };
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves `/base/controls.json` and 404s everything else, recording
    /// each request head.
    async fn serve_catalog(listener: TcpListener, heads: Arc<Mutex<Vec<String>>>) {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let head = String::from_utf8_lossy(&request).to_ascii_lowercase();
            let (status, body) = if head.starts_with("get /base/controls.json ") {
                ("200 OK", r#"{"families":[]}"#)
            } else {
                ("404 Not Found", "missing")
            };
            heads.lock().unwrap().push(head);
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    }

    #[test]
    fn http_base_gets_trailing_slash() {
        let source = HttpCatalogSource::new("https://example.test/data").unwrap();
        assert_eq!(source.describe(), "https://example.test/data/");
    }

    #[test]
    fn location_picks_source_kind() {
        let http = source_for_location("https://example.test/").unwrap();
        assert!(http.describe().starts_with("https://"));
        let dir = source_for_location("/srv/data").unwrap();
        assert!(dir.describe().starts_with("dir:"));
        assert!(source_for_location("  ").is_err());
    }

    #[tokio::test]
    async fn file_source_reports_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileCatalogSource::new(dir.path());
        let err = source.fetch("controls.json").await.unwrap_err();
        assert!(err.to_string().contains("controls.json"));
    }

    #[tokio::test]
    async fn http_source_bypasses_cache_and_maps_status_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let heads: Arc<Mutex<Vec<String>>> = Arc::default();
        let server = tokio::spawn(serve_catalog(listener, Arc::clone(&heads)));

        let source = HttpCatalogSource::new(&format!("http://{addr}/base")).unwrap();
        let body = source.fetch("controls.json").await.unwrap();
        assert_eq!(body, br#"{"families":[]}"#);

        let err = source.fetch("control-tips.json").await.unwrap_err();
        match &err {
            SourceError::Http { document, source } => {
                assert_eq!(document, "control-tips.json");
                assert_eq!(source.status().map(|status| status.as_u16()), Some(404));
            }
            other => panic!("unexpected error: {other}"),
        }

        let heads = heads.lock().unwrap().clone();
        assert_eq!(heads.len(), 2);
        assert!(heads
            .iter()
            .all(|head| head.contains("\r\ncache-control: no-store\r\n")));
        server.abort();
    }
}
