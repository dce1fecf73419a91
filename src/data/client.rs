//! HTTP client for the category catalog endpoint
//!
//! Fetches the flat category list with a single GET and maps every way that
//! can fail onto [`FetchError`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use super::CategoryRecord;

/// Errors that can occur when fetching the catalog
///
/// Holds messages rather than the underlying errors so one result can be
/// handed to every caller waiting on the same fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The server answered with a non-success status
    #[error("HTTP error! status: {0}")]
    HttpStatus(u16),

    /// The request could not complete (connection refused, DNS, reset)
    #[error("{0}")]
    Transport(String),

    /// The attempt ran longer than the configured timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The body was not a JSON array of categories
    #[error("Failed to parse catalog response: {0}")]
    Decode(String),

    /// The fetch task stopped before producing a result
    #[error("catalog fetch aborted: {0}")]
    Aborted(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::HttpStatus(status.as_u16())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

/// Something that can produce the flat category list
///
/// [`CatalogClient`] is the HTTP implementation; tests plug in scripted ones.
#[async_trait]
pub trait CatalogSource: Send + Sync + 'static {
    async fn fetch_categories(&self) -> Result<Vec<CategoryRecord>, FetchError>;
}

/// Client for fetching the category list over HTTP
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http_client: Client,
    endpoint: String,
    /// Transport timeout, reported in [`FetchError::Timeout`] when it fires
    timeout: Option<Duration>,
}

impl CatalogClient {
    /// Creates a client for `endpoint` using a default HTTP client
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    /// Creates a client whose transport gives up after `timeout`
    ///
    /// Falls back to a default client if the configured one cannot be built.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            timeout: Some(timeout),
            ..Self::with_client(http_client, endpoint)
        }
    }

    /// Creates a client with a custom HTTP client
    pub fn with_client(http_client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            timeout: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetches the flat category list
    ///
    /// # Returns
    /// * `Ok(Vec<CategoryRecord>)` - every record in the order the server sent them
    /// * `Err(FetchError::HttpStatus)` - the server answered with a non-2xx status
    /// * `Err(FetchError::Timeout)` - the transport timeout fired
    /// * `Err(FetchError::Transport)` - the request never completed
    /// * `Err(FetchError::Decode)` - the body was not a category array
    pub async fn fetch(&self) -> Result<Vec<CategoryRecord>, FetchError> {
        debug!(endpoint = %self.endpoint, "fetching categories");

        let response = self
            .http_client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|err| self.map_error(err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let text = response.text().await.map_err(|err| self.map_error(err))?;
        let records: Vec<CategoryRecord> = serde_json::from_str(&text)?;

        debug!(count = records.len(), "fetched categories");
        Ok(records)
    }

    fn map_error(&self, err: reqwest::Error) -> FetchError {
        match self.timeout {
            Some(timeout) if err.is_timeout() => FetchError::Timeout(timeout),
            _ => FetchError::from(err),
        }
    }
}

#[async_trait]
impl CatalogSource for CatalogClient {
    async fn fetch_categories(&self) -> Result<Vec<CategoryRecord>, FetchError> {
        self.fetch().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response on a local port and returns its URL
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{}/api/categories/", addr)
    }

    #[tokio::test]
    async fn test_fetch_parses_category_array() {
        let url = serve_once(
            "200 OK",
            r#"[{"id":"1","name":"Shoes","slug":"shoes","parent":null},{"id":"2","name":"Boots","slug":"boots","parent":"1"}]"#,
        )
        .await;

        let records = CatalogClient::new(url).fetch().await.unwrap();

        assert_eq!(records.len(), 2);
        assert!(records[0].parent.is_root());
        assert_eq!(records[1].parent.id().map(|id| id.as_str()), Some("1"));
    }

    #[tokio::test]
    async fn test_non_success_status_carries_code() {
        let url = serve_once("500 Internal Server Error", "").await;

        let err = CatalogClient::new(url).fetch().await.unwrap_err();

        assert_eq!(err, FetchError::HttpStatus(500));
        assert_eq!(err.to_string(), "HTTP error! status: 500");
    }

    #[tokio::test]
    async fn test_non_array_body_is_a_decode_error() {
        let url = serve_once("200 OK", r#"{"detail":"not a list"}"#).await;

        let err = CatalogClient::new(url).fetch().await.unwrap_err();

        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_refused_connection_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = CatalogClient::with_timeout(
            format!("http://{}/api/categories/", addr),
            Duration::from_secs(5),
        );
        let err = client.fetch().await.unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)), "got {err:?}");
        assert!(!err.to_string().is_empty());
    }

    #[tokio::test]
    async fn test_silent_server_is_a_timeout_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        });

        let client = CatalogClient::with_timeout(
            format!("http://{}/api/categories/", addr),
            Duration::from_millis(50),
        );
        let err = client.fetch().await.unwrap_err();

        assert_eq!(err, FetchError::Timeout(Duration::from_millis(50)));
    }

    #[test]
    fn test_endpoint_is_kept() {
        let client = CatalogClient::new("http://catalog.local/api/categories/");
        assert_eq!(client.endpoint(), "http://catalog.local/api/categories/");
    }
}
