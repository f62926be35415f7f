//! The network seam: everything that leaves the process goes through a
//! [`Transport`].
//!
//! [`HttpTransport`] is the production implementation. It speaks HTTP(S)
//! through `ureq` and also resolves `file://` URLs so that a local mirror
//! directory can stand in for the remote service.

use std::fs::File;
use std::io::Read;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Failure to fetch a URL.
#[derive(Debug, Error)]
#[error("{url}: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

impl TransportError {
    pub fn new(url: &str, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

/// A response body ready to be streamed.
pub struct Fetched {
    /// Body bytes.
    pub body: Box<dyn Read>,
    /// Length announced by the server, when it announced one.
    pub content_length: Option<u64>,
}

impl Fetched {
    pub fn new(body: impl Read + 'static, content_length: Option<u64>) -> Self {
        Self {
            body: Box::new(body),
            content_length,
        }
    }

    /// Reads the whole body into memory. Meant for small documents only.
    pub fn into_bytes(mut self, url: &str) -> Result<Vec<u8>, TransportError> {
        let mut bytes = Vec::new();
        self.body
            .read_to_end(&mut bytes)
            .map_err(|source| TransportError::new(url, source.to_string()))?;
        Ok(bytes)
    }
}

/// Fetches remote documents. Implementations must be shareable across threads.
pub trait Transport: Send + Sync {
    /// Issues a single GET for `url`. No retries happen at this layer.
    fn fetch(&self, url: &str) -> Result<Fetched, TransportError>;
}

/// `ureq`-backed transport with `file://` support.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Creates a transport that gives up when connecting, or waiting for
    /// response headers, takes longer than `timeout` (if given).
    ///
    /// Reading the body is never bounded: archives run to many gigabytes.
    pub fn new(timeout: Option<Duration>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_resolve(timeout)
            .timeout_connect(timeout)
            .timeout_send_request(timeout)
            .timeout_recv_response(timeout)
            .build();
        Self {
            agent: config.into(),
        }
    }

    fn fetch_file(url: &str, parsed: &url::Url) -> Result<Fetched, TransportError> {
        let path = parsed
            .to_file_path()
            .map_err(|()| TransportError::new(url, "not a local file path"))?;
        let file = File::open(&path).map_err(|source| TransportError::new(url, source.to_string()))?;
        let len = file
            .metadata()
            .map_err(|source| TransportError::new(url, source.to_string()))?
            .len();
        Ok(Fetched::new(file, Some(len)))
    }

    fn fetch_http(&self, url: &str) -> Result<Fetched, TransportError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|source| TransportError::new(url, source.to_string()))?;
        let body = response.into_body();
        let content_length = body.content_length();
        Ok(Fetched::new(body.into_reader(), content_length))
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS)))
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<Fetched, TransportError> {
        let parsed = url::Url::parse(url)
            .map_err(|source| TransportError::new(url, format!("invalid URL: {source}")))?;
        debug!(url, "fetching");

        match parsed.scheme() {
            "file" => Self::fetch_file(url, &parsed),
            "http" | "https" => self.fetch_http(url),
            other => Err(TransportError::new(
                url,
                format!("unsupported URL scheme '{other}'"),
            )),
        }
    }
}
