//! The frozen request and the per-worker response record

use bytes::Bytes;
use url::Url;

use crate::config::RequestConfig;
use crate::error::{ClientError, Result};

/// A fully built request, serialized exactly once at startup
///
/// Workers hold a cheap shared view of the raw bytes ([`Bytes`]) and
/// never reserialize. The parsed URL is kept alongside for backends
/// that need host/port/scheme or that rebuild the request through a
/// library.
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    url: Url,
    headers: Vec<(String, String)>,
    body: Bytes,
    raw: Bytes,
}

impl Request {
    /// Build and serialize the request from its configuration
    ///
    /// Adds a `Content-Length` header iff the body is non-empty. The
    /// method is taken as-is: promoting GET-with-body to POST is the
    /// caller's decision.
    pub fn build(config: &RequestConfig) -> Result<Self> {
        let url = Url::parse(&config.url)?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(ClientError::UnsupportedScheme(other.to_string())),
        }
        if url.host_str().is_none() {
            return Err(ClientError::InvalidRequest("url has no host".into()));
        }

        let method = config
            .method
            .clone()
            .unwrap_or_else(|| crate::config::DEFAULT_METHOD.to_string());
        let body = Bytes::from(config.body.clone());
        let raw = serialize(&method, &url, &config.headers, &body);

        Ok(Self {
            method,
            url,
            headers: config.headers.clone(),
            body,
            raw,
        })
    }

    /// HTTP method
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Parsed target URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Hostname of the target
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Target port; falls back to the scheme's well-known port
    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(80)
    }

    /// Whether the target scheme is `https`
    pub fn is_tls(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// Headers in serialization order, `Content-Length` excluded
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Request body; empty when no body was configured
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The serialized wire form; shared read-only with all workers
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }
}

fn serialize(method: &str, url: &Url, headers: &[(String, String)], body: &Bytes) -> Bytes {
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    // Host carries the port only when the URL names one explicitly
    let mut host = url.host_str().unwrap_or_default().to_string();
    if let Some(port) = url.port() {
        host.push(':');
        host.push_str(&port.to_string());
    }

    let mut out = Vec::with_capacity(128 + body.len());
    out.extend_from_slice(method.as_bytes());
    out.push(b' ');
    out.extend_from_slice(target.as_bytes());
    out.extend_from_slice(b" HTTP/1.1\r\nHost: ");
    out.extend_from_slice(host.as_bytes());
    out.extend_from_slice(b"\r\n");
    for (name, value) in headers {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    if !body.is_empty() {
        out.extend_from_slice(b"Content-Length: ");
        out.extend_from_slice(body.len().to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    Bytes::from(out)
}

/// Per-worker scratch record, overwritten in place on every cycle
#[derive(Debug, Clone, Copy, Default)]
pub struct Response {
    /// HTTP status code of the last response
    pub status_code: u16,
    /// Total bytes read for the last response, status line included
    pub size: u64,
}
