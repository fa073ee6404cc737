//! The full backend: requests through a full-featured HTTP client
//!
//! Everything the raw path skips (redirects, cookies, decompression,
//! certificate handling) is delegated to reqwest. Useful as a
//! correctness baseline against the raw backend; the pool is sized to
//! the connection count so each worker effectively keeps one
//! connection alive.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};

use crate::config::LoadConfig;
use crate::error::{ClientError, Result};
use crate::request::{Request, Response};

use super::{HttpClient, Worker};

/// Backend wrapping a shared [`reqwest::Client`]
pub struct FullClient {
    client: Option<reqwest::Client>,
    method: Method,
    url: Option<Url>,
    headers: HeaderMap,
    body: Bytes,
    timeout: Duration,
}

impl FullClient {
    /// The actual construction happens in `init`
    pub fn new() -> Self {
        Self {
            client: None,
            method: Method::GET,
            url: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            timeout: Duration::ZERO,
        }
    }
}

impl Default for FullClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for FullClient {
    fn name(&self) -> &'static str {
        "full"
    }

    fn init(&mut self, config: &LoadConfig, request: &Request) -> Result<()> {
        self.client = Some(
            reqwest::Client::builder()
                .timeout(config.timeout)
                .pool_max_idle_per_host(config.connections)
                .build()?,
        );
        self.method = Method::from_bytes(request.method().as_bytes())
            .map_err(|e| ClientError::InvalidRequest(format!("method: {e}")))?;
        self.url = Some(request.url().clone());
        self.headers = build_header_map(request.headers())?;
        self.body = request.body().clone();
        self.timeout = config.timeout;
        Ok(())
    }

    async fn create_worker(&self) -> Result<Box<dyn Worker>> {
        let client = self
            .client
            .clone()
            .ok_or_else(|| ClientError::InvalidRequest("client not initialized".into()))?;
        let url = self
            .url
            .clone()
            .ok_or_else(|| ClientError::InvalidRequest("client not initialized".into()))?;
        Ok(Box::new(FullWorker {
            client,
            method: self.method.clone(),
            url,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }))
    }
}

fn build_header_map(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ClientError::InvalidRequest(format!("header name `{name}`: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ClientError::InvalidRequest(format!("header value: {e}")))?;
        map.append(name, value);
    }
    Ok(map)
}

struct FullWorker {
    client: reqwest::Client,
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
}

#[async_trait]
impl Worker for FullWorker {
    async fn do_static_request(&mut self, response: &mut Response) -> Result<()> {
        let resp = self
            .client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone())
            .body(self.body.clone())
            .send()
            .await?;
        response.status_code = resp.status().as_u16();
        // body bytes only; header bytes are not accounted for
        let body = resp.bytes().await?;
        response.size = body.len() as u64;
        Ok(())
    }
}
