//! The pooled backend: hyper's HTTP/1.1 client and connection pool
//!
//! Sits between `raw` and `full`: real HTTP library framing with a
//! shared keep-alive pool, but none of reqwest's higher-level
//! machinery. The pool is sized to the connection count.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::{Method, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::config::LoadConfig;
use crate::error::{ClientError, Result};
use crate::request::{Request, Response};

use super::{HttpClient, Worker};

type PoolClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Backend wrapping the hyper legacy pooled client
pub struct PooledClient {
    client: Option<PoolClient>,
    method: Method,
    uri: Option<Uri>,
    headers: HeaderMap,
    body: Bytes,
    timeout: Duration,
}

impl PooledClient {
    /// The actual construction happens in `init`
    pub fn new() -> Self {
        Self {
            client: None,
            method: Method::GET,
            uri: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            timeout: Duration::ZERO,
        }
    }
}

impl Default for PooledClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for PooledClient {
    fn name(&self) -> &'static str {
        "pooled"
    }

    fn init(&mut self, config: &LoadConfig, request: &Request) -> Result<()> {
        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        self.client = Some(
            Client::builder(TokioExecutor::new())
                .pool_max_idle_per_host(config.connections)
                .build(https),
        );
        self.method = Method::from_bytes(request.method().as_bytes())
            .map_err(|e| ClientError::InvalidRequest(format!("method: {e}")))?;
        self.uri = Some(
            request
                .url()
                .as_str()
                .parse::<Uri>()
                .map_err(|e| ClientError::InvalidRequest(format!("uri: {e}")))?,
        );
        let mut headers = HeaderMap::with_capacity(request.headers().len());
        for (name, value) in request.headers() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::InvalidRequest(format!("header name `{name}`: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ClientError::InvalidRequest(format!("header value: {e}")))?;
            headers.append(name, value);
        }
        self.headers = headers;
        self.body = request.body().clone();
        self.timeout = config.timeout;
        Ok(())
    }

    async fn create_worker(&self) -> Result<Box<dyn Worker>> {
        let client = self
            .client
            .clone()
            .ok_or_else(|| ClientError::InvalidRequest("client not initialized".into()))?;
        let uri = self
            .uri
            .clone()
            .ok_or_else(|| ClientError::InvalidRequest("client not initialized".into()))?;
        Ok(Box::new(PooledWorker {
            client,
            method: self.method.clone(),
            uri,
            headers: self.headers.clone(),
            body: self.body.clone(),
            timeout: self.timeout,
        }))
    }
}

struct PooledWorker {
    client: PoolClient,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    timeout: Duration,
}

impl PooledWorker {
    /// hyper requests are consumed on send, so each cycle rebuilds one
    /// from the shared frozen parts
    fn to_request(&self) -> Result<hyper::Request<Full<Bytes>>> {
        let mut builder = hyper::Request::builder()
            .method(self.method.clone())
            .uri(self.uri.clone());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers.clone());
        }
        builder
            .body(Full::new(self.body.clone()))
            .map_err(|e| ClientError::InvalidRequest(format!("request build: {e}")))
    }
}

#[async_trait]
impl Worker for PooledWorker {
    async fn do_static_request(&mut self, response: &mut Response) -> Result<()> {
        let request = self.to_request()?;
        let resp = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))??;
        response.status_code = resp.status().as_u16();
        // drain the body so the connection can return to the pool;
        // body bytes only, as with the full backend
        let body = resp.into_body().collect().await?;
        response.size = body.to_bytes().len() as u64;
        Ok(())
    }
}
