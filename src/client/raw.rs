//! The raw backend: hand-rolled HTTP/1.1 over TCP or TLS
//!
//! Each worker owns a persistent connection and a fixed receive
//! buffer; a cycle is write_all, a header read loop, a synchronous
//! header parse, and a body drain loop. Nothing is allocated per
//! cycle. The read deadline is absolute, renewed before every send.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::config::LoadConfig;
use crate::error::{ClientError, Result};
use crate::request::{Request, Response};

use super::parser::ResponseParser;
use super::{HttpClient, Worker};

/// Plain TCP and TLS streams behind one object-safe surface
trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// Backend that speaks HTTP/1.1 directly over its own sockets
pub struct RawClient {
    host: String,
    port: u16,
    tls_domain: Option<String>,
    request_bytes: Bytes,
    timeout: Duration,
    max_response_size: usize,
}

impl RawClient {
    /// The actual construction happens in `init`
    pub fn new() -> Self {
        Self {
            host: String::new(),
            port: 0,
            tls_domain: None,
            request_bytes: Bytes::new(),
            timeout: Duration::ZERO,
            max_response_size: 0,
        }
    }

    async fn connect(&self) -> Result<Box<dyn AsyncStream>> {
        let stream = tokio::time::timeout(
            self.timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| ClientError::ConnectTimeout(self.timeout))??;
        stream.set_nodelay(true)?;

        match &self.tls_domain {
            None => Ok(Box::new(stream)),
            Some(domain) => {
                let connector =
                    tokio_native_tls::TlsConnector::from(native_tls::TlsConnector::new()?);
                let tls = tokio::time::timeout(self.timeout, connector.connect(domain, stream))
                    .await
                    .map_err(|_| ClientError::ConnectTimeout(self.timeout))??;
                Ok(Box::new(tls))
            }
        }
    }
}

impl Default for RawClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for RawClient {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn init(&mut self, config: &LoadConfig, request: &Request) -> Result<()> {
        self.host = request.host().to_string();
        self.port = request.port();
        self.tls_domain = request.is_tls().then(|| request.host().to_string());
        self.request_bytes = request.raw().clone();
        self.timeout = config.timeout;
        self.max_response_size = config.max_response_size;
        Ok(())
    }

    async fn create_worker(&self) -> Result<Box<dyn Worker>> {
        let stream = self.connect().await?;
        Ok(Box::new(RawWorker {
            stream,
            request_bytes: self.request_bytes.clone(),
            timeout: self.timeout,
            parser: ResponseParser::new(self.max_response_size),
        }))
    }
}

struct RawWorker {
    stream: Box<dyn AsyncStream>,
    request_bytes: Bytes,
    timeout: Duration,
    parser: ResponseParser,
}

impl RawWorker {
    /// One read against the absolute deadline, into `buf[offset..]`
    async fn read_at(&mut self, deadline: Instant, offset: usize) -> Result<usize> {
        let buf = self.parser.buf_mut();
        let n = tokio::time::timeout_at(deadline, self.stream.read(&mut buf[offset..]))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))??;
        if n == 0 {
            return Err(ClientError::UnexpectedEof);
        }
        Ok(n)
    }

    async fn cycle(&mut self, deadline: Instant, response: &mut Response) -> Result<()> {
        self.stream.write_all(&self.request_bytes).await?;

        self.parser.reset();
        let mut total = self.read_at(deadline, 0).await?;
        while !self.parser.find_header_end(total) {
            if total == self.parser.capacity() {
                return Err(ClientError::BufferFull(total));
            }
            total += self.read_at(deadline, total).await?;
        }
        self.parser.parse_headers()?;

        // Body bytes are not retained, so later reads may overwrite the
        // buffer from offset zero; `total` keeps counting.
        while !self.parser.is_body_complete(total) {
            total += self.read_at(deadline, 0).await?;
        }

        response.status_code = self.parser.status_code();
        response.size = total as u64;
        Ok(())
    }
}

#[async_trait]
impl Worker for RawWorker {
    async fn do_static_request(&mut self, response: &mut Response) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        match self.cycle(deadline, response).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = self.stream.shutdown().await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RequestConfig;
    use tokio::net::TcpListener;

    fn load_config(url: &str, timeout: Duration, max_response_size: usize) -> LoadConfig {
        LoadConfig {
            request: RequestConfig {
                method: Some("GET".into()),
                url: url.into(),
                headers: Vec::new(),
                body: Vec::new(),
            },
            duration: Some(Duration::from_secs(1)),
            connections: 1,
            timeout,
            max_response_size,
            verbose: false,
        }
    }

    async fn one_shot_server(response: &'static [u8]) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap_or(0);
                if n == 0 {
                    return;
                }
                socket.write_all(response).await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn raw_worker_completes_a_cycle() {
        let addr =
            one_shot_server(b"HTTP/1.1 200 OK\r\nContent-Length: 12\r\n\r\nHello World!").await;
        let config = load_config(
            &format!("http://{addr}/"),
            Duration::from_secs(1),
            4096,
        );
        let request = Request::build(&config.request).unwrap();

        let mut client = RawClient::new();
        client.init(&config, &request).unwrap();
        let mut worker = client.create_worker().await.unwrap();

        let mut response = Response::default();
        worker.do_static_request(&mut response).await.unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.size, 51);

        // the connection persists across cycles
        worker.do_static_request(&mut response).await.unwrap();
        assert_eq!(response.status_code, 200);
    }

    #[tokio::test]
    async fn raw_worker_times_out_on_a_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            // keep the socket open but never reply
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let config = load_config(
            &format!("http://{addr}/"),
            Duration::from_millis(100),
            4096,
        );
        let request = Request::build(&config.request).unwrap();
        let mut client = RawClient::new();
        client.init(&config, &request).unwrap();
        let mut worker = client.create_worker().await.unwrap();

        let mut response = Response::default();
        let err = worker.do_static_request(&mut response).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn raw_worker_fails_when_headers_exceed_the_buffer() {
        let addr = one_shot_server(
            b"HTTP/1.1 200 OK\r\nX-Padding: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\
              aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\
              aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\r\n\r\n",
        )
        .await;
        let config = load_config(&format!("http://{addr}/"), Duration::from_secs(1), 64);
        let request = Request::build(&config.request).unwrap();
        let mut client = RawClient::new();
        client.init(&config, &request).unwrap();
        let mut worker = client.create_worker().await.unwrap();

        let mut response = Response::default();
        let err = worker.do_static_request(&mut response).await.unwrap_err();
        assert!(matches!(err, ClientError::BufferFull(64)));
    }

    #[tokio::test]
    async fn create_worker_surfaces_connect_failure() {
        // bind then drop to get a port that refuses connections
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = load_config(&format!("http://{addr}/"), Duration::from_secs(1), 4096);
        let request = Request::build(&config.request).unwrap();
        let mut client = RawClient::new();
        client.init(&config, &request).unwrap();
        assert!(client.create_worker().await.is_err());
    }
}
