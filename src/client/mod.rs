//! Client backends and the capability traits the core consumes
//!
//! A backend translates the frozen configuration into a family of
//! workers, each bound to its own transport. Three backends ship:
//!
//! - `raw` — hand-rolled HTTP/1.1 over TCP/TLS with the zero-copy
//!   response parser; the default and the fast path.
//! - `pooled` — the hyper HTTP/1.1 client with its connection pool.
//! - `full` — the full-featured reqwest client.

use async_trait::async_trait;

use crate::config::LoadConfig;
use crate::error::Result;
use crate::request::{Request, Response};

mod full;
pub mod parser;
mod pooled;
mod raw;

pub use full::FullClient;
pub use pooled::PooledClient;
pub use raw::RawClient;

/// A client backend: shared read-only state plus a worker factory
///
/// `init` is called exactly once, before any `create_worker` call.
/// `create_worker` is called exactly `config.connections` times; the
/// calls may run concurrently and implementations must be safe for
/// that.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Stable backend identifier
    fn name(&self) -> &'static str;

    /// Store the shared state for future worker creation
    fn init(&mut self, config: &LoadConfig, request: &Request) -> Result<()>;

    /// Produce one worker bound to a freshly opened transport
    async fn create_worker(&self) -> Result<Box<dyn Worker>>;
}

/// One connection performing one request/response cycle per call
///
/// On any error the worker closes its connection and surfaces the
/// error; it is then dead and must not be called again.
#[async_trait]
pub trait Worker: Send {
    /// Send the frozen request and fill `response` from the reply
    async fn do_static_request(&mut self, response: &mut Response) -> Result<()>;
}

/// Backend names accepted by [`by_name`]
pub const CLIENT_NAMES: &[&str] = &["raw", "pooled", "full"];

/// Look up a backend by its stable name
pub fn by_name(name: &str) -> Option<Box<dyn HttpClient>> {
    match name {
        "raw" => Some(Box::new(RawClient::new())),
        "pooled" => Some(Box::new(PooledClient::new())),
        "full" => Some(Box::new(FullClient::new())),
        _ => None,
    }
}
