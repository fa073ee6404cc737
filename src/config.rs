//! Load test configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default HTTP method when none is given
pub const DEFAULT_METHOD: &str = "GET";
/// Default run duration for a missing duration
pub const DEFAULT_DURATION: Duration = Duration::from_secs(1);
/// Default concurrency level
pub const DEFAULT_CONNECTIONS: usize = 1;
/// Default per-cycle read timeout; also bounds the latency histogram
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Default receive buffer capacity in bytes
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 4096;

/// Configuration of the request sent on every cycle
///
/// The request is frozen at startup; workers never reserialize it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestConfig {
    /// HTTP method; `None` or empty defaults to GET
    pub method: Option<String>,
    /// Target URL, e.g. `http://127.0.0.1:8080/abc?de=fg`
    pub url: String,
    /// Headers in insertion order
    pub headers: Vec<(String, String)>,
    /// Request body; empty means no body
    pub body: Vec<u8>,
}

/// Configuration for a load generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// The request to repeat
    pub request: RequestConfig,
    /// Wall-clock bound on the run. `None` defaults to 1 s; an explicit
    /// zero makes the run return immediately with empty stats.
    pub duration: Option<Duration>,
    /// Number of parallel workers, one connection each; zero promotes to 1
    pub connections: usize,
    /// Per-cycle read timeout; zero promotes to 60 s
    pub timeout: Duration,
    /// Receive buffer capacity; must exceed the largest expected header
    /// section; zero promotes to 4096
    pub max_response_size: usize,
    /// Emit the serialized request and effective config before starting
    pub verbose: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            request: RequestConfig::default(),
            duration: Some(DEFAULT_DURATION),
            connections: DEFAULT_CONNECTIONS,
            timeout: DEFAULT_TIMEOUT,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            verbose: false,
        }
    }
}

impl LoadConfig {
    /// Promote missing or zero fields to their defaults
    ///
    /// Mirrors the input contract: a zero connection count, timeout or
    /// buffer size is treated as unset. An explicit zero duration is
    /// kept, which short-circuits the run.
    pub fn apply_defaults(&mut self) {
        if self.request.method.as_deref().map_or(true, str::is_empty) {
            self.request.method = Some(DEFAULT_METHOD.to_string());
        }
        if self.duration.is_none() {
            self.duration = Some(DEFAULT_DURATION);
        }
        if self.connections == 0 {
            self.connections = DEFAULT_CONNECTIONS;
        }
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }
        if self.max_response_size == 0 {
            self.max_response_size = DEFAULT_MAX_RESPONSE_SIZE;
        }
    }
}
