//! volley - high-throughput closed-loop HTTP/1.1 load generation
//!
//! The engine saturates a target endpoint with a repeating,
//! pre-serialized request and produces statistics about response
//! latency, throughput, and error taxonomy.
//!
//! # Architecture
//!
//! - **Client**: a backend translating the frozen configuration into
//!   workers, each bound to its own transport (`raw`, `pooled`, `full`)
//! - **Worker**: one connection, one request/response cycle per call
//! - **LoadGenerator**: runs N workers for a bounded duration and
//!   merges their stats
//! - **Stats**: dense microsecond latency histogram plus counters
//!
//! The loop is closed: a worker issues the next request only after the
//! previous response completed or failed on the same connection.
//!
//! # Example
//!
//! ```rust,no_run
//! use volley::{client, LoadConfig, LoadGenerator, RequestConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = LoadConfig {
//!         request: RequestConfig {
//!             url: "http://127.0.0.1:8080/".into(),
//!             ..RequestConfig::default()
//!         },
//!         connections: 4,
//!         ..LoadConfig::default()
//!     };
//!     let backend = client::by_name("raw").expect("known backend");
//!     let generator = LoadGenerator::new(config, backend).await?;
//!     let (stats, elapsed) = generator.start().await;
//!     println!("{} responses in {:?}", stats.responses_received, elapsed);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod generator;
pub mod report;
pub mod request;
pub mod stats;

pub use client::{HttpClient, Worker};
pub use config::{LoadConfig, RequestConfig};
pub use error::{ClientError, ErrorKind};
pub use generator::LoadGenerator;
pub use request::{Request, Response};
pub use stats::Stats;
