//! Load generation: worker lifecycle, scheduling, and stats merge
//!
//! The model is closed-loop: N workers, one connection each, each
//! issuing the next request only after the previous cycle finished.
//! Workers share nothing mutable with each other; the only
//! cross-worker communication is the atomic stop flag (written once by
//! the coordinator) and the completion channel workers push their
//! stats through when they halt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::client::{HttpClient, Worker};
use crate::config::LoadConfig;
use crate::error::{ErrorKind, Result};
use crate::request::{Request, Response};
use crate::stats::Stats;

/// Orchestrates N workers for a bounded duration and merges results
pub struct LoadGenerator {
    config: LoadConfig,
    request: Arc<Request>,
    stop: Arc<AtomicBool>,
    workers: Vec<Box<dyn Worker>>,
}

impl LoadGenerator {
    /// Build the request, initialize the client, and open all
    /// connections
    ///
    /// The request is serialized exactly once; `client.init` runs once
    /// before any worker creation; the N worker constructions run
    /// concurrently. On failure the first error is returned, after
    /// every outstanding construction has settled.
    pub async fn new(mut config: LoadConfig, mut client: Box<dyn HttpClient>) -> Result<Self> {
        config.apply_defaults();
        let request = Request::build(&config.request)?;

        if config.verbose {
            println!("Config: {config:#?}");
            println!("Sending the following request with {}:", client.name());
            println!("{}", String::from_utf8_lossy(request.raw()));
        }

        client.init(&config, &request)?;
        let client: Arc<dyn HttpClient> = Arc::from(client);

        let mut handles = Vec::with_capacity(config.connections);
        for _ in 0..config.connections {
            let client = Arc::clone(&client);
            handles.push(tokio::spawn(async move { client.create_worker().await }));
        }

        let mut workers = Vec::with_capacity(config.connections);
        let mut first_err = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(worker)) => workers.push(worker),
                Ok(Err(e)) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "worker construction task panicked");
                }
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }

        Ok(Self {
            config,
            request: Arc::new(request),
            stop: Arc::new(AtomicBool::new(false)),
            workers,
        })
    }

    /// The frozen request this run repeats
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Run until the duration elapses, every worker dies, or SIGINT
    ///
    /// Returns the merged stats and the measured wall-clock duration.
    /// The stop flag transitions false to true exactly once; workers
    /// observe it between cycles, so after the flag trips the drain is
    /// bounded by one read timeout.
    pub async fn start(mut self) -> (Stats, Duration) {
        let timeout = self.config.timeout;
        let duration = self.config.duration.unwrap_or_default();
        if duration.is_zero() {
            return (Stats::new(timeout), Duration::ZERO);
        }

        let connections = self.workers.len();
        let request_size = self.request.raw().len() as u64;
        let (done_tx, mut done_rx) = mpsc::channel(connections);

        let started = Instant::now();
        for worker in self.workers.drain(..) {
            tokio::spawn(run_worker(
                worker,
                request_size,
                timeout,
                Arc::clone(&self.stop),
                done_tx.clone(),
            ));
        }
        drop(done_tx);

        tracing::info!(connections, duration = ?duration, "load generation started");

        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);
        let interrupt = tokio::signal::ctrl_c();
        tokio::pin!(interrupt);

        let mut parts: Vec<Stats> = Vec::with_capacity(connections);
        let mut remaining = connections;
        while remaining > 0 {
            tokio::select! {
                Some(stats) = done_rx.recv() => {
                    parts.push(stats);
                    remaining -= 1;
                }
                _ = &mut sleep => {
                    tracing::debug!("duration elapsed");
                    break;
                }
                _ = &mut interrupt => {
                    tracing::info!("interrupt received, stopping");
                    break;
                }
            }
        }

        self.stop.store(true, Ordering::Relaxed);
        while remaining > 0 {
            match done_rx.recv().await {
                Some(stats) => {
                    parts.push(stats);
                    remaining -= 1;
                }
                None => break,
            }
        }

        let actual_running_time = started.elapsed();
        let mut merged = Stats::new(timeout);
        for part in &parts {
            merged.merge(part);
        }
        tracing::info!(
            elapsed = ?actual_running_time,
            requests = merged.requests_sent,
            responses = merged.responses_received,
            "load generation finished"
        );
        (merged, actual_running_time)
    }
}

/// The per-connection closed loop
///
/// record_request strictly precedes the send, which strictly precedes
/// record_response; timestamps bracket the socket work as tightly as
/// the structure allows. Any cycle error terminates the loop: the
/// worker's connection is dead.
async fn run_worker(
    mut worker: Box<dyn Worker>,
    request_size: u64,
    timeout: Duration,
    stop: Arc<AtomicBool>,
    done_tx: mpsc::Sender<Stats>,
) {
    let mut stats = Stats::new(timeout);
    let mut response = Response::default();
    while !stop.load(Ordering::Relaxed) {
        stats.record_request(request_size);
        let sent_at = Instant::now();
        if let Err(e) = worker.do_static_request(&mut response).await {
            tracing::warn!(error = %e, "request failed");
            match e.kind() {
                ErrorKind::Timeout => stats.timeout_errors += 1,
                ErrorKind::Connection => stats.connection_errors += 1,
            }
            break;
        }
        let latency_us = sent_at.elapsed().as_micros() as u64;
        stats.record_response(latency_us, &response);
    }
    let _ = done_tx.send(stats).await;
}
