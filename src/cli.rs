//! Command-line interface

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use crate::client;
use crate::config::{LoadConfig, RequestConfig};
use crate::generator::LoadGenerator;
use crate::report;

/// High-throughput closed-loop HTTP/1.1 load generator
#[derive(Parser, Debug)]
#[command(name = "volley", version, about, long_about = None)]
pub struct Cli {
    /// Target URL, e.g. http://127.0.0.1:8080/abc?de=fg
    pub url: String,

    /// Duration of the test
    #[arg(short, long, value_parser = humantime::parse_duration, default_value = "10s")]
    pub duration: Duration,

    /// Number of connections (one worker each)
    #[arg(short, long, default_value_t = 10)]
    pub connections: usize,

    /// Number of OS threads for the runtime; defaults to the number of cores
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// HTTP header to add to the request, "Name: Value"; repeatable
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,

    /// Per-request read timeout
    #[arg(short = 'T', long, value_parser = humantime::parse_duration, default_value = "1s")]
    pub timeout: Duration,

    /// Receive buffer size; must hold the largest expected header section
    #[arg(short = 'M', long, default_value_t = 4096)]
    pub max_response_size: usize,

    /// The HTTP method to use
    #[arg(short, long, default_value = "GET")]
    pub method: String,

    /// Path to a file whose contents become the request body
    #[arg(short, long)]
    pub body: Option<PathBuf>,

    /// Client backend to use
    #[arg(short = 'C', long, default_value = "raw",
          value_parser = clap::builder::PossibleValuesParser::new(client::CLIENT_NAMES.iter().copied()))]
    pub client: String,

    /// Print the effective config and serialized request before starting
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Run the load test and print the report
    pub async fn run(self) -> Result<()> {
        let backend = client::by_name(&self.client).ok_or_else(|| {
            anyhow!(
                "no client named `{}` (expected one of {:?})",
                self.client,
                client::CLIENT_NAMES
            )
        })?;

        let headers = parse_headers(&self.headers)?;
        let body = match &self.body {
            Some(path) => std::fs::read(path)
                .with_context(|| format!("failed to read body file {}", path.display()))?,
            None => Vec::new(),
        };

        // GET cannot carry a body; promote to POST
        let mut method = self.method.clone();
        if !body.is_empty() && method == "GET" {
            method = "POST".to_string();
        }

        let config = LoadConfig {
            request: RequestConfig {
                method: Some(method),
                url: self.url.clone(),
                headers,
                body,
            },
            duration: Some(self.duration),
            connections: self.connections,
            timeout: self.timeout,
            max_response_size: self.max_response_size,
            verbose: self.verbose,
        };

        let generator = LoadGenerator::new(config, backend)
            .await
            .context("failed to set up the load generator")?;

        println!(
            "Running {} test @ {}",
            humantime::format_duration(self.duration),
            self.url
        );
        println!("  {} connections", self.connections);

        let (stats, actual_running_time) = generator.start().await;
        report::print_summary(&stats, actual_running_time);
        Ok(())
    }
}

/// Parse repeated "Name: Value" header flags, preserving order
fn parse_headers(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|h| {
            let (name, value) = h
                .split_once(':')
                .ok_or_else(|| anyhow!("header must be in `Name: Value` form, got `{h}`"))?;
            Ok((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_parse_and_trim() {
        let parsed = parse_headers(&[
            "Accept: text/plain".to_string(),
            "X-Token:abc".to_string(),
        ])
        .unwrap();
        assert_eq!(parsed[0], ("Accept".to_string(), "text/plain".to_string()));
        assert_eq!(parsed[1], ("X-Token".to_string(), "abc".to_string()));
    }

    #[test]
    fn header_without_colon_is_rejected() {
        assert!(parse_headers(&["nonsense".to_string()]).is_err());
    }

    #[test]
    fn cli_parses_every_flag() {
        let cli = Cli::parse_from([
            "volley",
            "-d",
            "2s",
            "-c",
            "4",
            "-T",
            "500ms",
            "-M",
            "8192",
            "-m",
            "PUT",
            "-H",
            "Accept: */*",
            "-C",
            "raw",
            "-v",
            "http://127.0.0.1:8080/",
        ]);
        assert_eq!(cli.duration, Duration::from_secs(2));
        assert_eq!(cli.connections, 4);
        assert_eq!(cli.timeout, Duration::from_millis(500));
        assert_eq!(cli.max_response_size, 8192);
        assert_eq!(cli.method, "PUT");
        assert_eq!(cli.headers, vec!["Accept: */*".to_string()]);
        assert_eq!(cli.client, "raw");
        assert!(cli.verbose);
        assert_eq!(cli.url, "http://127.0.0.1:8080/");
    }

    #[test]
    fn cli_defaults_match_the_documented_surface() {
        let cli = Cli::parse_from(["volley", "http://localhost/"]);
        assert_eq!(cli.duration, Duration::from_secs(10));
        assert_eq!(cli.connections, 10);
        assert_eq!(cli.timeout, Duration::from_secs(1));
        assert_eq!(cli.max_response_size, 4096);
        assert_eq!(cli.method, "GET");
        assert_eq!(cli.client, "raw");
        assert!(!cli.verbose);
    }

    #[test]
    fn cli_rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["volley", "-C", "nope", "http://localhost/"]).is_err());
    }
}
