//! Streaming latency statistics with a dense microsecond histogram
//!
//! Each worker owns one [`Stats`] for the whole run; the coordinator
//! merges them after all workers have halted. The histogram is a dense
//! array indexed by microsecond latency with capacity `timeout_us + 1`,
//! so memory cost is linear in the configured timeout (8 MiB per worker
//! at a 1 s timeout). Latencies at or above the limit reached the
//! timeout window and are discarded entirely.

use std::cell::Cell;
use std::time::Duration;

use crate::request::Response;

/// Per-worker counters and latency histogram; mergeable
#[derive(Debug, Clone)]
pub struct Stats {
    /// Total requests sent
    pub requests_sent: u64,
    /// Total responses received
    pub responses_received: u64,
    /// Total bytes written to sockets
    pub bytes_sent: u64,
    /// Total bytes read from sockets
    pub bytes_received: u64,

    /// Responses with status code > 399
    pub status_errors: u64,
    /// Cycles terminated by a read deadline
    pub timeout_errors: u64,
    /// Cycles terminated by any other transport or parse failure
    pub connection_errors: u64,

    /// Smallest recorded latency in microseconds
    pub min_latency: u64,
    /// Largest recorded latency in microseconds
    pub max_latency: u64,

    /// latencies[k] counts responses with latency exactly k microseconds
    latencies: Vec<u64>,
    /// Cached mean; zero or negative means not yet computed
    mean: Cell<f64>,
    /// Histogram capacity and outlier cutoff, timeout_us + 1
    limit: u64,
}

impl Stats {
    /// Create empty stats sized to the run's timeout
    pub fn new(timeout: Duration) -> Self {
        let limit = timeout.as_micros() as u64 + 1;
        Self {
            requests_sent: 0,
            responses_received: 0,
            bytes_sent: 0,
            bytes_received: 0,
            status_errors: 0,
            timeout_errors: 0,
            connection_errors: 0,
            min_latency: limit - 1,
            max_latency: 0,
            latencies: vec![0; limit as usize],
            mean: Cell::new(0.0),
            limit,
        }
    }

    /// The histogram's outlier cutoff in microseconds
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// The dense histogram, one bin per microsecond
    pub fn latencies(&self) -> &[u64] {
        &self.latencies
    }

    /// Count one request about to be sent
    pub fn record_request(&mut self, request_size: u64) {
        self.requests_sent += 1;
        self.bytes_sent += request_size;
    }

    /// Count one completed response
    ///
    /// A latency at or above the limit is discarded: that cycle reached
    /// the timeout window and is not a successful sample.
    pub fn record_response(&mut self, latency_us: u64, response: &Response) {
        if latency_us >= self.limit {
            return;
        }

        self.responses_received += 1;
        self.bytes_received += response.size;

        if response.status_code > 399 {
            self.status_errors += 1;
        }

        self.latencies[latency_us as usize] += 1;
        if latency_us < self.min_latency {
            self.min_latency = latency_us;
        }
        if latency_us > self.max_latency {
            self.max_latency = latency_us;
        }
    }

    /// Fold another worker's stats into this one
    ///
    /// Counters add, min/max combine, histograms add bin-wise over the
    /// other's occupied range. Both sides must have been sized to the
    /// same timeout.
    pub fn merge(&mut self, other: &Stats) {
        debug_assert_eq!(self.limit, other.limit);

        self.requests_sent += other.requests_sent;
        self.responses_received += other.responses_received;
        self.bytes_sent += other.bytes_sent;
        self.bytes_received += other.bytes_received;

        self.status_errors += other.status_errors;
        self.timeout_errors += other.timeout_errors;
        self.connection_errors += other.connection_errors;

        self.min_latency = self.min_latency.min(other.min_latency);
        self.max_latency = self.max_latency.max(other.max_latency);

        for i in other.min_latency..=other.max_latency {
            self.latencies[i as usize] += other.latencies[i as usize];
        }
    }

    /// Mean latency in microseconds, cached after the first computation
    pub fn latency_mean(&self) -> f64 {
        if self.requests_sent == 0 || self.responses_received == 0 {
            return 0.0;
        }
        let cached = self.mean.get();
        if cached > 0.0 {
            return cached;
        }
        let sum: u64 = (self.min_latency..=self.max_latency)
            .map(|i| i * self.latencies[i as usize])
            .sum();
        let mean = sum as f64 / self.responses_received as f64;
        self.mean.set(mean);
        mean
    }

    /// Sample standard deviation in microseconds; 0 below two samples
    pub fn latency_stdev(&self) -> f64 {
        if self.responses_received < 2 {
            return 0.0;
        }
        let mean = self.latency_mean();
        let mut sum = 0.0;
        for i in self.min_latency..=self.max_latency {
            let count = self.latencies[i as usize];
            if count > 0 {
                let dif = i as f64 - mean;
                sum += dif * dif * count as f64;
            }
        }
        (sum / (self.responses_received - 1) as f64).sqrt()
    }

    /// Percentage of samples within n standard deviations of the mean
    pub fn latency_within_stdev(&self, n: u32) -> f64 {
        if self.responses_received == 0 {
            return 0.0;
        }
        let mean = self.latency_mean();
        let stdev = self.latency_stdev();
        let upper = (mean + f64::from(n) * stdev).ceil() as i64;
        let lower = (mean - f64::from(n) * stdev).floor() as i64;

        let mut sum = 0u64;
        for i in self.min_latency..=self.max_latency {
            if (i as i64) >= lower && (i as i64) <= upper {
                sum += self.latencies[i as usize];
            }
        }
        100.0 * sum as f64 / self.responses_received as f64
    }

    /// Latency percentile in microseconds
    ///
    /// The rank is computed against `requests_sent`, not
    /// `responses_received`: requests still in flight at the end of the
    /// run penalize tail latency instead of being silently excluded.
    /// `percent == 100` returns the max; out-of-range input returns 0.
    pub fn latency_percentile(&self, percent: f64) -> u64 {
        if !(0.0..=100.0).contains(&percent) {
            return 0;
        }
        if percent == 100.0 {
            return self.max_latency;
        }
        let rank = (percent / 100.0 * self.requests_sent as f64 + 0.5).round() as u64;
        let mut total = 0u64;
        for i in self.min_latency..=self.max_latency {
            total += self.latencies[i as usize];
            if total >= rank {
                return i;
            }
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status_code: u16, size: u64) -> Response {
        Response { status_code, size }
    }

    fn stats_with(latencies_us: &[u64]) -> Stats {
        let mut stats = Stats::new(Duration::from_millis(10));
        for &latency in latencies_us {
            stats.record_request(100);
            stats.record_response(latency, &response(200, 512));
        }
        stats
    }

    #[test]
    fn record_updates_counters_and_bounds() {
        let stats = stats_with(&[120, 80, 200]);
        assert_eq!(stats.requests_sent, 3);
        assert_eq!(stats.responses_received, 3);
        assert_eq!(stats.bytes_sent, 300);
        assert_eq!(stats.bytes_received, 1536);
        assert_eq!(stats.min_latency, 80);
        assert_eq!(stats.max_latency, 200);
    }

    #[test]
    fn histogram_sum_equals_responses() {
        let stats = stats_with(&[5, 5, 9, 42, 42, 42]);
        let sum: u64 = stats.latencies().iter().sum();
        assert_eq!(sum, stats.responses_received);
        assert_eq!(stats.latencies()[42], 3);
    }

    #[test]
    fn latency_at_or_above_limit_is_discarded() {
        let mut stats = Stats::new(Duration::from_millis(1));
        stats.record_request(10);
        stats.record_response(1001, &response(200, 64));
        stats.record_request(10);
        stats.record_response(5000, &response(200, 64));

        assert_eq!(stats.requests_sent, 2);
        assert_eq!(stats.responses_received, 0);
        assert_eq!(stats.bytes_received, 0);
        assert_eq!(stats.latencies().iter().sum::<u64>(), 0);

        // one below the limit is the largest acceptable sample
        stats.record_request(10);
        stats.record_response(1000, &response(200, 64));
        assert_eq!(stats.responses_received, 1);
        assert_eq!(stats.max_latency, 1000);
    }

    #[test]
    fn status_above_399_counts_as_status_error() {
        let mut stats = Stats::new(Duration::from_millis(10));
        stats.record_request(10);
        stats.record_response(100, &response(503, 64));
        stats.record_request(10);
        stats.record_response(100, &response(399, 64));

        assert_eq!(stats.status_errors, 1);
        assert_eq!(stats.responses_received, 2);
    }

    #[test]
    fn mean_and_stdev() {
        let stats = stats_with(&[100, 200, 300]);
        assert!((stats.latency_mean() - 200.0).abs() < 1e-9);
        // sample stdev of {100, 200, 300} is 100
        assert!((stats.latency_stdev() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn mean_is_cached() {
        let stats = stats_with(&[100, 200, 300]);
        let first = stats.latency_mean();
        let second = stats.latency_mean();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_stats_yield_zero_not_nan() {
        let stats = Stats::new(Duration::from_millis(10));
        assert_eq!(stats.latency_mean(), 0.0);
        assert_eq!(stats.latency_stdev(), 0.0);
        assert_eq!(stats.latency_within_stdev(1), 0.0);
    }

    #[test]
    fn stdev_requires_two_samples() {
        let stats = stats_with(&[100]);
        assert_eq!(stats.latency_stdev(), 0.0);
    }

    #[test]
    fn percentile_walks_the_histogram() {
        let stats = stats_with(&[10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
        // rank(50%) = round(0.5 * 10 + 0.5) = 6 -> sixth sample
        assert_eq!(stats.latency_percentile(50.0), 60);
        // rank(75%) = round(0.75 * 10 + 0.5) = 8 -> eighth sample
        assert_eq!(stats.latency_percentile(75.0), 80);
        assert_eq!(stats.latency_percentile(100.0), 100);
    }

    #[test]
    fn percentile_edge_cases() {
        let stats = stats_with(&[10, 20, 30]);
        assert_eq!(stats.latency_percentile(-1.0), 0);
        assert_eq!(stats.latency_percentile(100.1), 0);
        assert_eq!(stats.latency_percentile(100.0), stats.max_latency);
        assert!(stats.latency_percentile(0.0) <= stats.min_latency);
    }

    #[test]
    fn percentile_rank_uses_requests_sent() {
        // 3 responses but 6 requests: the in-flight half drags the
        // upper percentiles to the end of the histogram walk
        let mut stats = stats_with(&[10, 20, 30]);
        stats.record_request(100);
        stats.record_request(100);
        stats.record_request(100);

        // rank(90%) = round(0.9 * 6 + 0.5) = 6 > total count, walk
        // falls off the end and reports 0
        assert_eq!(stats.latency_percentile(90.0), 0);
        // rank(50%) = round(0.5 * 6 + 0.5) = 4 > 3 as well
        assert_eq!(stats.latency_percentile(50.0), 0);
        // rank(25%) = round(0.25 * 6 + 0.5) = 2 -> second sample
        assert_eq!(stats.latency_percentile(25.0), 20);
    }

    #[test]
    fn within_stdev_is_monotonic_in_n() {
        let stats = stats_with(&[10, 10, 20, 30, 30, 30, 90, 500, 900]);
        let one = stats.latency_within_stdev(1);
        let two = stats.latency_within_stdev(2);
        let three = stats.latency_within_stdev(3);
        assert!(one <= two);
        assert!(two <= three);
        assert!(three <= 100.0);
    }

    #[test]
    fn merge_adds_counters_and_bins() {
        let mut a = stats_with(&[10, 20]);
        a.timeout_errors = 1;
        let mut b = stats_with(&[20, 300]);
        b.connection_errors = 2;

        a.merge(&b);
        assert_eq!(a.requests_sent, 4);
        assert_eq!(a.responses_received, 4);
        assert_eq!(a.timeout_errors, 1);
        assert_eq!(a.connection_errors, 2);
        assert_eq!(a.min_latency, 10);
        assert_eq!(a.max_latency, 300);
        assert_eq!(a.latencies()[20], 2);
        assert_eq!(a.latencies().iter().sum::<u64>(), 4);
    }

    #[test]
    fn merge_with_empty_side_is_identity_on_histogram() {
        let mut merged = Stats::new(Duration::from_millis(10));
        let part = stats_with(&[15, 25]);
        merged.merge(&part);
        merged.merge(&Stats::new(Duration::from_millis(10)));

        assert_eq!(merged.responses_received, 2);
        assert_eq!(merged.min_latency, 15);
        assert_eq!(merged.max_latency, 25);
        assert_eq!(merged.latencies().iter().sum::<u64>(), 2);
    }

    #[test]
    fn merge_is_associative() {
        let a = stats_with(&[10, 20]);
        let b = stats_with(&[30]);
        let c = stats_with(&[40, 50, 60]);

        let mut left = Stats::new(Duration::from_millis(10));
        left.merge(&a);
        left.merge(&b);
        let mut left_total = Stats::new(Duration::from_millis(10));
        left_total.merge(&left);
        left_total.merge(&c);

        let mut right = Stats::new(Duration::from_millis(10));
        right.merge(&b);
        right.merge(&c);
        let mut right_total = Stats::new(Duration::from_millis(10));
        right_total.merge(&a);
        right_total.merge(&right);

        assert_eq!(left_total.requests_sent, right_total.requests_sent);
        assert_eq!(
            left_total.responses_received,
            right_total.responses_received
        );
        assert_eq!(left_total.min_latency, right_total.min_latency);
        assert_eq!(left_total.max_latency, right_total.max_latency);
        assert_eq!(left_total.latencies(), right_total.latencies());
    }

    #[test]
    fn occupied_bins_stay_within_bounds() {
        let stats = stats_with(&[10, 500, 9999]);
        for (i, &count) in stats.latencies().iter().enumerate() {
            if count > 0 {
                assert!(stats.min_latency as usize <= i);
                assert!(i <= stats.max_latency as usize);
            }
        }
    }
}
