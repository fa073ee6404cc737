//! Human-readable summary of a finished run

use std::time::Duration;

use crate::stats::Stats;

const COLUMN_WIDTH: usize = 14;

/// Print the tabular report for a merged [`Stats`]
pub fn print_summary(stats: &Stats, duration: Duration) {
    let seconds = duration.as_secs_f64();

    print_table(
        &["", "Connection", "Timeout", "Status"],
        &[vec![
            "Errors".to_string(),
            stats.connection_errors.to_string(),
            stats.timeout_errors.to_string(),
            stats.status_errors.to_string(),
        ]],
    );

    let min = if stats.responses_received > 0 {
        stats.min_latency
    } else {
        0
    };
    print_table(
        &["", "Avg", "Min", "Max", "Stdev", "+/- Stdev"],
        &[vec![
            "Latency".to_string(),
            format_ms(stats.latency_mean()),
            format_ms(min as f64),
            format_ms(stats.max_latency as f64),
            format_ms(stats.latency_stdev()),
            format!("{:.3}%", stats.latency_within_stdev(1)),
        ]],
    );

    print_table(
        &["", "50%", "75%", "90%", "99%", "99.9%"],
        &[vec![
            "Latency".to_string(),
            format_ms(stats.latency_percentile(50.0) as f64),
            format_ms(stats.latency_percentile(75.0) as f64),
            format_ms(stats.latency_percentile(90.0) as f64),
            format_ms(stats.latency_percentile(99.0) as f64),
            format_ms(stats.latency_percentile(99.9) as f64),
        ]],
    );

    print_table(
        &["", "Count", "Count/s", "Size", "Throughput"],
        &[
            vec![
                "Requests".to_string(),
                stats.requests_sent.to_string(),
                format!("{:.2}", rate(stats.requests_sent, seconds)),
                format_bytes(stats.bytes_sent),
                format!("{}/s", format_bytes(rate(stats.bytes_sent, seconds) as u64)),
            ],
            vec![
                "Responses".to_string(),
                stats.responses_received.to_string(),
                format!("{:.2}", rate(stats.responses_received, seconds)),
                format_bytes(stats.bytes_received),
                format!(
                    "{}/s",
                    format_bytes(rate(stats.bytes_received, seconds) as u64)
                ),
            ],
        ],
    );

    println!(
        "\n{} responses received in {}, {} read",
        stats.responses_received,
        humantime::format_duration(Duration::from_millis(duration.as_millis() as u64)),
        format_bytes(stats.bytes_received)
    );
}

fn rate(count: u64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        count as f64 / seconds
    } else {
        0.0
    }
}

/// Microseconds rendered as milliseconds with three decimals
fn format_ms(us: f64) -> String {
    format!("{:.3}ms", us / 1000.0)
}

/// IEC byte formatting: 1024-based units with one decimal
fn format_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    if n < 1024 {
        return format!("{n} B");
    }
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    println!("{}", "-".repeat(72));
    let mut line = String::new();
    for header in headers {
        line.push_str(&format!("{header:<COLUMN_WIDTH$}"));
    }
    println!("{}", line.trim_end());
    for row in rows {
        let mut line = String::new();
        for cell in row {
            line.push_str(&format!("{cell:<COLUMN_WIDTH$}"));
        }
        println!("{}", line.trim_end());
    }
}
