//! Minimal Prometheus text-exposition endpoint for the one optional metric
//! this engine emits: `neonlight_alwayson_query_seconds{region,driver}`. No
//! web framework here on purpose — one read-only endpoint doesn't need axum,
//! so this stays on bare `tokio` TCP I/O with a hand-written response.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::OnceLock;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

struct HistogramData {
    bucket_counts: Vec<u64>,
    sum: f64,
    count: u64,
}

impl HistogramData {
    fn new() -> Self {
        HistogramData {
            bucket_counts: vec![0; BUCKETS.len()],
            sum: 0.0,
            count: 0,
        }
    }

    fn observe(&mut self, value: f64) {
        for (i, upper) in BUCKETS.iter().enumerate() {
            if value <= *upper {
                self.bucket_counts[i] += 1;
            }
        }
        self.sum += value;
        self.count += 1;
    }
}

#[derive(Default)]
struct Registry {
    series: Mutex<HashMap<(String, String), HistogramData>>,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::default)
}

/// Records one observation of `neonlight_alwayson_query_seconds` for the
/// given region/driver label pair.
pub fn observe_alwayson_query_seconds(region: &str, driver: &str, seconds: f64) {
    let mut series = registry().series.lock().unwrap_or_else(|e| e.into_inner());
    series
        .entry((region.to_string(), driver.to_string()))
        .or_insert_with(HistogramData::new)
        .observe(seconds);
}

fn render() -> String {
    let series = registry().series.lock().unwrap_or_else(|e| e.into_inner());

    let mut out = String::new();
    out.push_str("# HELP neonlight_alwayson_query_seconds Duration of alwaysOn scenario probe queries.\n");
    out.push_str("# TYPE neonlight_alwayson_query_seconds histogram\n");

    for ((region, driver), data) in series.iter() {
        let mut cumulative = 0u64;
        for (i, upper) in BUCKETS.iter().enumerate() {
            cumulative += data.bucket_counts[i];
            out.push_str(&format!(
                "neonlight_alwayson_query_seconds_bucket{{region=\"{region}\",driver=\"{driver}\",le=\"{upper}\"}} {cumulative}\n"
            ));
        }
        out.push_str(&format!(
            "neonlight_alwayson_query_seconds_bucket{{region=\"{region}\",driver=\"{driver}\",le=\"+Inf\"}} {}\n",
            data.count
        ));
        out.push_str(&format!(
            "neonlight_alwayson_query_seconds_sum{{region=\"{region}\",driver=\"{driver}\"}} {}\n",
            data.sum
        ));
        out.push_str(&format!(
            "neonlight_alwayson_query_seconds_count{{region=\"{region}\",driver=\"{driver}\"}} {}\n",
            data.count
        ));
    }

    out
}

/// Parses a Go-style bind address (`":2112"` meaning all interfaces, or
/// `"127.0.0.1:2112"`) into something `TcpListener` accepts.
fn normalize_bind(bind: &str) -> String {
    if let Some(port) = bind.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        bind.to_string()
    }
}

/// Spawns the `/metrics` listener in the background. Binding errors are
/// logged, not fatal — metrics are optional, the engine runs without them.
pub fn spawn_server(bind: String, cancel: CancellationToken) {
    tokio::spawn(async move {
        let addr = normalize_bind(&bind);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(err) => {
                tracing::warn!(error = %err, %addr, "failed to bind prometheus listener, metrics disabled");
                return;
            }
        };
        tracing::info!(%addr, "prometheus metrics endpoint listening");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            tokio::spawn(handle_connection(stream));
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to accept metrics connection");
                        }
                    }
                }
            }
        }
    });
}

async fn handle_connection(mut stream: tokio::net::TcpStream) {
    let mut buf = [0u8; 1024];
    let n = match stream.read(&mut buf).await {
        Ok(n) => n,
        Err(_) => return,
    };
    let request = String::from_utf8_lossy(&buf[..n]);
    let is_metrics = request.starts_with("GET /metrics ");

    let body = if is_metrics { render() } else { String::new() };
    let status = if is_metrics { "200 OK" } else { "404 Not Found" };
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );

    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_bind_fills_in_wildcard_host() {
        assert_eq!(normalize_bind(":2112"), "0.0.0.0:2112");
        assert_eq!(normalize_bind("127.0.0.1:2112"), "127.0.0.1:2112");
    }

    #[test]
    fn histogram_observe_tracks_count_and_sum() {
        let mut h = HistogramData::new();
        h.observe(0.2);
        h.observe(2.0);
        assert_eq!(h.count, 2);
        assert!((h.sum - 2.2).abs() < f64::EPSILON);
        assert_eq!(h.bucket_counts[2], 1); // 0.25 bucket catches 0.2
        assert_eq!(h.bucket_counts[5], 2); // 2.5 bucket catches both
    }

    #[test]
    fn render_includes_recorded_series() {
        observe_alwayson_query_seconds("test-region-metrics-render", "pgx-conn", 0.3);
        let text = render();
        assert!(text.contains("test-region-metrics-render"));
        assert!(text.contains("neonlight_alwayson_query_seconds_count"));
    }
}
