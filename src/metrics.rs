//! Server metrics and the HTTP health endpoint
//!
//! - /health: JSON status for load balancers and the ops dashboard
//! - /metrics: Prometheus text format

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::net::protocol::now_ms;

/// Metrics registry for the game server
#[derive(Debug)]
pub struct Metrics {
    /// Rooms currently alive (waiting + playing + finished-awaiting-GC)
    pub rooms_active: AtomicU64,
    /// Sockets currently bound to a room slot
    pub players_connected: AtomicU64,
    /// Open WebSocket connections
    pub connections_active: AtomicU64,

    // Counters
    pub rooms_created_total: AtomicU64,
    pub messages_received: AtomicU64,
    pub messages_sent: AtomicU64,
    pub inputs_rejected_total: AtomicU64,
    pub snapshots_dropped_total: AtomicU64,
    pub ticks_total: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            rooms_active: AtomicU64::new(0),
            players_connected: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            rooms_created_total: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            inputs_rejected_total: AtomicU64::new(0),
            snapshots_dropped_total: AtomicU64::new(0),
            ticks_total: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Body for `GET /health`
    pub fn health_json(&self) -> String {
        serde_json::json!({
            "status": "ok",
            "timestamp": now_ms(),
            "rooms": self.rooms_active.load(Ordering::Relaxed),
            "players": self.players_connected.load(Ordering::Relaxed),
        })
        .to_string()
    }

    /// Body for `GET /metrics`
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();
        let mut gauge = |name: &str, help: &str, value: u64| {
            out.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} gauge\n{name} {value}\n"
            ));
        };
        gauge(
            "tank_arena_rooms_active",
            "Rooms currently alive",
            self.rooms_active.load(Ordering::Relaxed),
        );
        gauge(
            "tank_arena_players_connected",
            "Sockets bound to a room slot",
            self.players_connected.load(Ordering::Relaxed),
        );
        gauge(
            "tank_arena_connections_active",
            "Open WebSocket connections",
            self.connections_active.load(Ordering::Relaxed),
        );
        gauge(
            "tank_arena_uptime_seconds",
            "Server uptime",
            self.uptime_seconds(),
        );

        let mut counter = |name: &str, help: &str, value: u64| {
            out.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n"
            ));
        };
        counter(
            "tank_arena_rooms_created_total",
            "Rooms created since start",
            self.rooms_created_total.load(Ordering::Relaxed),
        );
        counter(
            "tank_arena_messages_received_total",
            "Inbound messages",
            self.messages_received.load(Ordering::Relaxed),
        );
        counter(
            "tank_arena_messages_sent_total",
            "Outbound messages",
            self.messages_sent.load(Ordering::Relaxed),
        );
        counter(
            "tank_arena_inputs_rejected_total",
            "Inputs rejected by validation or rate limiting",
            self.inputs_rejected_total.load(Ordering::Relaxed),
        );
        counter(
            "tank_arena_snapshots_dropped_total",
            "Snapshots dropped for slow clients",
            self.snapshots_dropped_total.load(Ordering::Relaxed),
        );
        counter(
            "tank_arena_ticks_total",
            "Simulation ticks across all rooms",
            self.ticks_total.load(Ordering::Relaxed),
        );
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the health/metrics HTTP server
pub async fn start_health_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Health endpoint listening on http://{}/health", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);

                    let response = if request.starts_with("GET /health") {
                        let body = metrics.health_json();
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        )
                    } else if request.starts_with("GET /metrics") {
                        let body = metrics.to_prometheus();
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        )
                    } else {
                        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                            .to_string()
                    };

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write health response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from health socket {}: {}", peer, e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.rooms_active.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.rooms_created_total.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_health_json_shape() {
        let metrics = Metrics::new();
        metrics.rooms_active.store(3, Ordering::Relaxed);
        metrics.players_connected.store(5, Ordering::Relaxed);

        let value: serde_json::Value = serde_json::from_str(&metrics.health_json()).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["rooms"], 3);
        assert_eq!(value["players"], 5);
        assert!(value["timestamp"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.rooms_created_total.store(7, Ordering::Relaxed);

        let text = metrics.to_prometheus();
        assert!(text.contains("tank_arena_rooms_created_total 7"));
        assert!(text.contains("# TYPE tank_arena_rooms_active gauge"));
        assert!(text.contains("# TYPE tank_arena_ticks_total counter"));
    }

    #[tokio::test]
    async fn test_health_server_responds() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let metrics = Arc::new(Metrics::new());
        // Bind an ephemeral port by probing then racing is flaky; use a
        // fixed high port unlikely to clash in CI.
        let port = 18923;
        let server = tokio::spawn(start_health_server(metrics, port));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await.unwrap();
        buf.extend_from_slice(&chunk[..n]);
        let response = String::from_utf8_lossy(&buf);

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("\"status\":\"ok\""));
        server.abort();
    }
}
