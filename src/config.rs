use std::net::IpAddr;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the WebSocket listener to
    pub bind_address: IpAddr,
    /// WebSocket port
    pub port: u16,
    /// Port for the HTTP health/metrics endpoint
    pub health_port: u16,
    /// Allowed Origin header for the WebSocket handshake (None = any)
    pub allowed_origin: Option<String>,
    /// Maximum number of concurrent rooms
    pub max_rooms: usize,
    /// Grace window for a disconnected slot, milliseconds
    pub reconnect_timeout_ms: u64,
    /// Snapshot broadcast interval, milliseconds
    pub broadcast_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".parse().unwrap(),
            port: 3000,
            health_port: 8080,
            allowed_origin: None,
            max_rooms: 100,
            reconnect_timeout_ms: 30_000,
            broadcast_interval_ms: 16,
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("BIND_ADDRESS") {
            if let Ok(parsed) = addr.parse() {
                config.bind_address = parsed;
            }
        }

        if let Ok(port) = std::env::var("PORT") {
            if let Ok(parsed) = port.parse() {
                config.port = parsed;
            }
        }

        if let Ok(port) = std::env::var("HEALTH_PORT") {
            if let Ok(parsed) = port.parse() {
                config.health_port = parsed;
            }
        }

        if let Ok(origin) = std::env::var("ALLOWED_ORIGIN") {
            if !origin.is_empty() {
                config.allowed_origin = Some(origin);
            }
        }

        if let Ok(max_rooms) = std::env::var("MAX_ROOMS") {
            if let Ok(parsed) = max_rooms.parse() {
                config.max_rooms = parsed;
            }
        }

        if let Ok(timeout) = std::env::var("RECONNECT_TIMEOUT_MS") {
            if let Ok(parsed) = timeout.parse() {
                config.reconnect_timeout_ms = parsed;
            }
        }

        if let Ok(interval) = std::env::var("BROADCAST_INTERVAL_MS") {
            if let Ok(parsed) = interval.parse() {
                config.broadcast_interval_ms = parsed;
            }
        }

        config
    }
}
