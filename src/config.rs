//! Server configuration loaded from environment variables.
use std::time::Duration;

/// Runtime configuration for a [`crate::Server`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind each worker's listen socket to (default `0.0.0.0`).
    pub host: String,
    /// Port to bind (default `8080`).
    pub port: u16,
    /// Number of accept/serve workers (default: one per logical core).
    pub workers: usize,
    /// Idle read timeout per connection.
    pub read_timeout: Duration,
    /// Keep-alive timeout between requests on the same connection.
    pub keepalive_timeout: Duration,
    /// Maximum `Content-Length` body accepted before a 413 (spec: 1 MiB).
    pub max_body_bytes: usize,
    /// Maximum URI length accepted before a 414-equivalent parse failure (spec: 4096).
    pub max_uri_bytes: usize,
    /// Maximum header-section size in bytes (spec: 8192).
    pub max_header_bytes: usize,
    /// Maximum number of header lines (spec: 100).
    pub max_headers: usize,
    /// Maximum WebSocket frame payload, configurable per spec's open question (default 16 MiB).
    pub max_frame_bytes: u64,
    /// Value sent in the `Server:` response header.
    pub server_ident: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: num_cpus::get(),
            read_timeout: Duration::from_secs(30),
            keepalive_timeout: Duration::from_secs(75),
            max_body_bytes: 1024 * 1024,
            max_uri_bytes: 4096,
            max_header_bytes: 8192,
            max_headers: 100,
            max_frame_bytes: 16 * 1024 * 1024,
            server_ident: "chopin".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// [`ServerConfig::default`] for anything unset or unparsable.
    /// Loads a `.env` file first, if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Self {
            host: std::env::var("CHOPIN_HOST").unwrap_or(defaults.host),
            port: env_parsed("CHOPIN_PORT", defaults.port),
            workers: env_parsed("CHOPIN_WORKERS", defaults.workers),
            read_timeout: Duration::from_secs(env_parsed(
                "CHOPIN_READ_TIMEOUT_SECS",
                defaults.read_timeout.as_secs(),
            )),
            keepalive_timeout: Duration::from_secs(env_parsed(
                "CHOPIN_KEEPALIVE_TIMEOUT_SECS",
                defaults.keepalive_timeout.as_secs(),
            )),
            max_body_bytes: env_parsed("CHOPIN_MAX_BODY_BYTES", defaults.max_body_bytes),
            max_uri_bytes: defaults.max_uri_bytes,
            max_header_bytes: defaults.max_header_bytes,
            max_headers: defaults.max_headers,
            max_frame_bytes: env_parsed("CHOPIN_MAX_FRAME_BYTES", defaults.max_frame_bytes),
            server_ident: std::env::var("CHOPIN_SERVER_IDENT").unwrap_or(defaults.server_ident),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
