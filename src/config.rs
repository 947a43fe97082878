// src/config.rs
//! Engine configuration
//!
//! Built-in defaults can be overlaid by a JSON file. Every field in the file
//! is optional; a field that is missing keeps its default and a field with an
//! out-of-range value is replaced by its default with a warning.
//!
//! ```json
//! {
//!     "listen_threads": 4,
//!     "work_threads": 4,
//!     "buffer_size": 1048576,
//!     "server_ip": "0.0.0.0",
//!     "port": 8888,
//!     "listen_strategy": "shared_socket"
//! }
//! ```

use crate::circular::MAX_RING_CAPACITY;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

/// Default number of listener threads.
pub const DEFAULT_LISTEN_THREADS: usize = 4;
/// Default number of worker threads.
pub const DEFAULT_WORK_THREADS: usize = 4;
/// Default ring capacity (1 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;
/// Default bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
/// Default UDP port.
pub const DEFAULT_PORT: u16 = 8888;
/// Upper bound on either thread pool.
pub const MAX_THREADS: usize = 1024;

/// How listener threads share the bound socket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenStrategy {
    /// Every listener polls its own registration of the one shared socket and
    /// the kernel decides which thread receives each datagram.
    #[default]
    SharedSocket,
    /// Listener 0 alone receives from the socket and hands datagrams to the
    /// other listeners over a bounded channel; they write into the ring.
    SingleReceiver,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of listener threads (1..=[`MAX_THREADS`])
    pub listen_threads: usize,
    /// Number of worker threads (1..=[`MAX_THREADS`])
    pub work_threads: usize,
    /// Ring capacity in bytes
    pub buffer_size: usize,
    /// IP address to bind
    #[serde(alias = "server_ip")]
    pub bind_address: String,
    /// UDP port to bind; 0 lets the OS pick
    pub port: u16,
    /// Socket sharing policy for the listener pool
    pub listen_strategy: ListenStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            listen_threads: DEFAULT_LISTEN_THREADS,
            work_threads: DEFAULT_WORK_THREADS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            listen_strategy: ListenStrategy::default(),
        }
    }
}

/// Partial configuration as read from a file.
///
/// Numbers are read as floats so `2`, `2.0` and `2e0` all count, truncated
/// toward zero.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigOverrides {
    listen_threads: Option<f64>,
    work_threads: Option<f64>,
    buffer_size: Option<f64>,
    bind_address: Option<String>,
    server_ip: Option<String>,
    port: Option<f64>,
    listen_strategy: Option<ListenStrategy>,
}

/// Non-negative whole part of a JSON number, 0 for anything else.
fn whole(value: f64) -> usize {
    if value.is_finite() && value >= 1.0 {
        // saturates at usize::MAX
        value as usize
    } else {
        0
    }
}

impl EngineConfig {
    /// Small configuration for tests and demos on loopback with an OS-chosen port.
    pub fn loopback() -> Self {
        Self {
            listen_threads: 2,
            work_threads: 2,
            buffer_size: 64 * 1024,
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            listen_strategy: ListenStrategy::SharedSocket,
        }
    }

    /// Parses a JSON document and overlays it on the defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let overrides: ConfigOverrides = serde_json::from_str(json)?;
        let mut config = Self::default();
        config.apply(overrides);
        Ok(config.sanitized())
    }

    /// Loads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Loads a configuration file, falling back to defaults on any problem.
    ///
    /// A missing file is a warning; an unreadable or malformed one is logged
    /// as an error. Either way the defaults are returned.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!(
                "Config file {} not found, using default values",
                path.display()
            );
            return Self::default();
        }
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!(
                    "Failed to read config file {}: {}, using default values",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(n) = overrides.listen_threads {
            self.listen_threads = whole(n);
        }
        if let Some(n) = overrides.work_threads {
            self.work_threads = whole(n);
        }
        if let Some(size) = overrides.buffer_size {
            self.buffer_size = whole(size);
        }
        // bind_address wins when both keys are present
        if let Some(addr) = overrides.bind_address.or(overrides.server_ip) {
            self.bind_address = addr;
        }
        if let Some(port) = overrides.port {
            if port.is_finite() && (0.0..=f64::from(u16::MAX)).contains(&port) {
                self.port = port as u16;
            } else {
                log::warn!(
                    "Invalid port {} in config, using default {}",
                    port,
                    DEFAULT_PORT
                );
            }
        }
        if let Some(strategy) = overrides.listen_strategy {
            self.listen_strategy = strategy;
        }
    }

    /// Returns a copy with every invalid field replaced by its default.
    pub fn sanitized(mut self) -> Self {
        if self.listen_threads == 0 {
            log::warn!(
                "listen_threads must be at least 1, using default {}",
                DEFAULT_LISTEN_THREADS
            );
            self.listen_threads = DEFAULT_LISTEN_THREADS;
        } else if self.listen_threads > MAX_THREADS {
            log::warn!(
                "listen_threads {} exceeds {}, clamping",
                self.listen_threads,
                MAX_THREADS
            );
            self.listen_threads = MAX_THREADS;
        }
        if self.work_threads == 0 {
            log::warn!(
                "work_threads must be at least 1, using default {}",
                DEFAULT_WORK_THREADS
            );
            self.work_threads = DEFAULT_WORK_THREADS;
        } else if self.work_threads > MAX_THREADS {
            log::warn!(
                "work_threads {} exceeds {}, clamping",
                self.work_threads,
                MAX_THREADS
            );
            self.work_threads = MAX_THREADS;
        }
        if self.buffer_size == 0 || self.buffer_size > MAX_RING_CAPACITY {
            log::warn!(
                "buffer_size {} out of range (1..={}), using default {}",
                self.buffer_size,
                MAX_RING_CAPACITY,
                DEFAULT_BUFFER_SIZE
            );
            self.buffer_size = DEFAULT_BUFFER_SIZE;
        }
        if self.bind_address.trim().parse::<IpAddr>().is_err() {
            log::warn!(
                "bind_address {:?} is not an IP address, using default {}",
                self.bind_address,
                DEFAULT_BIND_ADDRESS
            );
            self.bind_address = DEFAULT_BIND_ADDRESS.to_string();
        }
        self
    }

    /// Socket address this configuration binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        let ip = self
            .bind_address
            .trim()
            .parse::<IpAddr>()
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        SocketAddr::new(ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.listen_threads, 4);
        assert_eq!(config.work_threads, 4);
        assert_eq!(config.buffer_size, 1024 * 1024);
        assert_eq!(config.bind_addr(), "0.0.0.0:8888".parse().unwrap());
        assert_eq!(config.listen_strategy, ListenStrategy::SharedSocket);
    }

    #[test]
    fn test_partial_overlay() {
        let config = EngineConfig::from_json(r#"{ "work_threads": 8, "port": 9999 }"#).unwrap();
        assert_eq!(config.work_threads, 8);
        assert_eq!(config.port, 9999);
        assert_eq!(config.listen_threads, DEFAULT_LISTEN_THREADS);
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
    }

    #[test]
    fn test_server_ip_alias_and_float_size() {
        let config = EngineConfig::from_json(
            r#"{ "server_ip": "127.0.0.1", "buffer_size": 4096.0, "listen_strategy": "single_receiver" }"#,
        )
        .unwrap();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.listen_strategy, ListenStrategy::SingleReceiver);
    }

    #[test]
    fn test_float_counts_and_both_address_keys() {
        let config = EngineConfig::from_json(
            r#"{ "listen_threads": 2.0, "work_threads": 3.7, "port": 9000.0,
                 "server_ip": "10.0.0.1", "bind_address": "127.0.0.1" }"#,
        )
        .unwrap();
        assert_eq!(config.listen_threads, 2);
        assert_eq!(config.work_threads, 3);
        assert_eq!(config.port, 9000);
        assert_eq!(config.bind_address, "127.0.0.1");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = EngineConfig::from_json(
            r#"{ "listen_threads": 0, "work_threads": -3, "buffer_size": 0,
                 "server_ip": "not-an-ip", "port": 70000 }"#,
        )
        .unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_thread_counts_are_clamped() {
        let config = EngineConfig {
            listen_threads: usize::MAX / 8,
            work_threads: MAX_THREADS + 1,
            ..EngineConfig::default()
        }
        .sanitized();
        assert_eq!(config.listen_threads, MAX_THREADS);
        assert_eq!(config.work_threads, MAX_THREADS);

        let config = EngineConfig::from_json(r#"{ "listen_threads": 9223372036854775807 }"#).unwrap();
        assert_eq!(config.listen_threads, MAX_THREADS);
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(matches!(
            EngineConfig::from_json("{ listen_threads: "),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = EngineConfig::load("/definitely/not/here/udpring.json");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "listen_threads": 2, "port": 0 }"#).unwrap();

        let config = EngineConfig::load(&path);
        assert_eq!(config.listen_threads, 2);
        assert_eq!(config.port, 0);
    }

    #[test]
    fn test_load_malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert_eq!(EngineConfig::load(&path), EngineConfig::default());
        assert!(EngineConfig::from_file(&path).is_err());
    }
}
