//! Process configuration.
//!
//! Defaults reproduce the fixed constants the relay has always used
//! (`127.0.0.1:8765`, 100 retained messages); every value can be
//! overridden through environment variables or a `.env` file.

use std::str::FromStr;
use std::time::Duration;

use danmaku::DEFAULT_CAPACITY;

use crate::api::server::ApiServerConfig;
use crate::error::{Error, Result};
use crate::ingest::IngestConfig;

/// Top-level relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// WebSocket ingestion listener
    pub ingest: IngestConfig,
    /// Consumer-facing HTTP API
    pub api: ApiServerConfig,
    /// Number of messages kept in the retention buffer
    pub buffer_capacity: usize,
    /// Directory for rotated log files; console only when unset
    pub log_dir: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            api: ApiServerConfig::default(),
            buffer_capacity: DEFAULT_CAPACITY,
            log_dir: None,
        }
    }
}

impl RelayConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `DANMU_BIND_ADDRESS`, `DANMU_PORT`
    /// - `DANMU_BUFFER_CAPACITY`
    /// - `DANMU_MAX_MESSAGE_SIZE` (bytes)
    /// - `DANMU_SHUTDOWN_TIMEOUT_SECS`
    /// - `API_ENABLED`, `API_BIND_ADDRESS`, `API_PORT`
    /// - `LOG_DIR`
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// Values that fail to parse are ignored and the default is kept.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(bind_address) = non_empty(&lookup, "DANMU_BIND_ADDRESS") {
            config.ingest.bind_address = bind_address;
        }
        if let Some(port) = parsed(&lookup, "DANMU_PORT") {
            config.ingest.port = port;
        }
        if let Some(size) = parsed(&lookup, "DANMU_MAX_MESSAGE_SIZE") {
            config.ingest.max_message_size = size;
        }
        if let Some(secs) = parsed(&lookup, "DANMU_SHUTDOWN_TIMEOUT_SECS") {
            config.ingest.shutdown_timeout = Duration::from_secs(secs);
        }
        if let Some(capacity) = parsed(&lookup, "DANMU_BUFFER_CAPACITY") {
            config.buffer_capacity = capacity;
        }

        if let Some(enabled) = non_empty(&lookup, "API_ENABLED") {
            config.api.enabled = parse_bool(&enabled).unwrap_or(config.api.enabled);
        }
        if let Some(bind_address) = non_empty(&lookup, "API_BIND_ADDRESS") {
            config.api.bind_address = bind_address;
        }
        if let Some(port) = parsed(&lookup, "API_PORT") {
            config.api.port = port;
        }

        config.log_dir = non_empty(&lookup, "LOG_DIR");

        config
    }

    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(Error::config("buffer capacity must be at least 1"));
        }
        if self.ingest.max_message_size == 0 {
            return Err(Error::config("max message size must be at least 1 byte"));
        }
        if self.api.enabled
            && self.api.port == self.ingest.port
            && self.api.port != 0
            && self.api.bind_address == self.ingest.bind_address
        {
            return Err(Error::config(format!(
                "API and ingest listeners cannot share {}:{}",
                self.api.bind_address, self.api.port
            )));
        }
        Ok(())
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    non_empty(lookup, key).and_then(|v| v.parse().ok())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
