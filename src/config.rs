//! Process-wide extraction settings.
//!
//! The extractor keeps one `ExtractConfig` behind a lock; every new fetch
//! copies the transport-relevant fields into a [`TransportSettings`] so that
//! changing the config never affects fetches already in flight.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::ChunkSize;

#[cfg(target_os = "macos")]
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_11_2) AppleWebKit/601.3.9 (KHTML, like Gecko) Version/9.0.2 Safari/601.3.9";
#[cfg(not(target_os = "macos"))]
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 12_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/12.0 Mobile/15E148 Safari/604.1";

#[cfg(target_os = "macos")]
pub const DEFAULT_MAX_CONNECTIONS_PER_HOST: usize = 6;
#[cfg(not(target_os = "macos"))]
pub const DEFAULT_MAX_CONNECTIONS_PER_HOST: usize = 4;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings shared by every extraction made through one extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Sent as the `User-Agent` header.
    pub user_agent: String,
    /// Simultaneous connections allowed to a single host.
    pub max_connections_per_host: usize,
    /// Request timeout handed to the transport.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Chunk size used when a call does not pick one.
    pub chunk_size: ChunkSize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_connections_per_host: DEFAULT_MAX_CONNECTIONS_PER_HOST,
            timeout: DEFAULT_TIMEOUT,
            chunk_size: ChunkSize::default(),
        }
    }
}

impl ExtractConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_max_connections_per_host(mut self, max: usize) -> Self {
        self.max_connections_per_host = max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: ChunkSize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Copies the values a transport needs for one request.
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            user_agent: self.user_agent.clone(),
            max_connections_per_host: self.max_connections_per_host.max(1),
            timeout: self.timeout,
        }
    }
}

/// Immutable per-request transport configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub user_agent: String,
    pub max_connections_per_host: usize,
    pub timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        ExtractConfig::default().transport_settings()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
