//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shardlink_protocol::DEFAULT_RECEIVE_CAPACITY;
use shardlink_session::SessionConfig;

use crate::ShardlinkError;

/// Settings for one [`ShardClient`](crate::ShardClient).
///
/// Every field has a default, so a JSON document only needs the keys it
/// changes:
///
/// ```json
/// { "server_addr": "shard.example.net:2593", "read_timeout_secs": 10 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `host:port` of the shard.
    pub server_addr: String,

    /// Seconds to wait for data before [`ShardlinkError::Timeout`].
    /// `0` waits forever.
    pub read_timeout_secs: u64,

    /// Initial receive buffer capacity, in bytes.
    pub receive_capacity: usize,

    /// Decoded messages allowed to wait for the caller. See
    /// [`SessionConfig::max_pending_messages`].
    pub max_pending_messages: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            server_addr: "127.0.0.1:2593".to_string(),
            read_timeout_secs: 30,
            receive_capacity: DEFAULT_RECEIVE_CAPACITY,
            max_pending_messages: session.max_pending_messages,
        }
    }
}

impl ClientConfig {
    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ShardlinkError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ShardlinkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ShardlinkError> {
        if self.server_addr.trim().is_empty() {
            return Err(ShardlinkError::Config("server_addr is empty".into()));
        }
        if self.receive_capacity == 0 {
            return Err(ShardlinkError::Config(
                "receive_capacity must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0)
            .then(|| Duration::from_secs(self.read_timeout_secs))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            receive_capacity: self.receive_capacity,
            max_pending_messages: self.max_pending_messages,
        }
    }
}
