//! Host → worker message protocol.

use serde::{Deserialize, Serialize};

/// A message posted by the host application to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Force an installed-but-waiting worker to activate.
    SkipWaiting,
    /// Wipe every cache namespace and acknowledge on the reply channel.
    ClearCache,
}

impl WorkerMessage {
    /// Parse a posted message; anything unrecognized yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::debug!("ignoring unrecognized worker message: {}", e);
                None
            }
        }
    }
}

/// Acknowledgment sent back on a message's reply channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WorkerReply {
    pub success: bool,
}
