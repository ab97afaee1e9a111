//! sw_message tool implementation.
//!
//! Posts a raw message to the worker. Unrecognized messages are ignored,
//! the way the worker's message handler ignores them.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use wardrobe_sw_core::{WorkerMessage, WorkerReply};

use super::json_result;
use crate::runtime::Runtime;

/// Parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message object, e.g. {"type": "CLEAR_CACHE"} or {"type": "SKIP_WAITING"}.
    pub message: serde_json::Value,
}

/// Output from the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageOutput {
    /// False when the message was not recognized.
    pub delivered: bool,
    pub reply: Option<WorkerReply>,
}

/// Implementation of the sw_message tool.
pub async fn message_impl(runtime: &Runtime, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let output = match WorkerMessage::parse(&params.message.to_string()) {
        Some(message) => SwMessageOutput { delivered: true, reply: Some(runtime.post_message(message).await?) },
        None => SwMessageOutput { delivered: false, reply: None },
    };
    json_result(&output)
}
