//! MCP tool implementations.
//!
//! `sw_*` tools deliver platform events to the worker, `pwa_*` tools drive
//! the host-side controller, and `cache_*` tools inspect the namespaces.

pub mod cache;
pub mod pwa;
pub mod sw_deploy;
pub mod sw_events;
pub mod sw_fetch;
pub mod sw_message;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use wardrobe_sw_core::Error;

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
