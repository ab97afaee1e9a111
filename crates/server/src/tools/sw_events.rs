//! Platform event tools: sw_push, sw_notification_click, sw_sync, sw_network.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::runtime::Runtime;

/// Parameters for the sw_push tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwPushParams {
    /// Raw push data; usually JSON {title?, body?, url?, tag?}.
    #[serde(default)]
    pub payload: Option<String>,
}

/// Parameters for the sw_notification_click tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwNotificationClickParams {
    /// Tag of the displayed notification.
    pub tag: String,

    /// Action button chosen ("open" or "close"); omit for a body click.
    #[serde(default)]
    pub action: Option<String>,
}

/// Parameters for the sw_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwSyncParams {
    pub tag: String,
}

/// Parameters for the sw_network tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwNetworkParams {
    pub online: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwSyncOutput {
    pub tag: String,
    /// False when the worker does not own the tag.
    pub handled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwNetworkOutput {
    pub online: bool,
    /// Queued sync tags that ran on reconnect.
    pub synced: Vec<String>,
}

pub async fn push_impl(runtime: &Runtime, params: SwPushParams) -> Result<CallToolResult, McpError> {
    let notification = runtime.push(params.payload.as_deref().map(str::as_bytes)).await?;
    json_result(&notification)
}

pub async fn notification_click_impl(
    runtime: &Runtime, params: SwNotificationClickParams,
) -> Result<CallToolResult, McpError> {
    let outcome = runtime
        .notification_click(&params.tag, params.action.as_deref())
        .await?;
    json_result(&outcome)
}

pub async fn sync_impl(runtime: &Runtime, params: SwSyncParams) -> Result<CallToolResult, McpError> {
    let handled = runtime.sync(&params.tag).await?;
    json_result(&SwSyncOutput { tag: params.tag, handled })
}

pub async fn network_impl(runtime: &Runtime, params: SwNetworkParams) -> Result<CallToolResult, McpError> {
    let synced = runtime.set_online(params.online).await?;
    json_result(&SwNetworkOutput { online: params.online, synced })
}
