//! Host-side controller tools: pwa_status, pwa_update, pwa_clear_cache,
//! pwa_register_sync, pwa_notification_permission.
//!
//! These act the way the hosting page would, through [`PwaController`], so
//! failures come back as reported outcomes rather than tool errors.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use wardrobe_sw_client::{Permission, PwaController, PwaState};

use super::json_result;
use crate::runtime::{Runtime, RuntimeStatus};

/// Parameters for the pwa_register_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PwaRegisterSyncParams {
    /// Sync tag (default: the wardrobe sync tag).
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PwaStatusOutput {
    pub host: PwaState,
    pub worker: RuntimeStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct PwaOutcome {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PwaPermissionOutput {
    pub permission: Permission,
}

pub async fn status_impl(pwa: &PwaController, runtime: &Runtime) -> Result<CallToolResult, McpError> {
    json_result(&PwaStatusOutput { host: pwa.state(), worker: runtime.status() })
}

pub async fn update_impl(pwa: &PwaController) -> Result<CallToolResult, McpError> {
    json_result(&PwaOutcome { success: pwa.update().await })
}

pub async fn clear_cache_impl(pwa: &PwaController) -> Result<CallToolResult, McpError> {
    json_result(&PwaOutcome { success: pwa.clear_cache().await })
}

pub async fn register_sync_impl(pwa: &PwaController, params: PwaRegisterSyncParams) -> Result<CallToolResult, McpError> {
    json_result(&PwaOutcome { success: pwa.register_background_sync(params.tag.as_deref()).await })
}

pub async fn notification_permission_impl(pwa: &PwaController) -> Result<CallToolResult, McpError> {
    json_result(&PwaPermissionOutput { permission: pwa.request_notification_permission().await })
}
