//! sw_deploy tool implementation.
//!
//! Publishes a new cache version token. Once the worker is registered the
//! new version installs beside the active one and takes over immediately.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::runtime::Runtime;

/// Parameters for the sw_deploy tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwDeployParams {
    /// New version token, e.g. "v2". Must not contain '-'.
    pub version: String,
}

/// Implementation of the sw_deploy tool.
pub async fn deploy_impl(runtime: &Runtime, params: SwDeployParams) -> Result<CallToolResult, McpError> {
    let report = runtime.deploy(params.version.trim()).await?;
    json_result(&report)
}
