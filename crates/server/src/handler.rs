//! MCP server handler implementation.
//!
//! Maps platform events, delivered as tool calls, onto the worker runtime
//! and the host-side controller.

use std::sync::Arc;

use crate::runtime::Runtime;
use crate::tools::cache::{CachePurgeParams, namespaces_impl, purge_impl};
use crate::tools::pwa::{
    PwaRegisterSyncParams, clear_cache_impl, notification_permission_impl, register_sync_impl, status_impl,
    update_impl,
};
use crate::tools::sw_deploy::{SwDeployParams, deploy_impl};
use crate::tools::sw_events::{
    SwNetworkParams, SwNotificationClickParams, SwPushParams, SwSyncParams, network_impl, notification_click_impl,
    push_impl, sync_impl,
};
use crate::tools::sw_fetch::{SwFetchParams, fetch_impl};
use crate::tools::sw_message::{SwMessageParams, message_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use wardrobe_sw_client::PwaController;
use wardrobe_sw_core::CacheDb;

/// The main MCP server handler for wardrobe-sw.
#[derive(Clone)]
pub struct WardrobeSwServer {
    runtime: Arc<Runtime>,
    pwa: Arc<PwaController>,
    db: CacheDb,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl WardrobeSwServer {
    /// Create a new server handler.
    pub fn new(runtime: Arc<Runtime>, pwa: Arc<PwaController>, db: CacheDb) -> Self {
        Self { runtime, pwa, db, tool_router: Self::tool_router() }
    }

    #[tool(description = "Issue a request from a controlled page through the worker's router. \
        Returns status, headers, body and whether it was served from cache.")]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.runtime, params.0).await
    }

    #[tool(description = "Deploy a new worker version token. Installs and activates it, reclaiming stale caches.")]
    async fn sw_deploy(&self, params: Parameters<SwDeployParams>) -> Result<CallToolResult, McpError> {
        deploy_impl(&self.runtime, params.0).await
    }

    #[tool(description = "Post a message to the worker, e.g. {\"type\":\"CLEAR_CACHE\"} or {\"type\":\"SKIP_WAITING\"}.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.runtime, params.0).await
    }

    #[tool(description = "Deliver a push message with an optional JSON payload {title, body, url, tag}.")]
    async fn sw_push(&self, params: Parameters<SwPushParams>) -> Result<CallToolResult, McpError> {
        push_impl(&self.runtime, params.0).await
    }

    #[tool(description = "Click a displayed notification by tag, optionally on its open/close action.")]
    async fn sw_notification_click(
        &self, params: Parameters<SwNotificationClickParams>,
    ) -> Result<CallToolResult, McpError> {
        notification_click_impl(&self.runtime, params.0).await
    }

    #[tool(description = "Fire a background sync event for a tag.")]
    async fn sw_sync(&self, params: Parameters<SwSyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.runtime, params.0).await
    }

    #[tool(description = "Switch simulated connectivity on or off. Reconnecting runs queued sync tags.")]
    async fn sw_network(&self, params: Parameters<SwNetworkParams>) -> Result<CallToolResult, McpError> {
        network_impl(&self.runtime, params.0).await
    }

    #[tool(description = "List cache namespaces and the URLs stored in each.")]
    async fn cache_namespaces(&self) -> Result<CallToolResult, McpError> {
        namespaces_impl(&self.runtime).await
    }

    #[tool(description = "Purge entries of one namespace older than a number of seconds.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.db, params.0).await
    }

    #[tool(description = "Host page state (install, online, update) and worker registration status.")]
    async fn pwa_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.pwa, &self.runtime).await
    }

    #[tool(description = "Check for a new worker version and reload the page.")]
    async fn pwa_update(&self) -> Result<CallToolResult, McpError> {
        update_impl(&self.pwa).await
    }

    #[tool(description = "Ask the worker to clear every cache and wait for its acknowledgment.")]
    async fn pwa_clear_cache(&self) -> Result<CallToolResult, McpError> {
        clear_cache_impl(&self.pwa).await
    }

    #[tool(description = "Register a background sync tag (default: wardrobe-sync).")]
    async fn pwa_register_sync(&self, params: Parameters<PwaRegisterSyncParams>) -> Result<CallToolResult, McpError> {
        register_sync_impl(&self.pwa, params.0).await
    }

    #[tool(description = "Request notification permission; a no-op once granted or denied.")]
    async fn pwa_notification_permission(&self) -> Result<CallToolResult, McpError> {
        notification_permission_impl(&self.pwa).await
    }
}

impl ServerHandler for WardrobeSwServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "wardrobe-sw".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
