//! cache_purge tool implementation.
//!
//! Purges entries of one namespace by age. Namespaces themselves are only
//! ever removed by activation cleanup or a CLEAR_CACHE message.

use chrono::Utc;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use wardrobe_sw_core::{CacheDb, Error};

use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Namespace to purge, e.g. "wardrobe-v1-dynamic".
    pub namespace: String,

    /// Purge entries stored more than this many seconds ago.
    pub older_than_secs: i64,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: u64,
    /// Entries left in the namespace.
    pub remaining: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(cache: &CacheDb, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.namespace.is_empty() {
        return Err(Error::InvalidInput("namespace cannot be empty".to_string()).into());
    }
    if params.older_than_secs < 0 {
        return Err(Error::InvalidInput("older_than_secs must not be negative".to_string()).into());
    }

    let cutoff = (Utc::now() - chrono::Duration::seconds(params.older_than_secs)).to_rfc3339();
    let deleted = cache.purge_entries_older_than(&params.namespace, &cutoff).await?;
    let remaining = cache.entry_count(&params.namespace).await?;

    tracing::info!(namespace = %params.namespace, deleted, remaining, "purged cache entries");
    json_result(&CachePurgeOutput { deleted, remaining })
}
