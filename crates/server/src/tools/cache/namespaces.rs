//! cache_namespaces tool implementation.
//!
//! Lists every namespace in the store with the URLs it holds.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::runtime::Runtime;
use crate::tools::json_result;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NamespaceSummary {
    pub name: String,
    /// Whether the active worker version owns this namespace.
    pub current: bool,
    /// Stored request URLs, oldest first.
    pub entries: Vec<String>,
}

/// Output from the cache_namespaces tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheNamespacesOutput {
    pub namespaces: Vec<NamespaceSummary>,
}

/// Implementation of the cache_namespaces tool.
pub async fn namespaces_impl(runtime: &Runtime) -> Result<CallToolResult, McpError> {
    let current = runtime
        .active()
        .map(|worker| worker.namespaces().current_names())
        .unwrap_or_default();

    let store = runtime.store();
    let mut namespaces = Vec::new();
    for name in store.list_namespaces().await? {
        let entries = store.keys(&name).await?;
        namespaces.push(NamespaceSummary { current: current.contains(&name), name, entries });
    }

    json_result(&CacheNamespacesOutput { namespaces })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{output, registered_runtime};
    use wardrobe_sw_core::CacheStore;

    #[tokio::test]
    async fn test_lists_current_and_foreign() {
        let (runtime, _, db) = registered_runtime().await;
        CacheStore::open(&db, "wardrobe-v0-images").await.unwrap();

        let result = namespaces_impl(&runtime).await.unwrap();
        let out = output(&result);
        let namespaces = out["namespaces"].as_array().unwrap();

        assert_eq!(namespaces.len(), 2);
        assert_eq!(namespaces[0]["name"], "wardrobe-v1-static");
        assert_eq!(namespaces[0]["current"], true);
        assert_eq!(namespaces[0]["entries"].as_array().unwrap().len(), 6);
        assert_eq!(namespaces[1]["current"], false);
    }
}
