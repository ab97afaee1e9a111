//! Versioned cache namespaces.
//!
//! Names follow `{prefix}-{version}-{purpose}`. Exactly one namespace per
//! purpose is current; anything else carrying `{prefix}-` is stale once a
//! new version activates. Invalidation is all-or-nothing: there is no
//! per-entry expiry, only the global version token.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::store::CacheStore;
use crate::Error;

/// What a namespace holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Static,
    Dynamic,
    Images,
}

impl Purpose {
    pub const ALL: [Purpose; 3] = [Purpose::Static, Purpose::Dynamic, Purpose::Images];

    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Static => "static",
            Purpose::Dynamic => "dynamic",
            Purpose::Images => "images",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opened namespace at the current version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceHandle {
    pub name: String,
    pub purpose: Purpose,
}

/// Creates, names and reclaims the namespaces of one cache version.
#[derive(Clone)]
pub struct NamespaceManager {
    store: Arc<dyn CacheStore>,
    prefix: String,
    version: String,
}

impl fmt::Debug for NamespaceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceManager")
            .field("prefix", &self.prefix)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl NamespaceManager {
    pub fn new(store: Arc<dyn CacheStore>, prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self { store, prefix: prefix.into(), version: version.into() }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Name of the current namespace for `purpose`.
    pub fn name_for(&self, purpose: Purpose) -> String {
        format!("{}-{}-{}", self.prefix, self.version, purpose)
    }

    /// The full set of current namespace names.
    pub fn current_names(&self) -> BTreeSet<String> {
        Purpose::ALL.iter().map(|p| self.name_for(*p)).collect()
    }

    /// Whether `name` belongs to this application, any version.
    pub fn is_owned(&self, name: &str) -> bool {
        name.starts_with(&format!("{}-", self.prefix))
    }

    /// Open (creating if needed) the current namespace for `purpose`.
    ///
    /// Idempotent: opening twice yields the same single namespace.
    pub async fn ensure(&self, purpose: Purpose) -> Result<NamespaceHandle, Error> {
        let name = self.name_for(purpose);
        self.store.open(&name).await?;
        Ok(NamespaceHandle { name, purpose })
    }

    /// Delete every owned namespace not in `current`.
    ///
    /// Foreign namespaces (other prefixes) are left alone. Returns the
    /// deleted names.
    pub async fn reclaim_stale(&self, current: &BTreeSet<String>) -> Result<Vec<String>, Error> {
        let mut reclaimed = Vec::new();
        for name in self.store.list_namespaces().await? {
            if !self.is_owned(&name) || current.contains(&name) {
                continue;
            }
            if self.store.delete_namespace(&name).await? {
                tracing::info!(namespace = %name, "reclaimed stale cache namespace");
                reclaimed.push(name);
            }
        }
        Ok(reclaimed)
    }

    /// Delete every namespace in the store, whatever its prefix.
    ///
    /// Returns the number of deleted namespaces.
    pub async fn clear_all(&self) -> Result<usize, Error> {
        let mut deleted = 0;
        for name in self.store.list_namespaces().await? {
            if self.store.delete_namespace(&name).await? {
                deleted += 1;
            }
        }
        tracing::info!(deleted, "cleared all cache namespaces");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheDb;

    async fn manager(version: &str) -> (NamespaceManager, Arc<dyn CacheStore>) {
        let store: Arc<dyn CacheStore> = Arc::new(CacheDb::open_in_memory().await.unwrap());
        (NamespaceManager::new(store.clone(), "wardrobe", version), store)
    }

    #[test]
    fn test_purpose_names() {
        assert_eq!(Purpose::Static.to_string(), "static");
        assert_eq!(Purpose::Images.as_str(), "images");
    }

    #[tokio::test]
    async fn test_name_for() {
        let (ns, _) = manager("v3").await;
        assert_eq!(ns.name_for(Purpose::Dynamic), "wardrobe-v3-dynamic");
        assert_eq!(ns.current_names().len(), 3);
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let (ns, store) = manager("v1").await;
        let first = ns.ensure(Purpose::Static).await.unwrap();
        let second = ns.ensure(Purpose::Static).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.list_namespaces().await.unwrap(), vec!["wardrobe-v1-static".to_string()]);
    }

    #[tokio::test]
    async fn test_reclaim_keeps_only_current() {
        let (ns, store) = manager("v2").await;
        store.open("wardrobe-v1-static").await.unwrap();
        store.open("wardrobe-v1-images").await.unwrap();
        store.open("wardrobe-v2-static").await.unwrap();

        let reclaimed = ns.reclaim_stale(&ns.current_names()).await.unwrap();

        assert_eq!(reclaimed, vec!["wardrobe-v1-static".to_string(), "wardrobe-v1-images".to_string()]);
        assert_eq!(store.list_namespaces().await.unwrap(), vec!["wardrobe-v2-static".to_string()]);
    }

    #[tokio::test]
    async fn test_reclaim_ignores_foreign_prefix() {
        let (ns, store) = manager("v2").await;
        store.open("other-app-v1-static").await.unwrap();
        store.open("wardrobes-v1-static").await.unwrap();
        store.open("wardrobe-v1-dynamic").await.unwrap();

        ns.reclaim_stale(&ns.current_names()).await.unwrap();

        assert_eq!(store.list_namespaces().await.unwrap(), vec![
            "other-app-v1-static".to_string(),
            "wardrobes-v1-static".to_string()
        ]);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let (ns, store) = manager("v1").await;
        ns.ensure(Purpose::Static).await.unwrap();
        ns.ensure(Purpose::Images).await.unwrap();
        store.open("other-app-v1-static").await.unwrap();

        assert_eq!(ns.clear_all().await.unwrap(), 3);
        assert!(store.list_namespaces().await.unwrap().is_empty());
    }
}
