//! Storage port used by the namespace manager and the strategies.
//!
//! The platform's cache storage is one shared singleton; everything above
//! this trait talks to it only through these operations, so the policy code
//! runs unchanged against SQLite on disk or in memory.

use async_trait::async_trait;

use super::connection::CacheDb;
use super::entries::CachedEntry;
use crate::Error;

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open (creating if needed) a namespace.
    async fn open(&self, name: &str) -> Result<(), Error>;

    async fn has(&self, name: &str) -> Result<bool, Error>;

    /// Match a key within one namespace.
    async fn lookup(&self, name: &str, key: &str) -> Result<Option<CachedEntry>, Error>;

    /// Match a key across every namespace, oldest namespace first.
    async fn lookup_any(&self, key: &str) -> Result<Option<CachedEntry>, Error>;

    /// Store an entry, replacing any previous entry under the same key.
    async fn put(&self, name: &str, entry: &CachedEntry) -> Result<(), Error>;

    /// Delete a namespace with all its entries. Returns false if absent.
    async fn delete_namespace(&self, name: &str) -> Result<bool, Error>;

    /// Namespace names in creation order.
    async fn list_namespaces(&self) -> Result<Vec<String>, Error>;

    /// URLs of the entries stored in a namespace.
    async fn keys(&self, name: &str) -> Result<Vec<String>, Error>;
}

#[async_trait]
impl CacheStore for CacheDb {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.create_namespace(name).await
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        self.namespace_exists(name).await
    }

    async fn lookup(&self, name: &str, key: &str) -> Result<Option<CachedEntry>, Error> {
        self.get_entry(name, key).await
    }

    async fn lookup_any(&self, key: &str) -> Result<Option<CachedEntry>, Error> {
        self.find_entry(key).await
    }

    async fn put(&self, name: &str, entry: &CachedEntry) -> Result<(), Error> {
        self.upsert_entry(name, entry).await
    }

    async fn delete_namespace(&self, name: &str) -> Result<bool, Error> {
        self.drop_namespace(name).await
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, Error> {
        self.namespace_names().await
    }

    async fn keys(&self, name: &str) -> Result<Vec<String>, Error> {
        self.entry_urls(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Request, Response};
    use std::sync::Arc;
    use url::Url;

    #[tokio::test]
    async fn test_store_through_trait_object() {
        let store: Arc<dyn CacheStore> = Arc::new(CacheDb::open_in_memory().await.unwrap());
        store.open("wardrobe-v1-static").await.unwrap();
        assert!(store.has("wardrobe-v1-static").await.unwrap());

        let request = Request::get(Url::parse("https://app.example/index.html").unwrap());
        let response = Response::new(200, "<html></html>");
        let entry = CachedEntry::from_exchange(request.cache_key(&[]), &request, &response);
        store.put("wardrobe-v1-static", &entry).await.unwrap();

        assert_eq!(store.keys("wardrobe-v1-static").await.unwrap(), vec![
            "https://app.example/index.html".to_string()
        ]);
        assert!(store.lookup("wardrobe-v1-static", &entry.key).await.unwrap().is_some());
        assert!(store.lookup("wardrobe-v1-images", &entry.key).await.unwrap().is_none());
        assert!(store.lookup_any(&entry.key).await.unwrap().is_some());

        assert!(store.delete_namespace("wardrobe-v1-static").await.unwrap());
        assert!(store.list_namespaces().await.unwrap().is_empty());
    }
}
