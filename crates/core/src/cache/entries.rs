//! Namespace and entry operations on the SQLite store.
//!
//! Entries are written in a single transaction together with their
//! namespace row, so a reader never observes a partially stored response.

use std::collections::BTreeMap;

use super::connection::CacheDb;
use crate::Error;
use crate::http::{Request, Response, ResponseType};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored response snapshot keyed by its request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntry {
    pub key: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub response_type: String,
    pub stored_at: String,
}

impl CachedEntry {
    /// Snapshot a request/response exchange under `key`.
    pub fn from_exchange(key: String, request: &Request, response: &Response) -> Self {
        Self {
            key,
            method: request.method.to_string(),
            url: request.key_url(),
            status: response.status,
            status_text: response.status_text.clone(),
            headers: response.headers.clone(),
            body: response.body.to_vec(),
            response_type: response.response_type.as_str().to_string(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Rebuild the response this entry was stored from.
    pub fn to_response(&self) -> Response {
        Response {
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            body: self.body.clone().into(),
            response_type: ResponseType::parse(&self.response_type),
            url: url::Url::parse(&self.url).ok(),
            from_cache: true,
        }
    }
}

const ENTRY_COLUMNS: &str =
    "key_hash, method, url, status, status_text, headers_json, body, response_type, stored_at";

fn read_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<(CachedEntry, String)> {
    let headers_json: String = row.get(5)?;
    Ok((
        CachedEntry {
            key: row.get(0)?,
            method: row.get(1)?,
            url: row.get(2)?,
            status: row.get(3)?,
            status_text: row.get(4)?,
            headers: BTreeMap::new(),
            body: row.get(6)?,
            response_type: row.get(7)?,
            stored_at: row.get(8)?,
        },
        headers_json,
    ))
}

fn decode_entry((mut entry, headers_json): (CachedEntry, String)) -> Result<CachedEntry, Error> {
    entry.headers = serde_json::from_str(&headers_json)?;
    Ok(entry)
}

impl CacheDb {
    /// Create a namespace if it doesn't exist yet.
    pub async fn create_namespace(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO namespaces (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn namespace_exists(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM namespaces WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// All namespace names in creation order.
    pub async fn namespace_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM namespaces ORDER BY rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Drop a namespace and, through the cascade, all of its entries.
    ///
    /// Returns false if the namespace didn't exist.
    pub async fn drop_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM namespaces WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace an entry, creating its namespace if needed.
    pub async fn upsert_entry(&self, namespace: &str, entry: &CachedEntry) -> Result<(), Error> {
        let namespace = namespace.to_string();
        let entry = entry.clone();
        let headers_json = serde_json::to_string(&entry.headers)?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO namespaces (name, created_at) VALUES (?1, ?2)",
                    params![namespace, entry.stored_at],
                )?;
                tx.execute(
                    "INSERT INTO entries (
                    namespace, key_hash, method, url, status, status_text,
                    headers_json, body, response_type, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(namespace, key_hash) DO UPDATE SET
                    method = excluded.method,
                    url = excluded.url,
                    status = excluded.status,
                    status_text = excluded.status_text,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    response_type = excluded.response_type,
                    stored_at = excluded.stored_at",
                    params![
                        &namespace,
                        &entry.key,
                        &entry.method,
                        &entry.url,
                        entry.status,
                        &entry.status_text,
                        &headers_json,
                        &entry.body,
                        &entry.response_type,
                        &entry.stored_at,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by key within one namespace.
    pub async fn get_entry(&self, namespace: &str, key: &str) -> Result<Option<CachedEntry>, Error> {
        let namespace = namespace.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedEntry>, Error> {
                let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE namespace = ?1 AND key_hash = ?2");
                let result = conn.query_row(&sql, params![namespace, key], read_entry);

                match result {
                    Ok(raw) => decode_entry(raw).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Get the first entry for a key, searching namespaces in creation order.
    pub async fn find_entry(&self, key: &str) -> Result<Option<CachedEntry>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedEntry>, Error> {
                let sql = format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries e
                     JOIN namespaces n ON n.name = e.namespace
                     WHERE e.key_hash = ?1
                     ORDER BY n.rowid ASC LIMIT 1"
                );
                let result = conn.query_row(&sql, params![key], read_entry);

                match result {
                    Ok(raw) => decode_entry(raw).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in a namespace, oldest first.
    pub async fn entry_urls(&self, namespace: &str) -> Result<Vec<String>, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt =
                    conn.prepare("SELECT url FROM entries WHERE namespace = ?1 ORDER BY stored_at ASC, rowid ASC")?;
                let urls = stmt
                    .query_map(params![namespace], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in a namespace.
    pub async fn entry_count(&self, namespace: &str) -> Result<u64, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE namespace = ?1", params![namespace], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries of a namespace stored before `cutoff` (RFC 3339).
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_entries_older_than(&self, namespace: &str, cutoff: &str) -> Result<u64, Error> {
        let namespace = namespace.to_string();
        let cutoff = cutoff.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE namespace = ?1 AND stored_at < ?2",
                    params![namespace, cutoff],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn exchange(url: &str, body: &str) -> (Request, Response) {
        let request = Request::get(Url::parse(url).unwrap());
        let response = Response::new(200, body.to_string())
            .with_header("Content-Type", "text/css")
            .with_type(ResponseType::Basic);
        (request, response)
    }

    fn entry(url: &str, body: &str) -> CachedEntry {
        let (request, response) = exchange(url, body);
        CachedEntry::from_exchange(request.cache_key(&[]), &request, &response)
    }

    #[tokio::test]
    async fn test_upsert_and_get_round_trip() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let (request, response) = exchange("https://app.example/app.css", "body{}");
        let stored = CachedEntry::from_exchange(request.cache_key(&[]), &request, &response);

        db.upsert_entry("wardrobe-v1-static", &stored).await.unwrap();

        let retrieved = db.get_entry("wardrobe-v1-static", &stored.key).await.unwrap().unwrap();
        assert_eq!(retrieved, stored);

        let replayed = retrieved.to_response();
        assert_eq!(replayed.status, response.status);
        assert_eq!(replayed.headers, response.headers);
        assert_eq!(replayed.body, response.body);
        assert_eq!(replayed.response_type, ResponseType::Basic);
        assert!(replayed.from_cache);
    }

    #[tokio::test]
    async fn test_upsert_creates_namespace() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(!db.namespace_exists("wardrobe-v1-images").await.unwrap());

        db.upsert_entry("wardrobe-v1-images", &entry("https://app.example/a.png", "png"))
            .await
            .unwrap();

        assert!(db.namespace_exists("wardrobe-v1-images").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_key() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.upsert_entry("ns", &entry("https://app.example/a.js", "old")).await.unwrap();
        let newer = entry("https://app.example/a.js", "new");
        db.upsert_entry("ns", &newer).await.unwrap();

        assert_eq!(db.entry_count("ns").await.unwrap(), 1);
        let got = db.get_entry("ns", &newer.key).await.unwrap().unwrap();
        assert_eq!(got.body, b"new".to_vec());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_entry("ns", "nonexistent").await.unwrap().is_none());
        assert!(db.find_entry("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_entry_prefers_oldest_namespace() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.create_namespace("first").await.unwrap();
        db.create_namespace("second").await.unwrap();

        let mut second = entry("https://app.example/", "second");
        db.upsert_entry("second", &second).await.unwrap();
        second.body = b"first".to_vec();
        db.upsert_entry("first", &second).await.unwrap();

        let found = db.find_entry(&second.key).await.unwrap().unwrap();
        assert_eq!(found.body, b"first".to_vec());
    }

    #[tokio::test]
    async fn test_drop_namespace_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let stored = entry("https://app.example/a.js", "x");
        db.upsert_entry("ns", &stored).await.unwrap();

        assert!(db.drop_namespace("ns").await.unwrap());
        assert!(!db.drop_namespace("ns").await.unwrap());
        assert!(db.find_entry(&stored.key).await.unwrap().is_none());
        assert_eq!(db.entry_count("ns").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_namespace_names_in_creation_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.create_namespace("b").await.unwrap();
        db.create_namespace("a").await.unwrap();
        db.create_namespace("b").await.unwrap();

        assert_eq!(db.namespace_names().await.unwrap(), vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn test_purge_entries_older_than() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let mut old = entry("https://app.example/old.js", "x");
        old.stored_at = "2020-01-01T00:00:00+00:00".into();
        db.upsert_entry("ns", &old).await.unwrap();
        db.upsert_entry("ns", &entry("https://app.example/new.js", "y")).await.unwrap();

        let deleted = db.purge_entries_older_than("ns", "2021-01-01T00:00:00+00:00").await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(db.entry_urls("ns").await.unwrap(), vec!["https://app.example/new.js".to_string()]);
    }
}
