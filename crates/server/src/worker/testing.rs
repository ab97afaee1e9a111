//! Scripted network and instrumented store shared by the worker tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;
use wardrobe_sw_client::Fetcher;
use wardrobe_sw_core::{AppConfig, CacheDb, CacheStore, CachedEntry, Error, Request, Response, ResponseType, WorkerConfig};

pub const SCOPE: &str = "http://localhost:5173/";

pub fn worker_config() -> WorkerConfig {
    AppConfig::default().worker_config().unwrap()
}

pub fn url(path: &str) -> Url {
    Url::parse(SCOPE).unwrap().join(path).unwrap()
}

/// A network whose answers are scripted per URL.
///
/// Unscripted URLs answer 404. While offline every fetch is rejected.
pub struct ScriptedFetcher {
    online: AtomicBool,
    routes: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<Request>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { online: AtomicBool::new(true), routes: Mutex::default(), calls: Mutex::default() })
    }

    /// Serve `body` with status 200 at `url`, typed basic when same-origin.
    pub fn serve(&self, url: &Url, content_type: &str, body: &str) {
        let response_type =
            if url.origin() == Url::parse(SCOPE).unwrap().origin() { ResponseType::Basic } else { ResponseType::Cors };
        let response = Response::new(200, body.to_string())
            .with_header("content-type", content_type)
            .with_type(response_type);
        self.respond(url, response);
    }

    pub fn respond(&self, url: &Url, response: Response) {
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    /// Serve every precache path of `config` with a recognizable body.
    pub fn serve_precache(&self, config: &WorkerConfig) {
        for path in &config.precache {
            self.serve(&config.resolve(path).unwrap(), "text/html", &format!("body of {path}"));
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.lock().unwrap().push(request.clone());
        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {}", request.url)));
        }
        let scripted = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        let mut response = scripted.unwrap_or_else(|| Response::new(404, "not found").with_type(ResponseType::Basic));
        response.url = Some(request.url.clone());
        Ok(response)
    }
}

/// SQLite store that counts reads and writes, and can be told to fail
/// writes or to slow down and fail namespace listing.
pub struct RecordingStore {
    inner: CacheDb,
    pub lookups: AtomicUsize,
    pub puts: AtomicUsize,
    pub fail_puts: AtomicBool,
    pub fail_lists: AtomicBool,
    pub list_delay_ms: AtomicU64,
}

impl RecordingStore {
    pub async fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: CacheDb::open_in_memory().await.unwrap(),
            lookups: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            fail_puts: AtomicBool::new(false),
            fail_lists: AtomicBool::new(false),
            list_delay_ms: AtomicU64::new(0),
        })
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for RecordingStore {
    async fn open(&self, name: &str) -> Result<(), Error> {
        CacheStore::open(&self.inner, name).await
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        CacheStore::has(&self.inner, name).await
    }

    async fn lookup(&self, name: &str, key: &str) -> Result<Option<CachedEntry>, Error> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        CacheStore::lookup(&self.inner, name, key).await
    }

    async fn lookup_any(&self, key: &str) -> Result<Option<CachedEntry>, Error> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        CacheStore::lookup_any(&self.inner, key).await
    }

    async fn put(&self, name: &str, entry: &CachedEntry) -> Result<(), Error> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::InvalidState("quota exceeded".into()));
        }
        CacheStore::put(&self.inner, name, entry).await
    }

    async fn delete_namespace(&self, name: &str) -> Result<bool, Error> {
        CacheStore::delete_namespace(&self.inner, name).await
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, Error> {
        let delay = self.list_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(Error::InvalidState("storage unavailable".into()));
        }
        CacheStore::list_namespaces(&self.inner).await
    }

    async fn keys(&self, name: &str) -> Result<Vec<String>, Error> {
        CacheStore::keys(&self.inner, name).await
    }
}
