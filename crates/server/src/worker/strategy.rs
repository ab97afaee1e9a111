//! Caching strategies behind each route.
//!
//! ### Contract
//! - Only a rejected fetch triggers a fallback; 4xx/5xx pass through uncached.
//! - A response is cached only with status 200 (images also need a `basic`
//!   response type).
//! - Cache writes are detached onto [`PendingWrites`]; the caller's response
//!   never waits for or fails with them.

use std::sync::Arc;

use url::Url;
use wardrobe_sw_client::Fetcher;
use wardrobe_sw_core::{CachedEntry, Error, NamespaceManager, Purpose, Request, Response, ResponseType};

use super::pending::PendingWrites;
use super::router::Route;

pub const PLACEHOLDER_SVG: &str = concat!(
    r##"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="200" viewBox="0 0 200 200">"##,
    r##"<rect width="200" height="200" fill="#e5e7eb"/>"##,
    r##"<text x="100" y="100" text-anchor="middle" dominant-baseline="middle" "##,
    r##"font-family="sans-serif" font-size="16" fill="#6b7280">Image Offline</text>"##,
    "</svg>"
);

const OFFLINE_FALLBACK_HTML: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Offline</title></head>\
<body><h1>You are offline</h1><p>Reconnect to keep browsing your wardrobe.</p></body></html>";

/// Dispatches routed requests to the cache-first / network-first strategies.
pub struct StrategyEngine {
    namespaces: NamespaceManager,
    network: Arc<dyn Fetcher>,
    pending: PendingWrites,
    vary_headers: Vec<String>,
    offline_url: Url,
}

impl StrategyEngine {
    pub fn new(
        namespaces: NamespaceManager, network: Arc<dyn Fetcher>, pending: PendingWrites, vary_headers: Vec<String>,
        offline_url: Url,
    ) -> Self {
        Self { namespaces, network, pending, vary_headers, offline_url }
    }

    pub async fn handle(&self, route: Route, request: &Request) -> Result<Response, Error> {
        match route {
            Route::Passthrough | Route::Backend => self.network.fetch(request).await,
            Route::Image => self.image_cache_first(request).await,
            Route::NetworkFirst => self.network_first(request).await,
            Route::Static => self.static_cache_first(request).await,
        }
    }

    async fn image_cache_first(&self, request: &Request) -> Result<Response, Error> {
        let namespace = self.namespaces.name_for(Purpose::Images);
        let key = request.cache_key(&self.vary_headers);
        if let Some(hit) = self.lookup(&namespace, &key).await {
            return Ok(hit);
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.status == 200 && response.response_type == ResponseType::Basic {
                    self.cache_in_background(namespace, key, request, &response);
                }
                Ok(response)
            }
            Err(e) => {
                tracing::debug!("image fetch failed for {}, serving placeholder: {}", request.url, e);
                Ok(placeholder_image())
            }
        }
    }

    async fn network_first(&self, request: &Request) -> Result<Response, Error> {
        let key = request.cache_key(&self.vary_headers);
        let error = match self.network.fetch(request).await {
            Ok(response) => {
                if response.status == 200 {
                    self.cache_in_background(self.namespaces.name_for(Purpose::Dynamic), key, request, &response);
                }
                return Ok(response);
            }
            Err(e) => e,
        };

        tracing::debug!("network failed for {}, falling back to cache: {}", request.url, error);
        if let Some(hit) = self.lookup_any(&key).await {
            return Ok(hit);
        }
        Ok(self.offline_document().await)
    }

    async fn static_cache_first(&self, request: &Request) -> Result<Response, Error> {
        let namespace = self.namespaces.name_for(Purpose::Static);
        let key = request.cache_key(&self.vary_headers);
        if let Some(hit) = self.lookup(&namespace, &key).await {
            return Ok(hit);
        }

        let response = self.network.fetch(request).await?;
        if response.status == 200 {
            self.cache_in_background(namespace, key, request, &response);
        }
        Ok(response)
    }

    /// The cached offline page, or a synthesized one if it was never primed.
    async fn offline_document(&self) -> Response {
        let key = Request::get(self.offline_url.clone()).cache_key(&self.vary_headers);
        if let Some(page) = self.lookup_any(&key).await {
            return page;
        }
        tracing::warn!("offline page {} is not cached", self.offline_url);
        Response::new(503, OFFLINE_FALLBACK_HTML).with_header("content-type", "text/html; charset=utf-8")
    }

    async fn lookup(&self, namespace: &str, key: &str) -> Option<Response> {
        match self.namespaces.store().lookup(namespace, key).await {
            Ok(Some(entry)) => {
                tracing::debug!(namespace, "cache hit for {}", entry.url);
                Some(entry.to_response())
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(namespace, "cache lookup failed: {}", e);
                None
            }
        }
    }

    async fn lookup_any(&self, key: &str) -> Option<Response> {
        match self.namespaces.store().lookup_any(key).await {
            Ok(entry) => entry.map(|e| e.to_response()),
            Err(e) => {
                tracing::warn!("cache lookup failed: {}", e);
                None
            }
        }
    }

    fn cache_in_background(&self, namespace: String, key: String, request: &Request, response: &Response) {
        let entry = CachedEntry::from_exchange(key, request, response);
        let store = self.namespaces.store().clone();
        self.pending.spawn(request.url.to_string(), async move {
            store.put(&namespace, &entry).await?;
            tracing::debug!(namespace = %namespace, "cached {}", entry.url);
            Ok(())
        });
    }
}

/// Stand-in served for an image the network could not deliver.
pub fn placeholder_image() -> Response {
    Response::new(200, PLACEHOLDER_SVG)
        .with_header("content-type", "image/svg+xml")
        .with_header("cache-control", "no-store")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{RecordingStore, ScriptedFetcher, url, worker_config};
    use wardrobe_sw_core::CacheStore;

    struct Fixture {
        engine: StrategyEngine,
        store: Arc<RecordingStore>,
        network: Arc<ScriptedFetcher>,
        pending: PendingWrites,
        namespaces: NamespaceManager,
    }

    async fn fixture() -> Fixture {
        let config = worker_config();
        let store = RecordingStore::new().await;
        let network = ScriptedFetcher::new();
        let pending = PendingWrites::new();
        let namespaces = NamespaceManager::new(store.clone(), config.app_prefix.clone(), config.version.clone());
        let engine = StrategyEngine::new(
            namespaces.clone(),
            network.clone(),
            pending.clone(),
            config.vary_headers.clone(),
            config.offline_url().unwrap(),
        );
        Fixture { engine, store, network, pending, namespaces }
    }

    #[tokio::test]
    async fn test_passthrough_and_backend_never_touch_cache() {
        let f = fixture().await;
        let post = Request::new(wardrobe_sw_core::Method::Post, url("/api/items"));
        let backend = Request::get(url::Url::parse("https://abc.supabase.co/rest/v1/items").unwrap());

        f.engine.handle(Route::Passthrough, &post).await.unwrap();
        f.engine.handle(Route::Backend, &backend).await.unwrap();
        f.pending.settle().await;

        assert_eq!(f.network.calls(), 2);
        assert_eq!(f.store.lookups(), 0);
        assert_eq!(f.store.puts(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let f = fixture().await;
        f.network.set_online(false);
        let backend = Request::get(url::Url::parse("https://abc.supabase.co/rest/v1/items").unwrap());

        let err = f.engine.handle(Route::Backend, &backend).await.unwrap_err();
        assert!(err.is_network());
        assert_eq!(f.network.calls(), 1);
        assert_eq!(f.store.lookups(), 0);
    }

    #[tokio::test]
    async fn test_image_miss_then_hit() {
        let f = fixture().await;
        let image = url("/images/shirt.png");
        f.network.serve(&image, "image/png", "PNGDATA");
        let request = Request::image(image);

        let first = f.engine.handle(Route::Image, &request).await.unwrap();
        assert!(!first.from_cache);
        f.pending.settle().await;
        assert_eq!(f.store.puts(), 1);

        let second = f.engine.handle(Route::Image, &request).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.body, first.body);
        assert_eq!(second.headers, first.headers);
        assert_eq!(second.status, first.status);
        assert_eq!(f.network.calls(), 1);

        let keys = f.store.keys(&f.namespaces.name_for(Purpose::Images)).await.unwrap();
        assert_eq!(keys, vec![request.url.to_string()]);
    }

    #[tokio::test]
    async fn test_cross_origin_image_not_cached() {
        let f = fixture().await;
        let image = url::Url::parse("https://cdn.example/shirt.png").unwrap();
        f.network.serve(&image, "image/png", "PNGDATA");

        let response = f.engine.handle(Route::Image, &Request::image(image)).await.unwrap();
        f.pending.settle().await;

        assert_eq!(response.status, 200);
        assert_eq!(f.store.puts(), 0);
    }

    #[tokio::test]
    async fn test_image_error_status_not_cached() {
        let f = fixture().await;
        let missing = url("/images/missing.png");
        let broken = url("/images/broken.png");
        f.network.respond(&broken, Response::new(500, "upstream down").with_type(ResponseType::Basic));

        let not_found = f.engine.handle(Route::Image, &Request::image(missing)).await.unwrap();
        let server_error = f.engine.handle(Route::Image, &Request::image(broken.clone())).await.unwrap();
        f.pending.settle().await;

        assert_eq!(not_found.status, 404);
        assert_eq!(server_error.status, 500);
        assert_eq!(server_error.text(), "upstream down");
        assert_ne!(server_error.content_type(), Some("image/svg+xml"));
        assert_eq!(f.store.puts(), 0);

        // still a miss: the next request goes back to the network
        f.engine.handle(Route::Image, &Request::image(broken)).await.unwrap();
        assert_eq!(f.network.calls(), 3);
    }

    #[tokio::test]
    async fn test_image_offline_placeholder() {
        let f = fixture().await;
        f.network.set_online(false);

        let response = f.engine.handle(Route::Image, &Request::image(url("/images/shirt.png"))).await.unwrap();
        f.pending.settle().await;

        assert_eq!(response.content_type(), Some("image/svg+xml"));
        assert!(response.text().contains("Image Offline"));
        assert!(response.text().contains("width=\"200\""));
        assert_eq!(f.store.puts(), 0);
    }

    #[tokio::test]
    async fn test_network_first_caches_200() {
        let f = fixture().await;
        let page = url("/closet");
        f.network.serve(&page, "text/html", "<h1>closet</h1>");
        let request = Request::navigate(page);

        let live = f.engine.handle(Route::NetworkFirst, &request).await.unwrap();
        f.pending.settle().await;
        assert_eq!(live.text(), "<h1>closet</h1>");
        assert!(!live.from_cache);

        let dynamic = f.namespaces.name_for(Purpose::Dynamic);
        assert_eq!(f.store.keys(&dynamic).await.unwrap(), vec![request.url.to_string()]);

        f.network.set_online(false);
        let cached = f.engine.handle(Route::NetworkFirst, &request).await.unwrap();
        assert!(cached.from_cache);
        assert_eq!(cached.body, live.body);
    }

    #[tokio::test]
    async fn test_network_first_passes_errors_through_uncached() {
        let f = fixture().await;
        let api = url("/api/outfits");
        f.network.respond(&api, Response::new(500, "boom"));

        let response = f.engine.handle(Route::NetworkFirst, &Request::get(api)).await.unwrap();
        f.pending.settle().await;

        assert_eq!(response.status, 500);
        assert_eq!(f.store.puts(), 0);
        assert_eq!(f.store.lookups(), 0);
    }

    #[tokio::test]
    async fn test_network_first_offline_without_cache_serves_offline_page() {
        let f = fixture().await;
        let offline_url = url("/offline.html");
        let offline_request = Request::get(offline_url.clone());
        let offline_page = Response::new(200, "<h1>offline</h1>").with_header("content-type", "text/html");
        f.store
            .put(
                &f.namespaces.name_for(Purpose::Static),
                &CachedEntry::from_exchange(offline_request.cache_key(&[]), &offline_request, &offline_page),
            )
            .await
            .unwrap();
        f.network.set_online(false);

        let response = f.engine.handle(Route::NetworkFirst, &Request::navigate(url("/closet"))).await.unwrap();
        assert_eq!(response.text(), "<h1>offline</h1>");
    }

    #[tokio::test]
    async fn test_offline_page_missing_is_synthesized() {
        let f = fixture().await;
        f.network.set_online(false);

        let response = f.engine.handle(Route::NetworkFirst, &Request::navigate(url("/closet"))).await.unwrap();
        assert_eq!(response.status, 503);
        assert!(response.text().contains("offline"));
    }

    #[tokio::test]
    async fn test_static_cache_first() {
        let f = fixture().await;
        let script = url("/assets/index.js");
        f.network.serve(&script, "text/javascript", "console.log(1)");
        let request = Request::get(script);

        f.engine.handle(Route::Static, &request).await.unwrap();
        f.pending.settle().await;
        let hit = f.engine.handle(Route::Static, &request).await.unwrap();

        assert!(hit.from_cache);
        assert_eq!(f.network.calls(), 1);
    }

    #[tokio::test]
    async fn test_static_cross_origin_is_cached() {
        let f = fixture().await;
        let font = url::Url::parse("https://fonts.example/inter.woff2").unwrap();
        f.network.serve(&font, "font/woff2", "FONT");

        f.engine.handle(Route::Static, &Request::get(font)).await.unwrap();
        f.pending.settle().await;
        assert_eq!(f.store.puts(), 1);
    }

    #[tokio::test]
    async fn test_static_offline_miss_fails() {
        let f = fixture().await;
        f.network.set_online(false);

        let err = f.engine.handle(Route::Static, &Request::get(url("/assets/index.js"))).await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_static_404_not_cached() {
        let f = fixture().await;
        let response = f.engine.handle(Route::Static, &Request::get(url("/missing.css"))).await.unwrap();
        f.pending.settle().await;

        assert_eq!(response.status, 404);
        assert_eq!(f.store.puts(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_does_not_affect_response() {
        let f = fixture().await;
        f.store.fail_puts.store(true, std::sync::atomic::Ordering::SeqCst);
        let page = url("/closet");
        f.network.serve(&page, "text/html", "live");

        let response = f.engine.handle(Route::NetworkFirst, &Request::navigate(page)).await.unwrap();
        f.pending.settle().await;

        assert_eq!(response.text(), "live");
        assert_eq!(f.pending.failures(), 1);
    }
}
