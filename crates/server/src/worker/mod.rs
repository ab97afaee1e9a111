//! The interception worker.
//!
//! Every platform event (install, activate, fetch, message, push,
//! notification click, sync) is an explicit method on [`ServiceWorker`].
//! The worker never calls back into its registration: install reports
//! whether it wants to skip waiting, and `handle_message` reports whether
//! activation was requested, leaving the move itself to the caller.

pub mod bridge;
pub mod lifecycle;
pub mod pending;
pub mod platform;
pub mod router;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::oneshot;
use wardrobe_sw_client::Fetcher;
use wardrobe_sw_core::{
    CacheMode, CacheStore, CachedEntry, Error, NamespaceManager, Purpose, Request, Response, WorkerConfig,
    WorkerMessage, WorkerReply,
};

use bridge::{ACTION_CLOSE, ClickOutcome, Notification, PushPayload, SyncHook};
use lifecycle::{Lifecycle, WorkerState};
use pending::PendingWrites;
use platform::WorkerPlatform;
use strategy::StrategyEngine;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct InstallReport {
    pub version: String,
    /// Precache paths stored in the static namespace.
    pub cached: Vec<String>,
    /// Precache paths that could not be fetched or stored.
    pub failed: Vec<String>,
    pub skip_waiting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct ActivateReport {
    pub version: String,
    pub reclaimed: Vec<String>,
    pub claimed: usize,
}

pub struct ServiceWorker {
    config: WorkerConfig,
    namespaces: NamespaceManager,
    network: Arc<dyn Fetcher>,
    platform: Arc<dyn WorkerPlatform>,
    sync: Arc<dyn SyncHook>,
    engine: StrategyEngine,
    lifecycle: Lifecycle,
    pending: PendingWrites,
    skip_waiting: AtomicBool,
}

impl ServiceWorker {
    pub fn new(
        config: WorkerConfig, store: Arc<dyn CacheStore>, network: Arc<dyn Fetcher>,
        platform: Arc<dyn WorkerPlatform>, sync: Arc<dyn SyncHook>,
    ) -> Result<Self, Error> {
        let namespaces = NamespaceManager::new(store, config.app_prefix.clone(), config.version.clone());
        let pending = PendingWrites::new();
        let engine = StrategyEngine::new(
            namespaces.clone(),
            network.clone(),
            pending.clone(),
            config.vary_headers.clone(),
            config.offline_url()?,
        );
        let lifecycle = Lifecycle::new(config.version.clone());

        Ok(Self {
            config,
            namespaces,
            network,
            platform,
            sync,
            engine,
            lifecycle,
            pending,
            skip_waiting: AtomicBool::new(false),
        })
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn state(&self) -> WorkerState {
        self.lifecycle.current()
    }

    pub fn namespaces(&self) -> &NamespaceManager {
        &self.namespaces
    }

    /// Whether this worker asked to skip the waiting phase.
    pub fn wants_skip_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Open the static namespace and prime it with the precache list.
    ///
    /// Priming is best effort: each asset that fails is logged and reported,
    /// and installation still completes. Only a storage failure opening the
    /// namespace fails the install, which leaves the worker redundant.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.lifecycle.advance(WorkerState::Installing)?;

        let namespace = match self.namespaces.ensure(Purpose::Static).await {
            Ok(handle) => handle.name,
            Err(e) => {
                self.retire();
                return Err(e);
            }
        };

        let mut cached = Vec::new();
        let mut failed = Vec::new();
        for path in &self.config.precache {
            match self.prime(&namespace, path).await {
                Ok(()) => cached.push(path.clone()),
                Err(e) => {
                    tracing::warn!(version = %self.config.version, "failed to precache {}: {}", path, e);
                    failed.push(path.clone());
                }
            }
        }

        self.lifecycle.advance(WorkerState::Installed)?;
        self.skip_waiting.store(true, Ordering::SeqCst);
        tracing::info!(
            version = %self.config.version,
            cached = cached.len(),
            failed = failed.len(),
            "worker installed"
        );

        Ok(InstallReport { version: self.config.version.clone(), cached, failed, skip_waiting: true })
    }

    async fn prime(&self, namespace: &str, path: &str) -> Result<(), Error> {
        let request = Request::get(self.config.resolve(path)?).with_cache_mode(CacheMode::Reload);
        let response = self.network.fetch(&request).await?;
        if response.status != 200 {
            return Err(Error::Network(format!("{} answered {}", request.url, response.status)));
        }
        let entry = CachedEntry::from_exchange(request.cache_key(&self.config.vary_headers), &request, &response);
        self.namespaces.store().put(namespace, &entry).await
    }

    /// Reclaim stale namespaces, then take control of every open window.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.lifecycle.advance(WorkerState::Activating)?;

        let reclaimed = self.reclaim().await?;
        let claimed = self.platform.claim(&self.config.version).await?;

        self.lifecycle.advance(WorkerState::Activated)?;
        Ok(ActivateReport { version: self.config.version.clone(), reclaimed, claimed })
    }

    /// Delete this app's namespaces that belong to other versions.
    pub async fn reclaim(&self) -> Result<Vec<String>, Error> {
        self.namespaces.reclaim_stale(&self.namespaces.current_names()).await
    }

    /// Mark this worker redundant. No-op if it already is.
    pub fn retire(&self) {
        if !self.lifecycle.retire() {
            tracing::debug!(version = %self.config.version, "worker already redundant");
        }
    }

    pub async fn handle_fetch(&self, request: &Request) -> Result<Response, Error> {
        let route = router::classify(&self.config, request);
        tracing::debug!(?route, "{} {}", request.method, request.url);
        self.engine.handle(route, request).await
    }

    /// Handle a posted message. Returns true when activation was requested.
    ///
    /// CLEAR_CACHE replies on `reply` once every namespace is gone.
    pub async fn handle_message(&self, message: WorkerMessage, reply: Option<oneshot::Sender<WorkerReply>>) -> bool {
        match message {
            WorkerMessage::SkipWaiting => {
                tracing::info!(version = %self.config.version, "skip waiting requested");
                self.skip_waiting.store(true, Ordering::SeqCst);
                true
            }
            WorkerMessage::ClearCache => {
                let success = match self.namespaces.clear_all().await {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::warn!("failed to clear caches: {}", e);
                        false
                    }
                };
                if let Some(reply) = reply
                    && reply.send(WorkerReply { success }).is_err()
                {
                    tracing::debug!("clear cache reply dropped by sender");
                }
                false
            }
        }
    }

    /// Show a notification for a push message.
    pub async fn on_push(&self, data: Option<&[u8]>) -> Result<Notification, Error> {
        let notification = Notification::from_push(PushPayload::parse(data), &self.config.notification);
        self.platform.show_notification(notification.clone()).await?;
        tracing::debug!(tag = %notification.tag, "notification shown");
        Ok(notification)
    }

    /// Route a notification click to an existing or new window.
    pub async fn on_notification_click(
        &self, notification: &Notification, action: Option<&str>,
    ) -> Result<ClickOutcome, Error> {
        self.platform.close_notification(&notification.tag).await?;
        if action == Some(ACTION_CLOSE) {
            return Ok(ClickOutcome::Dismissed);
        }

        let target = self.config.resolve(&notification.data.url)?;
        let existing = self
            .platform
            .windows()
            .await?
            .into_iter()
            .find(|client| client.url == target.as_str());

        match existing {
            Some(client) => {
                self.platform.focus(client.id).await?;
                Ok(ClickOutcome::Focused(client.id))
            }
            None => {
                let client = self.platform.open_window(&target).await?;
                Ok(ClickOutcome::Opened(client.id))
            }
        }
    }

    /// Run a background sync. Returns false for tags this worker does not own.
    pub async fn on_sync(&self, tag: &str) -> Result<bool, Error> {
        if tag != self.config.sync_tag {
            tracing::debug!(tag, "ignoring unknown sync tag");
            return Ok(false);
        }
        self.sync.run(tag).await?;
        Ok(true)
    }

    /// Wait for every detached cache write to finish.
    pub async fn settle(&self) {
        self.pending.settle().await;
    }

    pub fn write_failures(&self) -> u64 {
        self.pending.failures()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::bridge::LogSyncHook;
    use crate::worker::platform::LocalPlatform;
    use crate::worker::testing::{RecordingStore, ScriptedFetcher, url, worker_config};
    use std::sync::atomic::AtomicUsize;
    use wardrobe_sw_core::{CacheDb, Method};

    struct CountingHook(AtomicUsize);

    #[async_trait::async_trait]
    impl SyncHook for CountingHook {
        async fn run(&self, _tag: &str) -> Result<(), Error> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn worker(
        config: WorkerConfig, store: Arc<dyn CacheStore>, network: Arc<ScriptedFetcher>,
        platform: Arc<LocalPlatform>,
    ) -> ServiceWorker {
        ServiceWorker::new(config, store, network, platform, Arc::new(LogSyncHook)).unwrap()
    }

    async fn installed() -> (ServiceWorker, Arc<RecordingStore>, Arc<ScriptedFetcher>, Arc<LocalPlatform>) {
        let config = worker_config();
        let store = RecordingStore::new().await;
        let network = ScriptedFetcher::new();
        network.serve_precache(&config);
        let platform = Arc::new(LocalPlatform::new());
        let sw = worker(config, store.clone(), network.clone(), platform.clone());
        sw.install().await.unwrap();
        sw.activate().await.unwrap();
        (sw, store, network, platform)
    }

    #[tokio::test]
    async fn test_install_primes_every_manifest_path() {
        let config = worker_config();
        let store = RecordingStore::new().await;
        let network = ScriptedFetcher::new();
        network.serve_precache(&config);
        let sw = worker(config.clone(), store.clone(), network.clone(), Arc::new(LocalPlatform::new()));

        let report = sw.install().await.unwrap();

        assert_eq!(report.cached, config.precache);
        assert!(report.failed.is_empty());
        assert!(report.skip_waiting);
        assert_eq!(sw.state(), WorkerState::Installed);

        let keys = store.keys("wardrobe-v1-static").await.unwrap();
        for path in &config.precache {
            assert!(keys.contains(&config.resolve(path).unwrap().to_string()), "missing {path}");
        }
        assert!(network.requests().iter().all(|r| r.cache == CacheMode::Reload));
    }

    #[tokio::test]
    async fn test_install_is_best_effort() {
        let config = worker_config();
        let store = RecordingStore::new().await;
        let network = ScriptedFetcher::new();
        network.serve(&url("/"), "text/html", "shell");
        network.serve(&url("/offline.html"), "text/html", "offline");
        let sw = worker(config.clone(), store.clone(), network, Arc::new(LocalPlatform::new()));

        let report = sw.install().await.unwrap();

        assert_eq!(report.cached, vec!["/".to_string(), "/offline.html".to_string()]);
        assert_eq!(report.failed.len(), config.precache.len() - 2);
        assert_eq!(sw.state(), WorkerState::Installed);
        assert_eq!(store.keys("wardrobe-v1-static").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_install_offline_still_installs() {
        let network = ScriptedFetcher::new();
        network.set_online(false);
        let store = RecordingStore::new().await;
        let sw = worker(worker_config(), store.clone(), network, Arc::new(LocalPlatform::new()));

        let report = sw.install().await.unwrap();
        assert!(report.cached.is_empty());
        assert!(store.has("wardrobe-v1-static").await.unwrap());
    }

    #[tokio::test]
    async fn test_activate_before_install_is_rejected() {
        let sw = worker(
            worker_config(),
            RecordingStore::new().await,
            ScriptedFetcher::new(),
            Arc::new(LocalPlatform::new()),
        );
        assert!(matches!(sw.activate().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_activate_reclaims_stale_and_claims_clients() {
        let db: Arc<dyn CacheStore> = Arc::new(CacheDb::open_in_memory().await.unwrap());
        for name in ["wardrobe-v0-static", "wardrobe-v0-images", "wardrobe-v1-dynamic", "other-app-v0-static"] {
            db.open(name).await.unwrap();
        }
        let config = worker_config();
        let network = ScriptedFetcher::new();
        network.serve_precache(&config);
        let platform = Arc::new(LocalPlatform::new());
        platform.open_client(&url("/"));
        let sw = worker(config, db.clone(), network, platform.clone());

        sw.install().await.unwrap();
        let report = sw.activate().await.unwrap();

        assert_eq!(report.reclaimed, vec!["wardrobe-v0-static".to_string(), "wardrobe-v0-images".to_string()]);
        assert_eq!(report.claimed, 1);
        assert_eq!(sw.state(), WorkerState::Activated);
        assert_eq!(db.list_namespaces().await.unwrap(), vec![
            "wardrobe-v1-dynamic".to_string(),
            "other-app-v0-static".to_string(),
            "wardrobe-v1-static".to_string(),
        ]);
        assert_eq!(platform.clients()[0].controller.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_non_get_never_touches_cache() {
        let (sw, store, network, _) = installed().await;
        let lookups = store.lookups();
        let puts = store.puts();

        for method in [Method::Post, Method::Put, Method::Delete] {
            sw.handle_fetch(&Request::new(method, url("/api/items"))).await.unwrap();
        }
        sw.settle().await;

        assert_eq!(store.lookups(), lookups);
        assert_eq!(store.puts(), puts);
        assert_eq!(network.calls(), worker_config().precache.len() + 3);
    }

    #[tokio::test]
    async fn test_offline_navigation_serves_offline_page() {
        let (sw, _, network, _) = installed().await;
        network.set_online(false);

        let response = sw.handle_fetch(&Request::navigate(url("/closet/new"))).await.unwrap();
        assert_eq!(response.text(), "body of /offline.html");
    }

    #[tokio::test]
    async fn test_offline_navigation_to_precached_shell() {
        let (sw, _, network, _) = installed().await;
        network.set_online(false);

        let response = sw.handle_fetch(&Request::navigate(url("/"))).await.unwrap();
        assert_eq!(response.text(), "body of /");
        assert!(response.from_cache);
    }

    #[tokio::test]
    async fn test_first_image_offline_gets_placeholder() {
        let (sw, _, network, _) = installed().await;
        network.set_online(false);

        let response = sw.handle_fetch(&Request::image(url("/images/jacket.jpg"))).await.unwrap();
        assert_eq!(response.content_type(), Some("image/svg+xml"));
        assert!(response.text().contains("Image Offline"));
    }

    #[tokio::test]
    async fn test_clear_cache_replies_success() {
        let (sw, store, _, _) = installed().await;
        store.open("legacy-cache").await.unwrap();
        let (tx, rx) = oneshot::channel();

        let activate = sw.handle_message(WorkerMessage::ClearCache, Some(tx)).await;

        assert!(!activate);
        assert_eq!(rx.await.unwrap(), WorkerReply { success: true });
        assert!(store.list_namespaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_skip_waiting_requests_activation() {
        let sw = worker(
            worker_config(),
            RecordingStore::new().await,
            ScriptedFetcher::new(),
            Arc::new(LocalPlatform::new()),
        );
        assert!(!sw.wants_skip_waiting());
        assert!(sw.handle_message(WorkerMessage::SkipWaiting, None).await);
        assert!(sw.wants_skip_waiting());
    }

    #[tokio::test]
    async fn test_push_then_click_opens_then_focuses() {
        let (sw, _, _, platform) = installed().await;

        let shown = sw.on_push(Some(br#"{"title":"Outfit ready","url":"/outfits/7"}"#)).await.unwrap();
        assert_eq!(shown.title, "Outfit ready");
        assert_eq!(platform.notifications().len(), 1);

        let outcome = sw.on_notification_click(&shown, None).await.unwrap();
        let ClickOutcome::Opened(id) = outcome else {
            panic!("expected a new window, got {outcome:?}");
        };
        assert!(platform.notifications().is_empty());

        let again = sw.on_push(Some(br#"{"url":"/outfits/7"}"#)).await.unwrap();
        assert_eq!(sw.on_notification_click(&again, Some("open")).await.unwrap(), ClickOutcome::Focused(id));
        assert_eq!(platform.clients().len(), 1);
    }

    #[tokio::test]
    async fn test_click_close_action_dismisses() {
        let (sw, _, _, platform) = installed().await;
        let shown = sw.on_push(None).await.unwrap();

        let outcome = sw.on_notification_click(&shown, Some(ACTION_CLOSE)).await.unwrap();

        assert_eq!(outcome, ClickOutcome::Dismissed);
        assert!(platform.notifications().is_empty());
        assert!(platform.clients().is_empty());
    }

    #[tokio::test]
    async fn test_sync_runs_hook_for_own_tag_only() {
        let config = worker_config();
        let hook = Arc::new(CountingHook(AtomicUsize::new(0)));
        let sw = ServiceWorker::new(
            config.clone(),
            RecordingStore::new().await,
            ScriptedFetcher::new(),
            Arc::new(LocalPlatform::new()),
            hook.clone(),
        )
        .unwrap();

        assert!(sw.on_sync(&config.sync_tag).await.unwrap());
        assert!(!sw.on_sync("someone-else").await.unwrap());
        assert_eq!(hook.0.load(Ordering::SeqCst), 1);
    }
}
