//! In-process registration runtime.
//!
//! Holds the installing / waiting / active worker slots for the scope,
//! runs lifecycle jobs one at a time, routes fetches to the active worker,
//! and plays the hosting platform for [`PwaController`](wardrobe_sw_client::PwaController).

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{broadcast, oneshot};
use wardrobe_sw_client::{ConnectivityGate, Fetcher, HostEvent, HostPlatform, InstallOutcome, Permission};
use wardrobe_sw_core::{CacheStore, Error, Request, Response, WorkerConfig, WorkerMessage, WorkerReply};

use crate::worker::bridge::{ClickOutcome, Notification, SyncHook};
use crate::worker::lifecycle::WorkerState;
use crate::worker::platform::{LocalPlatform, WindowClient, WorkerPlatform};
use crate::worker::{ActivateReport, InstallReport, ServiceWorker};

#[derive(Default)]
struct Slots {
    registered: bool,
    installing: Option<Arc<ServiceWorker>>,
    waiting: Option<Arc<ServiceWorker>>,
    active: Option<Arc<ServiceWorker>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct WorkerInfo {
    pub version: String,
    pub state: WorkerState,
    /// Detached cache writes that failed.
    pub write_failures: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeStatus {
    pub registered: bool,
    pub online: bool,
    pub deployed: String,
    pub installing: Option<WorkerInfo>,
    pub waiting: Option<WorkerInfo>,
    pub active: Option<WorkerInfo>,
    pub pending_sync: Vec<String>,
    pub notification_permission: Permission,
    pub clients: Vec<WindowClient>,
    /// Notifications currently displayed.
    pub notifications: Vec<Notification>,
}

/// Result of one update job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct UpdateReport {
    pub install: Option<InstallReport>,
    pub activate: Option<ActivateReport>,
}

pub struct Runtime {
    config: WorkerConfig,
    store: Arc<dyn CacheStore>,
    network: Arc<ConnectivityGate>,
    platform: Arc<LocalPlatform>,
    sync_hook: Arc<dyn SyncHook>,
    slots: Mutex<Slots>,
    jobs: tokio::sync::Mutex<()>,
    deployed: Mutex<String>,
    events: broadcast::Sender<HostEvent>,
    sync_queue: Mutex<BTreeSet<String>>,
    permission: Mutex<Permission>,
}

impl Runtime {
    pub fn new(
        config: WorkerConfig, store: Arc<dyn CacheStore>, network: Arc<ConnectivityGate>, platform: Arc<LocalPlatform>,
        sync_hook: Arc<dyn SyncHook>,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            deployed: Mutex::new(config.version.clone()),
            config,
            store,
            network,
            platform,
            sync_hook,
            slots: Mutex::default(),
            jobs: tokio::sync::Mutex::new(()),
            events,
            sync_queue: Mutex::default(),
            permission: Mutex::new(Permission::Default),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn active(&self) -> Option<Arc<ServiceWorker>> {
        self.slots().active.clone()
    }

    fn require_active(&self) -> Result<Arc<ServiceWorker>, Error> {
        self.active()
            .ok_or_else(|| Error::InvalidState("no active worker".into()))
    }

    pub fn status(&self) -> RuntimeStatus {
        let info = |w: &Option<Arc<ServiceWorker>>| {
            w.as_ref()
                .map(|w| WorkerInfo {
                    version: w.version().to_string(),
                    state: w.state(),
                    write_failures: w.write_failures(),
                })
        };
        let slots = self.slots();
        RuntimeStatus {
            registered: slots.registered,
            online: self.network.is_online(),
            deployed: self.deployed.lock().unwrap_or_else(|e| e.into_inner()).clone(),
            installing: info(&slots.installing),
            waiting: info(&slots.waiting),
            active: info(&slots.active),
            pending_sync: self.sync_queue.lock().unwrap_or_else(|e| e.into_inner()).iter().cloned().collect(),
            notification_permission: *self.permission.lock().unwrap_or_else(|e| e.into_inner()),
            clients: self.platform.clients(),
            notifications: self.platform.notifications(),
        }
    }

    /// Publish a new worker version; installs it right away once registered.
    pub async fn deploy(&self, version: &str) -> Result<UpdateReport, Error> {
        if version.is_empty() || version.contains('-') {
            return Err(Error::InvalidInput(format!("invalid version token: {version:?}")));
        }
        *self.deployed.lock().unwrap_or_else(|e| e.into_inner()) = version.to_string();
        tracing::info!(version, "worker version deployed");

        if !self.slots().registered {
            return Ok(UpdateReport { install: None, activate: None });
        }
        self.update_job().await
    }

    /// Install the deployed version unless it is already installed or active.
    async fn update_job(&self) -> Result<UpdateReport, Error> {
        let _job = self.jobs.lock().await;
        let deployed = self.deployed.lock().unwrap_or_else(|e| e.into_inner()).clone();

        let known = {
            let slots = self.slots();
            [&slots.installing, &slots.waiting, &slots.active]
                .into_iter()
                .flatten()
                .any(|w| w.version() == deployed)
        };
        if known {
            tracing::debug!(version = %deployed, "no update available");
            return Ok(UpdateReport { install: None, activate: None });
        }

        self.install_version(&deployed).await
    }

    async fn install_version(&self, version: &str) -> Result<UpdateReport, Error> {
        let worker = Arc::new(ServiceWorker::new(
            self.config.with_version(version),
            self.store.clone(),
            self.network.clone(),
            self.platform.clone(),
            self.sync_hook.clone(),
        )?);

        let is_update = {
            let mut slots = self.slots();
            if let Some(previous) = slots.installing.replace(worker.clone()) {
                previous.retire();
            }
            slots.active.is_some()
        };
        if is_update {
            let _ = self.events.send(HostEvent::UpdateFound);
        }

        let report = match worker.install().await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(version, "worker install failed: {}", e);
                self.slots().installing = None;
                return Err(e);
            }
        };

        {
            let mut slots = self.slots();
            slots.installing = None;
            if let Some(previous) = slots.waiting.replace(worker.clone()) {
                previous.retire();
            }
        }

        let activate = if worker.wants_skip_waiting() { self.activate_waiting().await? } else { None };
        Ok(UpdateReport { install: Some(report), activate })
    }

    /// Promote the waiting worker to active, retiring the previous one.
    ///
    /// The previous worker keeps controlling the scope until the new one has
    /// finished activating; if activation fails it stays in control.
    async fn activate_waiting(&self) -> Result<Option<ActivateReport>, Error> {
        let Some(worker) = self.slots().waiting.clone() else {
            return Ok(None);
        };

        let mut report = match worker.activate().await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(version = %worker.version(), "worker activation failed: {}", e);
                self.slots().waiting = None;
                worker.retire();
                return Err(e);
            }
        };

        let previous = {
            let mut slots = self.slots();
            slots.waiting = None;
            slots.active.replace(worker.clone())
        };

        if let Some(previous) = previous {
            previous.settle().await;
            previous.retire();
            // writes the previous worker finished during activation may have
            // recreated a stale namespace
            match worker.reclaim().await {
                Ok(late) => {
                    for name in late {
                        if !report.reclaimed.contains(&name) {
                            report.reclaimed.push(name);
                        }
                    }
                }
                Err(e) => tracing::warn!(version = %worker.version(), "late reclaim failed: {}", e),
            }
        }

        Ok(Some(report))
    }

    /// Dispatch a request from a controlled page.
    ///
    /// Without an active worker nothing is intercepted.
    pub async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        match self.active() {
            Some(worker) => worker.handle_fetch(request).await,
            None => self.network.fetch(request).await,
        }
    }

    /// Wait for the active worker's detached cache writes.
    pub async fn settle(&self) {
        if let Some(worker) = self.active() {
            worker.settle().await;
        }
    }

    /// Post a message to the worker and wait for its acknowledgment.
    ///
    /// SKIP_WAITING goes to the waiting worker when there is one, as the
    /// host page addresses `registration.waiting`.
    pub async fn post_message(&self, message: WorkerMessage) -> Result<WorkerReply, Error> {
        let _job = self.jobs.lock().await;
        let target = {
            let slots = self.slots();
            match message {
                WorkerMessage::SkipWaiting => slots.waiting.clone().or_else(|| slots.active.clone()),
                WorkerMessage::ClearCache => slots.active.clone().or_else(|| slots.waiting.clone()),
            }
        };
        let worker = target.ok_or_else(|| Error::InvalidState("no worker to receive the message".into()))?;

        let (tx, rx) = oneshot::channel();
        let activate = worker.handle_message(message, Some(tx)).await;
        if activate && worker.state() == WorkerState::Installed {
            self.activate_waiting().await?;
        }

        // SKIP_WAITING carries no acknowledgment; delivery is the success
        Ok(rx.await.unwrap_or(WorkerReply { success: true }))
    }

    pub async fn push(&self, data: Option<&[u8]>) -> Result<Notification, Error> {
        self.require_active()?.on_push(data).await
    }

    /// Click the displayed notification with `tag`.
    pub async fn notification_click(&self, tag: &str, action: Option<&str>) -> Result<ClickOutcome, Error> {
        let worker = self.require_active()?;
        let notification = self
            .platform
            .notification(tag)
            .await?
            .ok_or_else(|| Error::InvalidInput(format!("no notification with tag {tag:?}")))?;
        worker.on_notification_click(&notification, action).await
    }

    /// Fire a sync event for `tag` on the active worker.
    pub async fn sync(&self, tag: &str) -> Result<bool, Error> {
        self.require_active()?.on_sync(tag).await
    }

    /// Flip simulated connectivity and tell the host page.
    ///
    /// Coming back online runs every queued sync tag once.
    pub async fn set_online(&self, online: bool) -> Result<Vec<String>, Error> {
        if self.network.set_online(online) {
            let _ = self
                .events
                .send(if online { HostEvent::Online } else { HostEvent::Offline });
        }
        if online { self.flush_sync().await } else { Ok(Vec::new()) }
    }

    /// Run queued sync tags. Failed tags stay queued for the next attempt.
    async fn flush_sync(&self) -> Result<Vec<String>, Error> {
        let Some(worker) = self.active() else {
            return Ok(Vec::new());
        };
        let tags = std::mem::take(&mut *self.sync_queue.lock().unwrap_or_else(|e| e.into_inner()));

        let mut ran = Vec::new();
        for tag in tags {
            match worker.on_sync(&tag).await {
                Ok(_) => ran.push(tag),
                Err(e) => {
                    tracing::warn!(tag = %tag, "background sync failed, keeping it queued: {}", e);
                    self.sync_queue.lock().unwrap_or_else(|e| e.into_inner()).insert(tag);
                }
            }
        }
        Ok(ran)
    }
}

#[async_trait]
impl HostPlatform for Runtime {
    async fn register(&self, script_url: &str, scope: &str) -> Result<(), Error> {
        self.config.resolve(scope)?;
        self.slots().registered = true;
        tracing::info!(script = script_url, scope, "registration created");
        self.update_job().await.map(|_| ())
    }

    async fn check_for_update(&self) -> Result<(), Error> {
        if !self.slots().registered {
            return Err(Error::InvalidState("worker is not registered".into()));
        }
        self.update_job().await.map(|_| ())
    }

    async fn post_message(&self, message: WorkerMessage) -> Result<WorkerReply, Error> {
        Runtime::post_message(self, message).await
    }

    fn supports_background_sync(&self) -> bool {
        true
    }

    async fn register_sync(&self, tag: &str) -> Result<(), Error> {
        if !self.slots().registered {
            return Err(Error::InvalidState("worker is not registered".into()));
        }
        self.sync_queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(tag.to_string());
        if self.network.is_online() {
            self.flush_sync().await?;
        }
        Ok(())
    }

    fn notification_permission(&self) -> Permission {
        *self.permission.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn request_notification_permission(&self) -> Result<Permission, Error> {
        let mut permission = self.permission.lock().unwrap_or_else(|e| e.into_inner());
        if *permission == Permission::Default {
            *permission = Permission::Granted;
        }
        Ok(*permission)
    }

    async fn prompt_install(&self) -> Result<InstallOutcome, Error> {
        Err(Error::Unsupported("no deferred install prompt".into()))
    }

    fn is_standalone(&self) -> bool {
        false
    }

    fn is_online(&self) -> bool {
        self.network.is_online()
    }

    fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }

    fn reload(&self) {
        tracing::info!("host page reload requested");
    }
}
