//! The host page's view of the worker.
//!
//! Operations never fail outward: each one reports what happened as a
//! [`Notice`] and degrades to a no-op on failure.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use super::{HostEvent, HostPlatform, InstallOutcome, Permission};
use wardrobe_sw_core::{HostConfig, WorkerMessage};

/// Observable state of the hosting application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PwaState {
    pub registered: bool,
    /// A deferred install prompt is waiting to be shown.
    pub install_available: bool,
    pub installed: bool,
    pub online: bool,
    /// A new worker version is ready; reload is left to the user.
    pub update_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// User-facing status message (a toast).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Registers and supervises the worker from the hosting page.
pub struct PwaController {
    platform: Arc<dyn HostPlatform>,
    config: HostConfig,
    state: Arc<watch::Sender<PwaState>>,
    notices: mpsc::UnboundedSender<Notice>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PwaController {
    /// Create a controller and the receiving end of its notices.
    pub fn new(platform: Arc<dyn HostPlatform>, config: HostConfig) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (notices, notice_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(PwaState::default());
        (
            Self { platform, config, state: Arc::new(state), notices, tasks: Mutex::new(Vec::new()) },
            notice_rx,
        )
    }

    /// Wire up platform events, register the worker and start update polling.
    pub async fn mount(&self) {
        let installed = self.platform.is_standalone();
        let online = self.platform.is_online();
        self.state.send_modify(|s| {
            s.installed = installed;
            s.online = online;
        });

        let events = self.platform.subscribe();
        self.spawn(watch_events(events, self.state.clone(), self.notices.clone()));

        match self.platform.register(&self.config.script_url, &self.config.scope).await {
            Ok(()) => {
                tracing::info!(script = %self.config.script_url, scope = %self.config.scope, "worker registered");
                self.state.send_modify(|s| s.registered = true);
                self.spawn(poll_updates(self.platform.clone(), self.config.update_interval));
            }
            Err(e) => {
                tracing::warn!("worker registration failed: {}", e);
                self.notify(NoticeLevel::Error, "Offline support is unavailable");
            }
        }
    }

    /// Stop polling and event handling.
    pub fn unmount(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for task in tasks.drain(..) {
            task.abort();
        }
    }

    pub fn state(&self) -> PwaState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PwaState> {
        self.state.subscribe()
    }

    /// Show the deferred install prompt, if one is available.
    pub async fn install(&self) -> Option<InstallOutcome> {
        if !self.state.borrow().install_available {
            tracing::debug!("install requested without a deferred prompt");
            return None;
        }

        match self.platform.prompt_install().await {
            Ok(outcome) => {
                self.state.send_modify(|s| {
                    s.install_available = false;
                    s.installed |= outcome == InstallOutcome::Accepted;
                });
                match outcome {
                    InstallOutcome::Accepted => self.notify(NoticeLevel::Success, "App installed"),
                    InstallOutcome::Dismissed => self.notify(NoticeLevel::Info, "Installation dismissed"),
                }
                Some(outcome)
            }
            Err(e) => {
                tracing::warn!("install prompt failed: {}", e);
                self.notify(NoticeLevel::Error, "Could not install the app");
                None
            }
        }
    }

    /// Re-check for a new worker and reload the page.
    pub async fn update(&self) -> bool {
        match self.platform.check_for_update().await {
            Ok(()) => {
                self.state.send_modify(|s| s.update_available = false);
                self.platform.reload();
                true
            }
            Err(e) => {
                tracing::warn!("update check failed: {}", e);
                self.notify(NoticeLevel::Error, "Could not update the app");
                false
            }
        }
    }

    /// Ask for notification permission unless the user already decided.
    pub async fn request_notification_permission(&self) -> Permission {
        let current = self.platform.notification_permission();
        if current != Permission::Default {
            return current;
        }

        match self.platform.request_notification_permission().await {
            Ok(Permission::Granted) => {
                self.notify(NoticeLevel::Success, "Notifications enabled");
                Permission::Granted
            }
            Ok(other) => {
                self.notify(NoticeLevel::Info, "Notifications are turned off");
                other
            }
            Err(e) => {
                tracing::warn!("notification permission request failed: {}", e);
                self.notify(NoticeLevel::Error, "Notifications are not supported");
                Permission::Default
            }
        }
    }

    /// Ask the worker to wipe every cache namespace and wait for its reply.
    pub async fn clear_cache(&self) -> bool {
        match self.platform.post_message(WorkerMessage::ClearCache).await {
            Ok(reply) if reply.success => {
                self.notify(NoticeLevel::Success, "Cache cleared");
                true
            }
            Ok(_) => {
                self.notify(NoticeLevel::Error, "Failed to clear cache");
                false
            }
            Err(e) => {
                tracing::warn!("clear cache message failed: {}", e);
                self.notify(NoticeLevel::Error, "Failed to clear cache");
                false
            }
        }
    }

    /// Register a background sync tag (default: the wardrobe sync tag).
    ///
    /// Returns false, without raising, when the platform has no background sync.
    pub async fn register_background_sync(&self, tag: Option<&str>) -> bool {
        let tag = tag.unwrap_or(&self.config.sync_tag);
        if !self.platform.supports_background_sync() {
            tracing::debug!(tag, "background sync not supported");
            return false;
        }

        match self.platform.register_sync(tag).await {
            Ok(()) => {
                tracing::debug!(tag, "background sync registered");
                true
            }
            Err(e) => {
                tracing::warn!(tag, "background sync registration failed: {}", e);
                false
            }
        }
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        let _ = self.notices.send(Notice { level, message: message.to_string() });
    }

    fn spawn(&self, task: impl Future<Output = ()> + Send + 'static) {
        let handle = tokio::spawn(task);
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).push(handle);
    }
}

impl Drop for PwaController {
    fn drop(&mut self) {
        self.unmount();
    }
}

async fn watch_events(
    mut events: broadcast::Receiver<HostEvent>, state: Arc<watch::Sender<PwaState>>,
    notices: mpsc::UnboundedSender<Notice>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "host event stream lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        tracing::debug!(?event, "host event");
        let notice = match event {
            HostEvent::InstallPromptAvailable => {
                state.send_modify(|s| s.install_available = true);
                None
            }
            HostEvent::AppInstalled => {
                state.send_modify(|s| {
                    s.installed = true;
                    s.install_available = false;
                });
                None
            }
            HostEvent::Online => {
                state.send_modify(|s| s.online = true);
                Some((NoticeLevel::Info, "Back online"))
            }
            HostEvent::Offline => {
                state.send_modify(|s| s.online = false);
                Some((NoticeLevel::Info, "You are offline; cached content is still available"))
            }
            HostEvent::UpdateFound => {
                state.send_modify(|s| s.update_available = true);
                Some((NoticeLevel::Info, "A new version is available"))
            }
        };

        if let Some((level, message)) = notice {
            let _ = notices.send(Notice { level, message: message.to_string() });
        }
    }
}

async fn poll_updates(platform: Arc<dyn HostPlatform>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // the first tick completes immediately; registration just happened
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = platform.check_for_update().await {
            tracing::warn!("periodic update check failed: {}", e);
        }
    }
}
