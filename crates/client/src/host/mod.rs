//! Host-side supervision of the worker.
//!
//! The hosting page registers the worker, listens for install, update and
//! connectivity signals, and exposes a handful of user-triggered
//! operations. Everything platform-specific sits behind [`HostPlatform`].

mod controller;

pub use controller::{Notice, NoticeLevel, PwaController, PwaState};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use wardrobe_sw_core::{Error, WorkerMessage, WorkerReply};

/// Result of showing the deferred install prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallOutcome {
    Accepted,
    Dismissed,
}

/// Notification permission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    Default,
    Granted,
    Denied,
}

/// Signals the platform raises towards the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// A deferred install prompt became available.
    InstallPromptAvailable,
    AppInstalled,
    Online,
    Offline,
    /// A new worker version was found and is installing.
    UpdateFound,
}

/// Platform services the host page relies on.
#[async_trait]
pub trait HostPlatform: Send + Sync {
    /// Register the worker script at `scope`.
    async fn register(&self, script_url: &str, scope: &str) -> Result<(), Error>;

    /// Ask the registration to look for a newer worker.
    async fn check_for_update(&self) -> Result<(), Error>;

    /// Post a message to the controlling worker and await its reply.
    async fn post_message(&self, message: WorkerMessage) -> Result<WorkerReply, Error>;

    fn supports_background_sync(&self) -> bool;

    async fn register_sync(&self, tag: &str) -> Result<(), Error>;

    fn notification_permission(&self) -> Permission;

    async fn request_notification_permission(&self) -> Result<Permission, Error>;

    /// Show the deferred install prompt.
    async fn prompt_install(&self) -> Result<InstallOutcome, Error>;

    /// Whether the page runs in standalone display mode (installed app).
    fn is_standalone(&self) -> bool;

    fn is_online(&self) -> bool;

    fn subscribe(&self) -> broadcast::Receiver<HostEvent>;

    /// Reload the page.
    fn reload(&self);
}
