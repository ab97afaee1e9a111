//! Push notifications and background sync.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wardrobe_sw_core::{Error, NotificationDefaults};

pub const ACTION_OPEN: &str = "open";
pub const ACTION_CLOSE: &str = "close";

/// Optional JSON body of a push message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub tag: Option<String>,
}

impl PushPayload {
    /// Parse push data; absent or malformed data yields an empty payload.
    pub fn parse(data: Option<&[u8]>) -> Self {
        let Some(data) = data.filter(|d| !d.is_empty()) else {
            return Self::default();
        };
        serde_json::from_slice(data).unwrap_or_else(|e| {
            tracing::debug!("malformed push payload, using defaults: {}", e);
            Self::default()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NotificationData {
    /// Where a click should take the user.
    pub url: String,
}

/// A notification as displayed by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub tag: String,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    pub fn from_push(payload: PushPayload, defaults: &NotificationDefaults) -> Self {
        Self {
            title: payload.title.unwrap_or_else(|| defaults.title.clone()),
            body: payload.body.unwrap_or_else(|| defaults.body.clone()),
            icon: defaults.icon.clone(),
            badge: defaults.badge.clone(),
            vibrate: defaults.vibrate.clone(),
            tag: payload.tag.unwrap_or_else(|| defaults.tag.clone()),
            data: NotificationData { url: payload.url.unwrap_or_else(|| defaults.url.clone()) },
            actions: vec![
                NotificationAction { action: ACTION_OPEN.into(), title: "Open".into() },
                NotificationAction { action: ACTION_CLOSE.into(), title: "Close".into() },
            ],
        }
    }
}

/// What a notification click ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(tag = "outcome", content = "client", rename_all = "lowercase")]
pub enum ClickOutcome {
    Dismissed,
    /// An existing window already showed the target and was focused.
    Focused(u64),
    Opened(u64),
}

/// Work run when the platform fires a background sync.
#[async_trait]
pub trait SyncHook: Send + Sync {
    async fn run(&self, tag: &str) -> Result<(), Error>;
}

/// Sync hook for an application with no local mutation queue.
pub struct LogSyncHook;

#[async_trait]
impl SyncHook for LogSyncHook {
    async fn run(&self, tag: &str) -> Result<(), Error> {
        tracing::info!(tag, "background sync fired, no queued mutations");
        Ok(())
    }
}
