//! Services the platform offers to a running worker.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;
use wardrobe_sw_core::Error;

use super::bridge::Notification;

/// An open application window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct WindowClient {
    pub id: u64,
    pub url: String,
    pub focused: bool,
    /// Version of the worker controlling this window, if any.
    pub controller: Option<String>,
}

#[async_trait]
pub trait WorkerPlatform: Send + Sync {
    /// Take control of every open window. Returns how many were claimed.
    async fn claim(&self, version: &str) -> Result<usize, Error>;

    async fn windows(&self) -> Result<Vec<WindowClient>, Error>;

    async fn focus(&self, id: u64) -> Result<(), Error>;

    async fn open_window(&self, url: &Url) -> Result<WindowClient, Error>;

    async fn show_notification(&self, notification: Notification) -> Result<(), Error>;

    /// The displayed notification with `tag`, if any.
    async fn notification(&self, tag: &str) -> Result<Option<Notification>, Error>;

    async fn close_notification(&self, tag: &str) -> Result<(), Error>;
}

#[derive(Default)]
struct LocalState {
    next_id: u64,
    windows: BTreeMap<u64, WindowClient>,
    notifications: BTreeMap<String, Notification>,
}

/// In-process platform: windows and notifications kept in memory.
#[derive(Default)]
pub struct LocalPlatform {
    state: Mutex<LocalState>,
}

impl LocalPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open an uncontrolled window, the way a user loading a page would.
    pub fn open_client(&self, url: &Url) -> WindowClient {
        let mut state = self.lock();
        state.next_id += 1;
        let client = WindowClient { id: state.next_id, url: url.to_string(), focused: false, controller: None };
        state.windows.insert(client.id, client.clone());
        client
    }

    pub fn clients(&self) -> Vec<WindowClient> {
        self.lock().windows.values().cloned().collect()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().notifications.values().cloned().collect()
    }
}

#[async_trait]
impl WorkerPlatform for LocalPlatform {
    async fn claim(&self, version: &str) -> Result<usize, Error> {
        let mut state = self.lock();
        for client in state.windows.values_mut() {
            client.controller = Some(version.to_string());
        }
        Ok(state.windows.len())
    }

    async fn windows(&self) -> Result<Vec<WindowClient>, Error> {
        Ok(self.clients())
    }

    async fn focus(&self, id: u64) -> Result<(), Error> {
        let mut state = self.lock();
        if !state.windows.contains_key(&id) {
            return Err(Error::InvalidState(format!("no window client {id}")));
        }
        for client in state.windows.values_mut() {
            client.focused = client.id == id;
        }
        Ok(())
    }

    async fn open_window(&self, url: &Url) -> Result<WindowClient, Error> {
        let opened = self.open_client(url);
        self.focus(opened.id).await?;
        Ok(WindowClient { focused: true, ..opened })
    }

    async fn show_notification(&self, notification: Notification) -> Result<(), Error> {
        // same tag replaces the earlier notification
        self.lock().notifications.insert(notification.tag.clone(), notification);
        Ok(())
    }

    async fn notification(&self, tag: &str) -> Result<Option<Notification>, Error> {
        Ok(self.lock().notifications.get(tag).cloned())
    }

    async fn close_notification(&self, tag: &str) -> Result<(), Error> {
        self.lock().notifications.remove(tag);
        Ok(())
    }
}
