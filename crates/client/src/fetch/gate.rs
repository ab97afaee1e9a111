//! Connectivity gate in front of a network port.
//!
//! While the gate is offline every fetch is rejected the way a
//! disconnected platform rejects it, without touching the inner fetcher.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use super::Fetcher;
use wardrobe_sw_core::{Error, Request, Response};

/// Wraps a fetcher with an online/offline switch.
pub struct ConnectivityGate {
    inner: Arc<dyn Fetcher>,
    online: watch::Sender<bool>,
}

impl ConnectivityGate {
    pub fn new(inner: Arc<dyn Fetcher>) -> Self {
        let (online, _) = watch::channel(true);
        Self { inner, online }
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Flip connectivity. Returns true if the state changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.online.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
        if changed {
            tracing::info!(online, "network connectivity changed");
        }
        changed
    }

    /// Watch connectivity transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }
}

#[async_trait]
impl Fetcher for ConnectivityGate {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        if !self.is_online() {
            return Err(Error::Network(format!("offline: {}", request.url)));
        }
        self.inner.fetch(request).await
    }
}
