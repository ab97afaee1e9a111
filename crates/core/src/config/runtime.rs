//! Configuration handed to the worker and the host controller at construction.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// Worker-wide settings: version token, scope, routing and fallback paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub app_prefix: String,
    pub version: String,
    pub scope: Url,
    /// Lowercased backend host; subdomains match too.
    pub backend_host: String,
    pub api_prefix: String,
    pub offline_page: String,
    pub precache: Vec<String>,
    /// Lowercased request header names folded into cache keys.
    pub vary_headers: Vec<String>,
    pub sync_tag: String,
    pub notification: NotificationDefaults,
}

/// Defaults used when a push message carries no (or a malformed) payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDefaults {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub tag: String,
    pub url: String,
}

impl WorkerConfig {
    /// Resolve a scope-relative path (or absolute URL) against the scope.
    pub fn resolve(&self, path: &str) -> Result<Url, Error> {
        let mut url = self
            .scope
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))?;
        url.set_fragment(None);
        Ok(url)
    }

    pub fn offline_url(&self) -> Result<Url, Error> {
        self.resolve(&self.offline_page)
    }

    /// Same settings under another version token.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self { version: version.into(), ..self.clone() }
    }
}

/// Host-side controller settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub script_url: String,
    pub scope: String,
    pub update_interval: Duration,
    pub sync_tag: String,
}
