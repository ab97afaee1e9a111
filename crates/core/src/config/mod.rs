//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (WARDROBE_SW_*)
//! 2. TOML config file (if WARDROBE_SW_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The worker and the host controller never read `AppConfig` directly; they
//! receive a [`WorkerConfig`] / [`HostConfig`] at construction.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod runtime;
mod validation;

pub use runtime::{HostConfig, NotificationDefaults, WorkerConfig};
pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (WARDROBE_SW_*)
/// 2. TOML config file (if WARDROBE_SW_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database backing the cache namespaces.
    ///
    /// Set via WARDROBE_SW_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Prefix shared by every namespace this application owns.
    #[serde(default = "default_app_prefix")]
    pub app_prefix: String,

    /// Global cache version token. Bumping it invalidates every namespace.
    ///
    /// Set via WARDROBE_SW_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin and root scope the worker controls.
    #[serde(default = "default_scope_url")]
    pub scope_url: String,

    /// Path of the worker script, registered at the root scope.
    #[serde(default = "default_script_path")]
    pub script_path: String,

    /// Hosted backend; requests to it (or any subdomain) are never cached.
    #[serde(default = "default_backend_host")]
    pub backend_host: String,

    /// Path prefix of same-origin API routes (network-first).
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Document served when a navigation fails with nothing cached.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Critical assets primed into the static namespace on install.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Request header names that take part in cache keys.
    #[serde(default)]
    pub vary_headers: Vec<String>,

    /// Background sync tag for wardrobe data.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,

    /// Interval between host-side update checks in milliseconds.
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to read per response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Network request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Fallback notification title when a push carries none.
    #[serde(default = "default_notification_title")]
    pub notification_title: String,

    /// Fallback notification body when a push carries none.
    #[serde(default = "default_notification_body")]
    pub notification_body: String,

    #[serde(default = "default_notification_icon")]
    pub notification_icon: String,

    #[serde(default = "default_notification_badge")]
    pub notification_badge: String,

    /// Vibration pattern in milliseconds.
    #[serde(default = "default_vibrate")]
    pub notification_vibrate: Vec<u32>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./wardrobe-sw-cache.sqlite")
}

fn default_app_prefix() -> String {
    "wardrobe".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_scope_url() -> String {
    "http://localhost:5173/".into()
}

fn default_script_path() -> String {
    "/sw.js".into()
}

fn default_backend_host() -> String {
    "supabase.co".into()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_offline_page() -> String {
    "/offline.html".into()
}

fn default_precache() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/offline.html",
        "/manifest.json",
        "/icons/icon-192x192.png",
        "/icons/icon-512x512.png",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_sync_tag() -> String {
    "wardrobe-sync".into()
}

fn default_update_interval_ms() -> u64 {
    60 * 60 * 1000
}

fn default_user_agent() -> String {
    "wardrobe-sw/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_notification_title() -> String {
    "Wardrobe".into()
}

fn default_notification_body() -> String {
    "You have a new update in your wardrobe".into()
}

fn default_notification_icon() -> String {
    "/icons/icon-192x192.png".into()
}

fn default_notification_badge() -> String {
    "/icons/icon-72x72.png".into()
}

fn default_vibrate() -> Vec<u32> {
    vec![100, 50, 100]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            app_prefix: default_app_prefix(),
            cache_version: default_cache_version(),
            scope_url: default_scope_url(),
            script_path: default_script_path(),
            backend_host: default_backend_host(),
            api_prefix: default_api_prefix(),
            offline_page: default_offline_page(),
            precache: default_precache(),
            vary_headers: Vec::new(),
            sync_tag: default_sync_tag(),
            update_interval_ms: default_update_interval_ms(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            notification_title: default_notification_title(),
            notification_body: default_notification_body(),
            notification_icon: default_notification_icon(),
            notification_badge: default_notification_badge(),
            notification_vibrate: default_vibrate(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `WARDROBE_SW_`
    /// 2. TOML file from `WARDROBE_SW_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("WARDROBE_SW_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("WARDROBE_SW_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Build the configuration injected into the worker.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `scope_url` does not parse.
    pub fn worker_config(&self) -> Result<WorkerConfig, ConfigError> {
        let scope = url::Url::parse(&self.scope_url)
            .map_err(|e| ConfigError::Invalid { field: "scope_url".into(), reason: e.to_string() })?;

        Ok(WorkerConfig {
            app_prefix: self.app_prefix.clone(),
            version: self.cache_version.clone(),
            scope,
            backend_host: self.backend_host.to_lowercase(),
            api_prefix: self.api_prefix.clone(),
            offline_page: self.offline_page.clone(),
            precache: self.precache.clone(),
            vary_headers: self.vary_headers.iter().map(|h| h.to_ascii_lowercase()).collect(),
            sync_tag: self.sync_tag.clone(),
            notification: NotificationDefaults {
                title: self.notification_title.clone(),
                body: self.notification_body.clone(),
                icon: self.notification_icon.clone(),
                badge: self.notification_badge.clone(),
                vibrate: self.notification_vibrate.clone(),
                tag: format!("{}-notification", self.app_prefix),
                url: "/".into(),
            },
        })
    }

    /// Build the configuration injected into the host controller.
    pub fn host_config(&self) -> HostConfig {
        HostConfig {
            script_url: self.script_path.clone(),
            scope: "/".into(),
            update_interval: Duration::from_millis(self.update_interval_ms),
            sync_tag: self.sync_tag.clone(),
        }
    }
}
