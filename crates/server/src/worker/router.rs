//! Request classification.
//!
//! Rules are evaluated in order and the first match wins:
//! 1. non-GET → passthrough
//! 2. backend host (or a subdomain) → backend bypass
//! 3. image destination → image cache-first
//! 4. navigation or API path → network-first
//! 5. anything else → static cache-first

use serde::Serialize;
use wardrobe_sw_core::{Destination, Method, Request, WorkerConfig};

/// Where an intercepted request is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Not intercepted at all.
    Passthrough,
    /// Straight to the network, never cached.
    Backend,
    Image,
    NetworkFirst,
    Static,
}

pub fn classify(config: &WorkerConfig, request: &Request) -> Route {
    if request.method != Method::Get {
        return Route::Passthrough;
    }
    if is_backend(config, request) {
        return Route::Backend;
    }
    if request.destination == Destination::Image {
        return Route::Image;
    }
    if request.is_navigation() || request.url.path().starts_with(&config.api_prefix) {
        return Route::NetworkFirst;
    }
    Route::Static
}

fn is_backend(config: &WorkerConfig, request: &Request) -> bool {
    let Some(host) = request.url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    host == config.backend_host || host.ends_with(&format!(".{}", config.backend_host))
}
