//! Cache storage for versioned namespaces of request/response pairs.
//!
//! This module provides the storage port the worker talks to and its
//! SQLite implementation (async access via tokio-rusqlite). It supports:
//!
//! - Named namespaces created on demand, listed in creation order
//! - Atomic per-entry upserts keyed by a SHA-256 request hash
//! - Automatic schema migrations
//! - Versioned namespace management with stale-version reclaim

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod namespace;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CachedEntry;
pub use namespace::{NamespaceHandle, NamespaceManager, Purpose};
pub use store::CacheStore;
