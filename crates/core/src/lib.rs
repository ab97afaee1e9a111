//! Core types and shared functionality for wardrobe-sw.
//!
//! This crate provides:
//! - Request/response model and the host → worker message protocol
//! - Cache storage port with a SQLite backend and versioned namespaces
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod protocol;

pub use cache::{CacheDb, CacheStore, CachedEntry, NamespaceHandle, NamespaceManager, Purpose};
pub use config::{AppConfig, ConfigError, HostConfig, NotificationDefaults, WorkerConfig};
pub use error::Error;
pub use http::{CacheMode, Destination, Method, Request, RequestMode, Response, ResponseType};
pub use protocol::{WorkerMessage, WorkerReply};
