//! Client-side plumbing for wardrobe-sw.
//!
//! This crate provides the worker's network port (an HTTP fetcher plus a
//! connectivity gate) and the host-side controller that registers and
//! supervises the worker.

pub mod fetch;
pub mod host;

pub use fetch::{ConnectivityGate, FetchConfig, Fetcher, HttpFetcher, UrlError, canonicalize, same_origin};
pub use host::{
    HostEvent, HostPlatform, InstallOutcome, Notice, NoticeLevel, Permission, PwaController, PwaState,
};
