//! Cache inspection tools.
//!
//! This module provides tools for looking into the SQLite namespace store.

pub mod namespaces;
pub mod purge;

pub use namespaces::namespaces_impl;
pub use purge::{CachePurgeParams, purge_impl};
