//! lfsgate library: a Git LFS media server front for S3.
//!
//! This crate provides the components for running a large-file transfer
//! server that never touches object bytes: it synchronizes object metadata
//! with an authoritative API and hands clients signed S3 links for the
//! transfer itself.

use std::sync::Arc;

pub mod config;
pub mod errors;
pub mod handlers;
pub mod metadata;
pub mod metrics;
pub mod server;
pub mod signer;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

use crate::config::Config;
use crate::metadata::store::MetaStore;
use crate::storage::backend::ContentStore;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Authoritative metadata API.
    pub meta: Arc<dyn MetaStore>,
    /// Object content store.
    pub content: Arc<dyn ContentStore>,
}
