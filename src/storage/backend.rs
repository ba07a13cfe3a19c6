//! Abstract content store trait.
//!
//! Every object store integration must implement [`ContentStore`].  The
//! server never moves object bytes itself: it hands clients redirects and
//! signed upload links, and probes for existence.

use axum::response::Response;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use crate::metadata::store::Meta;

/// A transfer descriptor returned to the client.
///
/// The client must send every entry of `header` verbatim; the signature
/// behind `href` covers them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub header: BTreeMap<String, String>,
}

impl Link {
    /// A link with no required headers.
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            header: BTreeMap::new(),
        }
    }
}

/// Retrieve/store/check contract against an object store.
pub trait ContentStore: Send + Sync + 'static {
    /// Build the response that sends the client to the object's content.
    /// The caller can read the status used from the response.
    fn get(&self, meta: &Meta) -> Response;

    /// Build the link a client uses to upload the object's content.
    fn put_link(&self, meta: &Meta) -> Link;

    /// Check whether the object's content is present.
    fn exists<'a>(
        &'a self,
        meta: &'a Meta,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + 'a>>;
}

/// Storage path of an object: `/<prefix>/<oid[0:2]>/<oid[2:4]>/<oid>`.
///
/// The two shard levels bound directory fan-out. The result is a cleaned
/// rooted path: empty and `.` segments drop out and `..` removes the
/// previous segment but never climbs above the root, so an empty prefix
/// yields `/<oid[0:2]>/<oid[2:4]>/<oid>`.
pub fn storage_path(path_prefix: &str, oid: &str) -> String {
    let shard1 = oid.get(0..2).unwrap_or_default();
    let shard2 = oid.get(2..4).unwrap_or_default();
    let mut segments: Vec<&str> = Vec::new();
    for segment in path_prefix.split('/').chain([shard1, shard2, oid]) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}
