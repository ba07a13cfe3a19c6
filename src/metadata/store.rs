//! Abstract metadata store trait and the records it exchanges.
//!
//! Any metadata authority must implement [`MetaStore`].  The trait uses
//! manually desugared async methods (pinned futures) so implementations
//! can be held as `Arc<dyn MetaStore>`.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

use crate::errors::MetaError;

/// Boxed future returned by [`MetaStore`] methods.
pub type MetaFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, MetaError>> + Send + 'a>>;

/// Object identity record.
///
/// Wire names are PascalCase (`Oid`, `Size`, `PathPrefix`) to match the
/// metadata API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Meta {
    /// Hex content hash; also the storage path leaf.
    pub oid: String,
    /// Object size in bytes.
    pub size: u64,
    /// Optional namespace segment in the object store.
    #[serde(default)]
    pub path_prefix: String,
    /// Set by [`MetaStore::send`] when the authority already had this oid.
    #[serde(skip)]
    pub existing: bool,
}

/// Per-operation request context built by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestVars {
    pub user: String,
    pub repo: String,
    pub oid: String,
    pub size: u64,
    pub path_prefix: String,
    /// Credential forwarded verbatim to the metadata API. May be empty.
    pub authorization: String,
}

/// Fetch/reserve/verify contract against the metadata authority.
pub trait MetaStore: Send + Sync + 'static {
    /// Look up the record for `v.oid`. A missing record yields a synthesized
    /// one built from `v`.
    fn get<'a>(&'a self, v: &'a RequestVars) -> MetaFuture<'a, Meta>;

    /// Reserve a record for `v.oid`, reporting through [`Meta::existing`]
    /// whether it was already known.
    fn send<'a>(&'a self, v: &'a RequestVars) -> MetaFuture<'a, Meta>;

    /// Confirm that the content for `v.oid` has been transferred.
    fn verify<'a>(&'a self, v: &'a RequestVars) -> MetaFuture<'a, ()>;
}

// ── Response classification ─────────────────────────────────────────

/// Result of a metadata lookup, by response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    /// 200: a record follows in the body.
    Found,
    /// 204: no record yet.
    Absent,
    Failed(u16),
}

impl LookupOutcome {
    pub fn classify(status: u16) -> Self {
        match status {
            200 => LookupOutcome::Found,
            204 => LookupOutcome::Absent,
            code => LookupOutcome::Failed(code),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LookupOutcome::Found => "found",
            LookupOutcome::Absent => "absent",
            LookupOutcome::Failed(_) => "failed",
        }
    }
}

/// Result of a reservation, by response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// 200: the authority already had the record.
    Existing,
    /// 201: the record was newly reserved.
    Created,
    /// 403
    Forbidden,
    Failed(u16),
}

impl ReserveOutcome {
    pub fn classify(status: u16) -> Self {
        match status {
            200 => ReserveOutcome::Existing,
            201 => ReserveOutcome::Created,
            403 => ReserveOutcome::Forbidden,
            code => ReserveOutcome::Failed(code),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReserveOutcome::Existing => "existing",
            ReserveOutcome::Created => "created",
            ReserveOutcome::Forbidden => "forbidden",
            ReserveOutcome::Failed(_) => "failed",
        }
    }
}

/// Result of a verification, by response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    Forbidden,
    Failed(u16),
}

impl VerifyOutcome {
    pub fn classify(status: u16) -> Self {
        match status {
            200 => VerifyOutcome::Verified,
            403 => VerifyOutcome::Forbidden,
            code => VerifyOutcome::Failed(code),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyOutcome::Verified => "verified",
            VerifyOutcome::Forbidden => "forbidden",
            VerifyOutcome::Failed(_) => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_wire_names() {
        let meta: Meta =
            serde_json::from_str(r#"{"Oid":"abcd","Size":7,"PathPrefix":"team"}"#).unwrap();
        assert_eq!(meta.oid, "abcd");
        assert_eq!(meta.size, 7);
        assert_eq!(meta.path_prefix, "team");
        assert!(!meta.existing);
    }

    #[test]
    fn test_meta_existing_is_never_read_from_the_wire() {
        let meta: Meta =
            serde_json::from_str(r#"{"Oid":"abcd","Size":7,"Existing":true}"#).unwrap();
        assert!(!meta.existing);
        assert_eq!(meta.path_prefix, "");
    }

    #[test]
    fn test_classify_lookup() {
        assert_eq!(LookupOutcome::classify(200), LookupOutcome::Found);
        assert_eq!(LookupOutcome::classify(204), LookupOutcome::Absent);
        assert_eq!(LookupOutcome::classify(404), LookupOutcome::Failed(404));
    }

    #[test]
    fn test_classify_reserve() {
        assert_eq!(ReserveOutcome::classify(200), ReserveOutcome::Existing);
        assert_eq!(ReserveOutcome::classify(201), ReserveOutcome::Created);
        assert_eq!(ReserveOutcome::classify(403), ReserveOutcome::Forbidden);
        assert_eq!(ReserveOutcome::classify(204), ReserveOutcome::Failed(204));
    }

    #[test]
    fn test_classify_verify() {
        assert_eq!(VerifyOutcome::classify(200), VerifyOutcome::Verified);
        assert_eq!(VerifyOutcome::classify(403), VerifyOutcome::Forbidden);
        assert_eq!(VerifyOutcome::classify(201), VerifyOutcome::Failed(201));
    }
}
