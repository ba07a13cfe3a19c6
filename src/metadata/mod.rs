//! Object metadata synchronization.
//!
//! The authoritative record of which objects exist, their size, and whether
//! they have been verified lives behind a remote API. The
//! [`store::MetaStore`] trait defines the interface;
//! [`http::HttpMetaStore`] is the HTTP implementation.

pub mod http;
pub mod store;
