//! Object content stores.
//!
//! The [`backend::ContentStore`] trait abstracts over where object bytes
//! live and how clients reach them. [`s3::S3Redirector`] sends clients to
//! S3 with signed URLs.

pub mod backend;
pub mod s3;
