//! S3 redirecting content store.
//!
//! Object bytes never pass through lfsgate. Downloads are answered with a
//! redirect to a presigned GET URL, uploads with a header-signed PUT link
//! bound to the object's SHA-256, and existence with a presigned HEAD.
//!
//! Key mapping:
//!   Objects:  `{bucket}/{path_prefix}/{oid[0:2]}/{oid[2:4]}/{oid}`

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::counter;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

use super::backend::{storage_path, ContentStore, Link};
use crate::metadata::store::Meta;
use crate::metrics::LINKS_ISSUED_TOTAL;
use crate::signer::{Signer, AMZ_DATE_FORMAT};

/// Validity of a download redirect.
pub const GET_EXPIRY_SECS: u64 = 300;

/// Validity of an existence probe. Probes are frequent, so their
/// credentials are kept short-lived.
pub const EXISTS_EXPIRY_SECS: u64 = 30;

/// Content store that delegates every transfer to S3.
pub struct S3Redirector {
    signer: Arc<dyn Signer>,
    /// HTTP client for existence probes.
    client: reqwest::Client,
}

impl S3Redirector {
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self::with_client(signer, reqwest::Client::new())
    }

    pub fn with_client(signer: Arc<dyn Signer>, client: reqwest::Client) -> Self {
        Self { signer, client }
    }

    async fn probe(&self, meta: &Meta) -> anyhow::Result<bool> {
        let path = storage_path(&meta.path_prefix, &meta.oid);
        let token = self.signer.sign_query("HEAD", &path, EXISTS_EXPIRY_SECS);
        counter!(LINKS_ISSUED_TOTAL, "verb" => "HEAD").increment(1);

        let res = self
            .client
            .head(&token.location)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("S3 head_object {path}: {e}"))?;

        let status = res.status();
        if status == StatusCode::OK {
            debug!(oid = %meta.oid, "object exists");
            return Ok(true);
        }

        // Any non-200 answer reads as "absent"; the caller then asks for an
        // upload, which is always safe.
        warn!(oid = %meta.oid, status = status.as_u16(), "object probe did not find content");
        Ok(false)
    }
}

impl ContentStore for S3Redirector {
    fn get(&self, meta: &Meta) -> Response {
        let path = storage_path(&meta.path_prefix, &meta.oid);
        let token = self.signer.sign_query("GET", &path, GET_EXPIRY_SECS);
        counter!(LINKS_ISSUED_TOTAL, "verb" => "GET").increment(1);
        debug!(oid = %meta.oid, "redirecting download");

        (StatusCode::FOUND, [(header::LOCATION, token.location)]).into_response()
    }

    fn put_link(&self, meta: &Meta) -> Link {
        let path = storage_path(&meta.path_prefix, &meta.oid);
        let token = self.signer.sign_header("PUT", &path, &meta.oid);
        counter!(LINKS_ISSUED_TOTAL, "verb" => "PUT").increment(1);
        debug!(oid = %meta.oid, "issued upload link");

        let mut header = BTreeMap::new();
        header.insert("Authorization".to_string(), token.token);
        header.insert("x-amz-content-sha256".to_string(), meta.oid.clone());
        header.insert(
            "x-amz-date".to_string(),
            token.time.format(AMZ_DATE_FORMAT).to_string(),
        );

        Link {
            href: token.location,
            header,
        }
    }

    fn exists<'a>(
        &'a self,
        meta: &'a Meta,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + 'a>> {
        Box::pin(self.probe(meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Token;
    use crate::testing::{fixed_response, oid};
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    /// A call made to [`RecordingSigner`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum SignCall {
        Query {
            verb: String,
            path: String,
            expires: u64,
        },
        Header {
            verb: String,
            path: String,
            content: String,
        },
    }

    /// Signer that records its calls and points URLs at `base`.
    struct RecordingSigner {
        base: String,
        calls: Mutex<Vec<SignCall>>,
    }

    impl RecordingSigner {
        fn new(base: &str) -> Arc<Self> {
            Arc::new(Self {
                base: base.to_string(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<SignCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Signer for RecordingSigner {
        fn sign_query(&self, verb: &str, path: &str, expires_secs: u64) -> Token {
            self.calls.lock().unwrap().push(SignCall::Query {
                verb: verb.to_string(),
                path: path.to_string(),
                expires: expires_secs,
            });
            Token {
                location: format!("{}{}?sig={}", self.base, path, verb),
                token: String::new(),
                time: Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap(),
            }
        }

        fn sign_header(&self, verb: &str, path: &str, content_sha256: &str) -> Token {
            self.calls.lock().unwrap().push(SignCall::Header {
                verb: verb.to_string(),
                path: path.to_string(),
                content: content_sha256.to_string(),
            });
            Token {
                location: format!("{}{}", self.base, path),
                token: "AWS4-HMAC-SHA256 Credential=test".to_string(),
                time: Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap(),
            }
        }
    }

    fn meta() -> Meta {
        Meta {
            oid: oid(),
            size: 42,
            path_prefix: "team".to_string(),
            existing: false,
        }
    }

    #[test]
    fn test_get_redirects_with_300_second_window() {
        let signer = RecordingSigner::new("https://s3.test");
        let store = S3Redirector::new(signer.clone());

        let response = store.get(&meta());
        assert_eq!(response.status(), StatusCode::FOUND);
        let expected_path = format!("/team/aa/11/{}", oid());
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            format!("https://s3.test{expected_path}?sig=GET").as_str()
        );
        assert_eq!(
            signer.calls(),
            vec![SignCall::Query {
                verb: "GET".to_string(),
                path: expected_path,
                expires: GET_EXPIRY_SECS,
            }]
        );
        assert_eq!(GET_EXPIRY_SECS, 300);
    }

    #[test]
    fn test_put_link_headers() {
        let signer = RecordingSigner::new("https://s3.test");
        let store = S3Redirector::new(signer.clone());

        let link = store.put_link(&meta());
        assert_eq!(link.href, format!("https://s3.test/team/aa/11/{}", oid()));
        assert_eq!(link.header.len(), 3);
        assert_eq!(link.header["Authorization"], "AWS4-HMAC-SHA256 Credential=test");
        assert_eq!(link.header["x-amz-content-sha256"], oid());
        assert_eq!(link.header["x-amz-date"], "20261019T083000Z");
        assert_eq!(
            signer.calls(),
            vec![SignCall::Header {
                verb: "PUT".to_string(),
                path: format!("/team/aa/11/{}", oid()),
                content: oid(),
            }]
        );
    }

    #[tokio::test]
    async fn test_exists_200_with_30_second_window() {
        let (url, log) = fixed_response(StatusCode::OK, "").await;
        let signer = RecordingSigner::new(&url);
        let store = S3Redirector::new(signer.clone());

        assert!(store.exists(&meta()).await.unwrap());
        assert_eq!(
            signer.calls(),
            vec![SignCall::Query {
                verb: "HEAD".to_string(),
                path: format!("/team/aa/11/{}", oid()),
                expires: EXISTS_EXPIRY_SECS,
            }]
        );
        assert_eq!(EXISTS_EXPIRY_SECS, 30);

        let requests = log.lock().unwrap();
        assert_eq!(requests[0].method, reqwest::Method::HEAD);
        assert_eq!(requests[0].path, format!("/team/aa/11/{}", oid()));
    }

    #[tokio::test]
    async fn test_exists_non_200_is_absent() {
        let (url, _log) = fixed_response(StatusCode::NOT_FOUND, "").await;
        let store = S3Redirector::new(RecordingSigner::new(&url));
        assert!(!store.exists(&meta()).await.unwrap());

        let (url, _log) = fixed_response(StatusCode::NO_CONTENT, "").await;
        let store = S3Redirector::new(RecordingSigner::new(&url));
        assert!(!store.exists(&meta()).await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_transport_failure_is_error() {
        let store = S3Redirector::new(RecordingSigner::new("http://127.0.0.1:1"));
        assert!(store.exists(&meta()).await.is_err());
    }

    #[tokio::test]
    async fn test_same_path_across_operations() {
        let (url, _log) = fixed_response(StatusCode::OK, "").await;
        let signer = RecordingSigner::new(&url);
        let store = S3Redirector::new(signer.clone());

        store.get(&meta());
        store.put_link(&meta());
        store.exists(&meta()).await.unwrap();

        let paths: Vec<String> = signer
            .calls()
            .into_iter()
            .map(|call| match call {
                SignCall::Query { path, .. } | SignCall::Header { path, .. } => path,
            })
            .collect();
        assert_eq!(paths.len(), 3);
        assert!(paths.iter().all(|p| p == &paths[0]));
    }
}
