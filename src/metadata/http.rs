//! Metadata store backed by the authoritative HTTP metadata API.
//!
//! Endpoints, relative to the configured base URL:
//!   Lookup/reserve:  `{base}/{user}/{repo}/media/blobs/{oid}`
//!   Verify:          `{base}/{user}/{repo}/media/blobs/verify/{oid}`
//!
//! POST bodies are `{"Oid":..,"Size":..}`. When a shared secret is
//! configured they carry `Content-Hmac: sha256 <hex>` over the exact body
//! bytes sent.

use hmac::{Hmac, Mac};
use metrics::counter;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Url};
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, warn};

use super::store::{
    LookupOutcome, Meta, MetaFuture, MetaStore, RequestVars, ReserveOutcome, VerifyOutcome,
};
use crate::config::MetaConfig;
use crate::errors::MetaError;
use crate::metrics::META_REQUESTS_TOTAL;

/// Request header carrying the body signature.
pub const CONTENT_HMAC_HEADER: &str = "Content-Hmac";

/// The only fields a reservation or verification may assert. Path prefix
/// and existence are decided by the metadata API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct BlobRequest<'a> {
    oid: &'a str,
    size: u64,
}

/// Compute the `Content-Hmac` header value for `body`.
pub fn content_hmac(key: &[u8], body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(body);
    format!("sha256 {}", hex::encode(mac.finalize().into_bytes()))
}

/// [`MetaStore`] talking to the metadata API over HTTP.
pub struct HttpMetaStore {
    client: reqwest::Client,
    endpoint: Url,
    media_type: String,
    hmac_key: Option<Vec<u8>>,
}

impl HttpMetaStore {
    /// Create a store from the `meta` configuration section.
    pub fn new(config: &MetaConfig) -> anyhow::Result<Self> {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a store that issues requests through `client`.
    ///
    /// Fails when `meta.endpoint` is not an absolute http(s) URL.
    pub fn with_client(client: reqwest::Client, config: &MetaConfig) -> anyhow::Result<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| anyhow::anyhow!("Invalid meta.endpoint {}: {e}", config.endpoint))?;
        if endpoint.cannot_be_a_base() || !matches!(endpoint.scheme(), "http" | "https") {
            anyhow::bail!("meta.endpoint must be an http(s) URL: {}", config.endpoint);
        }

        let hmac_key = if config.hmac_key.is_empty() {
            None
        } else {
            Some(config.hmac_key.as_bytes().to_vec())
        };

        Ok(Self {
            client,
            endpoint,
            media_type: config.media_type.clone(),
            hmac_key,
        })
    }

    /// URL of the record for `v.oid`.
    pub fn meta_link(&self, v: &RequestVars) -> Url {
        self.join(&[&v.user, &v.repo, "media", "blobs", &v.oid])
    }

    /// URL of the verification endpoint for `v.oid`.
    pub fn verify_link(&self, v: &RequestVars) -> Url {
        self.join(&[&v.user, &v.repo, "media", "blobs", "verify", &v.oid])
    }

    /// Append `segments` to the base path. Each segment is percent-encoded
    /// on its own, so `/`, `?` and `#` inside a value stay inside it.
    fn join(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(segments.iter().filter(|s| !s.is_empty()));
        }
        url
    }

    /// Start a request with the headers every metadata call carries.
    fn request(&self, method: Method, url: Url, v: &RequestVars) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header(ACCEPT, &self.media_type);
        if !v.authorization.is_empty() {
            builder = builder.header(AUTHORIZATION, &v.authorization);
        }
        builder
    }

    /// Build a POST whose body is serialized once, signed, and sent as-is.
    fn signed_post(&self, url: Url, v: &RequestVars) -> Result<RequestBuilder, MetaError> {
        let body = serde_json::to_vec(&BlobRequest {
            oid: &v.oid,
            size: v.size,
        })?;

        let mut builder = self.request(Method::POST, url, v);
        if let Some(ref key) = self.hmac_key {
            builder = builder.header(CONTENT_HMAC_HEADER, content_hmac(key, &body));
        }
        Ok(builder.body(body))
    }

    async fn fetch(&self, v: &RequestVars) -> Result<Meta, MetaError> {
        let res = self
            .request(Method::GET, self.meta_link(v), v)
            .send()
            .await
            .map_err(|e| {
                warn!(oid = %v.oid, "meta lookup failed: {e}");
                MetaError::Transport(e)
            })?;

        let status = res.status().as_u16();
        let outcome = LookupOutcome::classify(status);
        counter!(META_REQUESTS_TOTAL, "operation" => "get", "outcome" => outcome.as_str())
            .increment(1);
        debug!(oid = %v.oid, status, "meta lookup");

        match outcome {
            LookupOutcome::Found => decode(res, &v.oid).await,
            LookupOutcome::Absent => Ok(Meta {
                oid: v.oid.clone(),
                size: v.size,
                path_prefix: v.path_prefix.clone(),
                existing: false,
            }),
            LookupOutcome::Failed(code) => {
                warn!(oid = %v.oid, status = code, "meta lookup rejected");
                Err(MetaError::Status(code))
            }
        }
    }

    async fn reserve(&self, v: &RequestVars) -> Result<Meta, MetaError> {
        let res = self
            .signed_post(self.meta_link(v), v)?
            .send()
            .await
            .map_err(|e| {
                warn!(oid = %v.oid, "meta reservation failed: {e}");
                MetaError::Transport(e)
            })?;

        let status = res.status().as_u16();
        let outcome = ReserveOutcome::classify(status);
        counter!(META_REQUESTS_TOTAL, "operation" => "send", "outcome" => outcome.as_str())
            .increment(1);
        debug!(oid = %v.oid, status, "meta reservation");

        match outcome {
            ReserveOutcome::Forbidden => {
                warn!(oid = %v.oid, "meta reservation denied");
                Err(MetaError::Unauthorized)
            }
            ReserveOutcome::Existing | ReserveOutcome::Created => {
                let mut meta = decode(res, &v.oid).await?;
                meta.existing = outcome == ReserveOutcome::Existing;
                Ok(meta)
            }
            ReserveOutcome::Failed(code) => {
                warn!(oid = %v.oid, status = code, "meta reservation rejected");
                Err(MetaError::Status(code))
            }
        }
    }

    async fn confirm(&self, v: &RequestVars) -> Result<(), MetaError> {
        let res = self
            .signed_post(self.verify_link(v), v)?
            .send()
            .await
            .map_err(|e| {
                warn!(oid = %v.oid, "verify failed: {e}");
                MetaError::Transport(e)
            })?;

        let status = res.status().as_u16();
        let outcome = VerifyOutcome::classify(status);
        counter!(META_REQUESTS_TOTAL, "operation" => "verify", "outcome" => outcome.as_str())
            .increment(1);
        debug!(oid = %v.oid, status, "verify");

        match outcome {
            VerifyOutcome::Verified => Ok(()),
            VerifyOutcome::Forbidden => {
                warn!(oid = %v.oid, "verify denied");
                Err(MetaError::Unauthorized)
            }
            VerifyOutcome::Failed(code) => {
                warn!(oid = %v.oid, status = code, "verify rejected");
                Err(MetaError::Status(code))
            }
        }
    }
}

/// Read and decode a [`Meta`] body.
async fn decode(res: reqwest::Response, oid: &str) -> Result<Meta, MetaError> {
    let body = res.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| {
        warn!(oid = %oid, "malformed meta body: {e}");
        MetaError::Decode(e)
    })
}

impl MetaStore for HttpMetaStore {
    fn get<'a>(&'a self, v: &'a RequestVars) -> MetaFuture<'a, Meta> {
        Box::pin(self.fetch(v))
    }

    fn send<'a>(&'a self, v: &'a RequestVars) -> MetaFuture<'a, Meta> {
        Box::pin(self.reserve(v))
    }

    fn verify<'a>(&'a self, v: &'a RequestVars) -> MetaFuture<'a, ()> {
        Box::pin(self.confirm(v))
    }
}
