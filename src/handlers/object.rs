//! Git LFS object handlers.
//!
//! Each handler builds a [`RequestVars`] for the operation, talks to the
//! metadata store, and hands the transfer itself to the content store.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ApiError;
use crate::metadata::store::{Meta, RequestVars};
use crate::storage::backend::Link;
use crate::AppState;

/// Length of a hex-encoded SHA-256 oid.
pub const OID_LEN: usize = 64;

/// Body of an upload request or verification callback.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectRequest {
    pub oid: String,
    pub size: u64,
}

/// Object representation served to LFS clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Representation {
    pub oid: String,
    pub size: u64,
    #[serde(rename = "_links")]
    pub links: BTreeMap<String, Link>,
}

/// Whether `oid` is a 64-character hex string.
pub fn is_valid_oid(oid: &str) -> bool {
    oid.len() == OID_LEN && oid.bytes().all(|b| b.is_ascii_hexdigit())
}

fn validate_oid(oid: &str) -> Result<(), ApiError> {
    if is_valid_oid(oid) {
        Ok(())
    } else {
        Err(ApiError::InvalidObject {
            message: format!("Invalid oid: {oid}"),
        })
    }
}

/// Whether `segment` can name a user or repository: non-empty, not a dot
/// segment, and free of path, query, fragment and control characters.
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '?' | '#') || c.is_control())
}

fn validate_repo_path(user: &str, repo: &str) -> Result<(), ApiError> {
    for segment in [user, repo] {
        if !is_valid_segment(segment) {
            return Err(ApiError::InvalidObject {
                message: format!("Invalid repository path: {segment:?}"),
            });
        }
    }
    Ok(())
}

fn parse_object_request(body: &[u8]) -> Result<ObjectRequest, ApiError> {
    let request: ObjectRequest =
        serde_json::from_slice(body).map_err(|e| ApiError::BadRequest {
            message: format!("Invalid object request: {e}"),
        })?;
    validate_oid(&request.oid)?;
    Ok(request)
}

fn request_vars(user: &str, repo: &str, oid: &str, size: u64, headers: &HeaderMap) -> RequestVars {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    RequestVars {
        user: user.to_string(),
        repo: repo.to_string(),
        oid: oid.to_string(),
        size,
        path_prefix: String::new(),
        authorization,
    }
}

/// Base URL for links back to this server.
fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    let public_url = state.config.server.public_url.trim_end_matches('/');
    if !public_url.is_empty() {
        return public_url.to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}

/// A link back to this server, carrying the caller's credential.
fn server_link(href: String, v: &RequestVars) -> Link {
    let mut link = Link::new(href);
    if !v.authorization.is_empty() {
        link.header
            .insert("Authorization".to_string(), v.authorization.clone());
    }
    link
}

fn download_link(base: &str, v: &RequestVars) -> Link {
    server_link(format!("{base}/{}/{}/objects/{}", v.user, v.repo, v.oid), v)
}

fn verify_link(base: &str, v: &RequestVars) -> Link {
    server_link(format!("{base}/{}/{}/objects/verify", v.user, v.repo), v)
}

fn accepts_media_type(headers: &HeaderMap, media_type: &str) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains(media_type))
        .unwrap_or(false)
}

fn lfs_json(state: &AppState, status: StatusCode, representation: Representation) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, state.config.meta.media_type.clone())],
        Json(representation),
    )
        .into_response()
}

fn representation(meta: &Meta, links: BTreeMap<String, Link>) -> Representation {
    Representation {
        oid: meta.oid.clone(),
        size: meta.size,
        links,
    }
}

/// `GET /{user}/{repo}/objects/{oid}` -- Object metadata or content.
///
/// With an `Accept` header naming the LFS media type, returns the object
/// representation with a download link. Otherwise redirects to the
/// content in the object store.
pub async fn get_object(
    state: Arc<AppState>,
    user: &str,
    repo: &str,
    oid: &str,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    validate_repo_path(user, repo)?;
    validate_oid(oid)?;
    let v = request_vars(user, repo, oid, 0, headers);
    let meta = state.meta.get(&v).await?;

    if accepts_media_type(headers, &state.config.meta.media_type) {
        let base = base_url(&state, headers);
        let mut links = BTreeMap::new();
        links.insert("download".to_string(), download_link(&base, &v));
        return Ok(lfs_json(&state, StatusCode::OK, representation(&meta, links)));
    }

    let response = state.content.get(&meta);
    debug!(oid = %oid, status = response.status().as_u16(), "content redirect");
    Ok(response)
}

/// `POST /{user}/{repo}/objects` -- Start an upload.
///
/// Reserves the object with the metadata API. When the object is already
/// known and its content is present, answers 200 with a download link so
/// the client can skip the upload. Otherwise answers 202 with a signed
/// upload link and a verify link.
pub async fn post_object(
    state: Arc<AppState>,
    user: &str,
    repo: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, ApiError> {
    validate_repo_path(user, repo)?;
    let request = parse_object_request(body)?;
    let v = request_vars(user, repo, &request.oid, request.size, headers);
    let meta = state.meta.send(&v).await?;
    let base = base_url(&state, headers);

    if meta.existing {
        let present = state.content.exists(&meta).await.map_err(|e| {
            warn!(oid = %meta.oid, "content probe failed: {e:#}");
            ApiError::Upstream(e.to_string())
        })?;
        if present {
            info!(oid = %meta.oid, "object already stored");
            let mut links = BTreeMap::new();
            links.insert("download".to_string(), download_link(&base, &v));
            return Ok(lfs_json(&state, StatusCode::OK, representation(&meta, links)));
        }
    }

    info!(oid = %meta.oid, size = meta.size, "issuing upload link");
    let mut links = BTreeMap::new();
    links.insert("upload".to_string(), state.content.put_link(&meta));
    links.insert("verify".to_string(), verify_link(&base, &v));
    Ok(lfs_json(&state, StatusCode::ACCEPTED, representation(&meta, links)))
}

/// `POST /{user}/{repo}/objects/verify` -- Confirm a finished upload.
pub async fn verify_object(
    state: Arc<AppState>,
    user: &str,
    repo: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, ApiError> {
    validate_repo_path(user, repo)?;
    let request = parse_object_request(body)?;
    let v = request_vars(user, repo, &request.oid, request.size, headers);
    state.meta.verify(&v).await?;
    info!(oid = %v.oid, "object verified");
    Ok(StatusCode::OK.into_response())
}
