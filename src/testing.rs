//! In-process HTTP fakes for unit tests.
//!
//! The metadata API and the object store are both plain HTTP services, so
//! tests stand them up as axum routers on an ephemeral localhost port.

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use std::sync::{Arc, Mutex};

/// A request as seen by a fake server.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

pub(crate) type RequestLog = Arc<Mutex<Vec<RecordedRequest>>>;

/// Serve `app` on `127.0.0.1:0` and return its base URL.
pub(crate) async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Drain a request into a [`RecordedRequest`] and append it to `log`.
pub(crate) async fn capture(log: &RequestLog, req: Request<Body>) -> RecordedRequest {
    let (parts, body) = req.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let recorded = RecordedRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        headers: parts.headers,
        body: body.to_vec(),
    };
    log.lock().unwrap().push(recorded.clone());
    recorded
}

/// A server that answers every request with `status` and `body`.
pub(crate) async fn fixed_response(status: StatusCode, body: &'static str) -> (String, RequestLog) {
    let log: RequestLog = Arc::default();
    let handler_log = log.clone();
    let app = Router::new().fallback(move |req: Request<Body>| {
        let log = handler_log.clone();
        async move {
            capture(&log, req).await;
            (status, body)
        }
    });
    (serve(app).await, log)
}

/// A 64-character hex oid.
pub(crate) fn oid() -> String {
    "aa11bb22".repeat(8)
}
