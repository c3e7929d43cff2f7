//! Mock network speaker for integration tests.
//!
//! Answers every path the same way: unauthenticated requests get a Digest
//! challenge, requests carrying a valid `Authorization` header get 200 and a
//! parameter listing. Every request is counted.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use parking_lot::Mutex;
use speakcast_core::auth::{DigestAuthenticator, DigestChallenge};
use speakcast_core::device::Credentials;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const REALM: &str = "AXIS_ACCC8E123456";
pub const NONCE: &str = "abc123";
pub const OPAQUE: &str = "5ccc069c403ebaf9";
pub const USERNAME: &str = "root";
pub const PASSWORD: &str = "pass";
pub const PROBE_BODY: &str = "root.Properties.Audio.Decoder.Format=g711,g726,aac";

/// How the device answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Challenge, then accept valid Digest credentials
    Digest,
    /// Challenge every request, even correctly authenticated ones
    AlwaysChallenge,
    /// 401 offering only Basic
    BasicOnly,
    /// Fixed status for every request
    Status(u16),
}

/// Request body as received after authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedBody {
    pub path: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

struct DeviceState {
    behavior: Behavior,
    requests: AtomicUsize,
    authorized: AtomicUsize,
    bodies: Mutex<Vec<ReceivedBody>>,
}

pub struct MockDevice {
    addr: SocketAddr,
    state: Arc<DeviceState>,
    server: JoinHandle<()>,
}

impl MockDevice {
    pub async fn start(behavior: Behavior) -> Self {
        let state = Arc::new(DeviceState {
            behavior,
            requests: AtomicUsize::new(0),
            authorized: AtomicUsize::new(0),
            bodies: Mutex::new(Vec::new()),
        });
        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.addr.to_string(), USERNAME, PASSWORD)
    }

    /// Every request received, authenticated or not.
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Requests that carried valid Digest credentials.
    pub fn authorized_requests(&self) -> usize {
        self.state.authorized.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<ReceivedBody> {
        self.state.bodies.lock().clone()
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.server.abort();
    }
}

pub fn challenge_header() -> String {
    format!(r#"Digest realm="{REALM}", nonce="{NONCE}", qop="auth", opaque="{OPAQUE}""#)
}

async fn handle(
    State(state): State<Arc<DeviceState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);

    match state.behavior {
        Behavior::Status(code) => {
            let status = StatusCode::from_u16(code).unwrap();
            return (status, "device error").into_response();
        }
        Behavior::BasicOnly => {
            return (
                StatusCode::UNAUTHORIZED,
                [(WWW_AUTHENTICATE, r#"Basic realm="device""#.to_string())],
                "",
            )
                .into_response();
        }
        Behavior::Digest | Behavior::AlwaysChallenge => {}
    }

    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let valid = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| verify_authorization(method.as_str(), &path, value));

    if valid {
        state.authorized.fetch_add(1, Ordering::SeqCst);
    }

    if valid && state.behavior == Behavior::Digest {
        state.bodies.lock().push(ReceivedBody {
            path,
            content_type: headers
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            body,
        });
        return (StatusCode::OK, PROBE_BODY).into_response();
    }

    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, challenge_header())],
        "",
    )
        .into_response()
}

/// Recomputes the expected response from the client's own cnonce.
fn verify_authorization(method: &str, path: &str, header: &str) -> bool {
    let Some(params) = header.strip_prefix("Digest ") else {
        return false;
    };
    let field = |name: &str| -> Option<String> {
        params.split(", ").find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name).then(|| value.trim_matches('"').to_string())
        })
    };

    let (Some(username), Some(uri), Some(cnonce), Some(nc), Some(response), Some(opaque)) = (
        field("username"),
        field("uri"),
        field("cnonce"),
        field("nc"),
        field("response"),
        field("opaque"),
    ) else {
        return false;
    };
    if username != USERNAME || uri != path || nc != "00000001" || opaque != OPAQUE {
        return false;
    }

    let challenge = DigestChallenge::parse(&challenge_header()).unwrap();
    let expected = DigestAuthenticator::new().compute_response_with_cnonce(
        method,
        &uri,
        &challenge,
        &Credentials::new("device", USERNAME, PASSWORD),
        &cnonce,
    );
    expected.response == response
}
