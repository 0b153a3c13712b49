//!
//! remote-user-auth HTTP server
//! ----------------------------
//! Axum front end for the identity reconciler. Requests arrive behind a proxy
//! that has already authenticated the user and sets the trusted header.
//!
//! Responsibilities:
//! - Session cookie handling on top of `SessionManager`.
//! - `/whoami` runs reconciliation and reports the resulting principal.
//! - `/logout` drops the session principal and marks it logged out.
//! - `/admin/reload` forces a configuration reload for members of the admin group.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::{ConfigLoader, PropertiesFileSource};
use crate::directory::{Directory, InMemoryDirectory};
use crate::error::AppError;
use crate::identity::{decode_header_value, Authenticated, IdentityReconciler, RemoteUserHeader, RequestHeaders, SessionManager};

pub const SESSION_COOKIE: &str = "rua_session";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<IdentityReconciler>,
    pub sessions: SessionManager,
    /// Group whose members may call `/admin/*`.
    pub admin_group: String,
}

impl AppState {
    pub fn new(
        config: Arc<ConfigLoader>,
        directory: Arc<dyn Directory>,
        remote_user_header: &str,
        admin_group: impl Into<String>,
    ) -> Self {
        let identity = Arc::new(RemoteUserHeader::new(remote_user_header));
        Self {
            reconciler: Arc::new(IdentityReconciler::new(config, directory, identity)),
            sessions: SessionManager::default(),
            admin_group: admin_group.into(),
        }
    }
}

/// Process settings, normally taken from the environment.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub config_path: PathBuf,
    pub http_port: u16,
    pub remote_user_header: String,
    pub admin_group: String,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("remote-user-auth.properties"),
            http_port: 8080,
            remote_user_header: "remote-user".to_string(),
            admin_group: "remote-user-auth-admins".to_string(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "remote-user-auth ok" }))
        .route("/whoami", get(whoami))
        .route("/logout", post(logout))
        .route("/admin/reload", post(reload))
        .with_state(state)
}

/// Load the configuration, seed an in-memory directory with every group it
/// names and serve until the listener fails.
pub async fn run(opts: ServerOptions) -> anyhow::Result<()> {
    let source = Arc::new(PropertiesFileSource::new(&opts.config_path));
    let config = Arc::new(
        ConfigLoader::load(source).with_context(|| format!("loading {}", opts.config_path.display()))?,
    );
    let groups = config.current().rules.all_groups();
    info!(groups = groups.len(), "seeding in-memory directory");
    let directory = Arc::new(InMemoryDirectory::with_groups(groups));

    let state = AppState::new(config, directory, &opts.remote_user_header, opts.admin_group.clone());
    let sweeper = state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            ticker.tick().await;
            let n = sweeper.sweep_expired();
            if n > 0 {
                info!(expired = n, "swept sessions");
            }
        }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], opts.http_port));
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie")?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some((k, v)) = p.split_once('=') {
            if k == name {
                return Some(v.to_string());
            }
        }
    }
    None
}

fn set_session_cookie(sid: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{}={}; HttpOnly; Secure; SameSite=Strict; Path=/", SESSION_COOKIE, sid)).ok()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static(
        "rua_session=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/",
    )
}

/// Copy the HTTP headers into the reconciler's view, decoding non-ASCII
/// values instead of dropping them.
pub fn request_headers(headers: &HeaderMap) -> RequestHeaders {
    let mut req = RequestHeaders::new();
    for (name, value) in headers {
        req = req.with(name.as_str(), decode_header_value(value.as_bytes()));
    }
    req.request_id = headers.get("x-request-id").map(|v| decode_header_value(v.as_bytes()).into_owned());
    req
}

fn error_response(err: &AppError) -> (StatusCode, Json<Value>) {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let label = if status == StatusCode::UNAUTHORIZED { "unauthorized" } else { "error" };
    (status, Json(json!({"status": label, "code": err.code_str(), "message": err.message()})))
}

pub type Reply = (StatusCode, HeaderMap, Json<Value>);

/// Run reconciliation for the request. On success also returns the headers to
/// send back (the session cookie when the session is new).
fn authenticate_request(state: &AppState, headers: &HeaderMap) -> Result<(Authenticated, HeaderMap), Reply> {
    let sid = parse_cookie(headers, SESSION_COOKIE);
    let session = state.sessions.open(sid.as_deref()).map_err(|e| {
        error!("session open failed: {e}");
        let (status, body) = error_response(&AppError::from(e));
        (status, HeaderMap::new(), body)
    })?;

    match state.reconciler.authenticate(&request_headers(headers), &session) {
        Ok(auth) => {
            let mut out = HeaderMap::new();
            if session.is_fresh() {
                if let Some(cookie) = set_session_cookie(session.token()) {
                    out.insert("Set-Cookie", cookie);
                }
            }
            Ok((auth, out))
        }
        Err(e) => {
            let (status, body) = error_response(&AppError::from(e));
            Err((status, HeaderMap::new(), body))
        }
    }
}

pub fn whoami_inner(state: &AppState, headers: &HeaderMap) -> Reply {
    let (auth, out) = match authenticate_request(state, headers) {
        Ok(ok) => ok,
        Err(reply) => return reply,
    };
    let p = &auth.principal;
    let body = json!({
        "status": "ok",
        "user": p.user_id,
        "full_name": p.full_name,
        "email": p.email,
        "groups": p.groups,
        "login": auth.kind,
    });
    (StatusCode::OK, out, Json(body))
}

pub fn logout_inner(state: &AppState, headers: &HeaderMap) -> Reply {
    if let Some(sid) = parse_cookie(headers, SESSION_COOKIE) {
        state.sessions.logout(&sid);
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"status":"ok"})))
}

/// Force a reload. Only members of the admin group may call it.
pub fn reload_inner(state: &AppState, headers: &HeaderMap) -> Reply {
    let (auth, out) = match authenticate_request(state, headers) {
        Ok(ok) => ok,
        Err(reply) => return reply,
    };
    if !auth.principal.groups.contains(&state.admin_group) {
        warn!(user = %auth.principal.user_id, group = %state.admin_group, "reload refused, not an admin");
        return (StatusCode::FORBIDDEN, out, Json(json!({"status":"forbidden"})));
    }
    match state.reconciler.config().force_reload() {
        Ok(()) => {
            let current = state.reconciler.config().current();
            info!(user = %auth.principal.user_id, "configuration reloaded on request");
            (StatusCode::OK, out, Json(json!({"status":"ok","mappings": current.rules.mapping_count()})))
        }
        Err(e) => {
            warn!("reload rejected: {e}");
            let err = AppError::from(e);
            (StatusCode::BAD_REQUEST, out, Json(json!({"status":"error","code": err.code_str(),"message": err.message()})))
        }
    }
}

async fn whoami(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    whoami_inner(&state, &headers)
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    logout_inner(&state, &headers)
}

async fn reload(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    reload_inner(&state, &headers)
}
