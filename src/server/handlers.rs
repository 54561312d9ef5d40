// file: src/server/handlers.rs
// version: 1.0.0
// guid: 2b7f9c41-83d6-4e5a-91c0-f4a8d3e6b275

//! Route handlers for the registration service

use super::bootstrap::{render_bootstrap, BOOTSTRAP_FILE_NAME};
use super::error::ApiError;
use super::registration::{ConnectRequest, Registered};
use super::AppState;
use crate::KangarooError;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::info;

/// `GET /key`: the shared public key, unauthenticated
pub async fn get_key(State(state): State<AppState>) -> Result<Response, ApiError> {
    match state.keys.read_public_key().await? {
        Some(key) => Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], key).into_response()),
        None => Err(KangarooError::not_found("public key").into()),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DownloadQuery {
    pub token: Option<String>,
}

/// `GET /download?token=`: the bootstrap script as an attachment
pub async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Option<Query<DownloadQuery>>,
) -> Result<Response, ApiError> {
    let token = query.and_then(|Query(q)| q.token);
    if !state.token.verify(token.as_deref()) {
        return Err(KangarooError::AuthRejected.into());
    }

    let master = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(host_without_port)
        .filter(|h| !h.is_empty())
        .unwrap_or(state.fallback_address.as_str())
        .to_string();

    info!("Serving bootstrap script for master address {}", master);
    let script = render_bootstrap(&master, state.master_port, state.token.as_str());
    let disposition = format!("attachment; filename=\"{}\"", BOOTSTRAP_FILE_NAME);

    Ok((
        [
            (header::CONTENT_TYPE, "application/x-sh".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        script,
    )
        .into_response())
}

/// `POST /connect`: token gate, field gate, then configure target users
pub async fn connect(State(state): State<AppState>, body: Bytes) -> Result<Json<Registered>, ApiError> {
    let registration = ConnectRequest::from_body(&body)
        .authenticate(&state.token)?
        .validate()?;

    let registrar = state.registrar.clone();
    let registered = tokio::task::spawn_blocking(move || registrar.register(registration))
        .await
        .map_err(|e| KangarooError::system(format!("registration task failed: {}", e)))??;

    Ok(Json(registered))
}

/// Strip a trailing `:port` from a Host header value, keeping IPv6 brackets
fn host_without_port(host: &str) -> &str {
    let host = host.trim();
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
