//! HTTP handlers.
//!
//! Implements:
//! - POST /heartbeat - lock verdicts for every resource the poll asks about
//! - GET /api/resources/{key} - current document
//! - GET /api/resources/{key}/nonce - anti-forgery nonce for saving
//! - POST /api/resources/{key}/save - lock-gated save
//! - GET /health - Health check endpoint

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use futures::future::try_join_all;
use scratchpad_core::heartbeat::{
    read_request, write_status, Fields, LockStatus, NonceResponse, ResourceResponse, SaveRequest,
    SaveResponse,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::auth::Caller;
use crate::error::{ApiError, Result};
use crate::nonce::NonceIssuer;
use crate::state::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub resources: Vec<String>,
}

/// GET /health - Health check endpoint.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        resources: state.resources.iter().map(|r| r.to_string()).collect(),
    })
}

/// POST /heartbeat - one poll tick.
///
/// The body is a flat object of `{key}_check` / `{key}_is_editing` fields; the
/// reply carries `{key}_status` (and owner/content when locked) for each
/// checked resource. A storage failure fails the whole poll so the client
/// keeps its previous state.
pub async fn heartbeat_handler(
    State(state): State<AppState>,
    Caller(identity): Caller,
    body: Bytes,
) -> Result<Json<Fields>> {
    let fields: Fields = serde_json::from_slice(&body)?;
    let entries = read_request(&fields, state.resources.iter());

    let verdicts = try_join_all(entries.iter().map(|entry| {
        state
            .manager
            .evaluate(&entry.key, &identity.id, entry.is_editing)
    }))
    .await?;

    let mut reply = Fields::new();
    for (entry, verdict) in entries.iter().zip(verdicts.iter()) {
        debug!(
            "Heartbeat {} from {} (editing: {}): {:?}",
            entry.key,
            identity.id,
            entry.is_editing,
            LockStatus::from(verdict)
        );
        write_status(&mut reply, &entry.key, &LockStatus::from(verdict));
    }

    Ok(Json(reply))
}

/// GET /api/resources/{key} - current document content.
pub async fn get_resource_handler(
    State(state): State<AppState>,
    Caller(_identity): Caller,
    Path(key): Path<String>,
) -> Result<Json<ResourceResponse>> {
    let key = state.resource(&key)?;
    let document = state.saver.load(&key).await?;

    Ok(Json(match document {
        Some(doc) => ResourceResponse {
            key,
            content: doc.content,
            modified_at: Some(doc.modified_at),
            modified_by: doc.modified_by,
        },
        None => ResourceResponse {
            key,
            content: String::new(),
            modified_at: None,
            modified_by: None,
        },
    }))
}

/// GET /api/resources/{key}/nonce - nonce bound to the caller and this resource.
pub async fn nonce_handler(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(key): Path<String>,
) -> Result<Json<NonceResponse>> {
    let key = state.resource(&key)?;
    let nonce = state
        .nonces
        .issue(&identity.id, &NonceIssuer::save_action(&key));
    Ok(Json(NonceResponse { nonce }))
}

/// POST /api/resources/{key}/save - commit new content.
///
/// The nonce is checked before anything else touches storage. The lock is
/// re-read here rather than trusting the caller's last poll.
pub async fn save_handler(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<Json<SaveResponse>> {
    let key = state.resource(&key)?;
    let request: SaveRequest = serde_json::from_slice(&body)?;

    if !state
        .nonces
        .verify(&request.nonce, &identity.id, &NonceIssuer::save_action(&key))
    {
        return Err(ApiError::InvalidNonce);
    }

    let ack = state.saver.save(&key, &identity.id, &request.content).await?;
    info!("{} saved {} ({} bytes)", identity.id, key, ack.bytes);

    Ok(Json(SaveResponse {
        success: true,
        message: Some("Saved".to_string()),
    }))
}
