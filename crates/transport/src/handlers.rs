//! Load balancer handlers.
//!
//! The control plane (`/rep`, `/add`, `/rm`) answers in the JSON envelope.
//! Every other `GET` is routed to a backend and the backend's answer is
//! relayed as-is; routing failures use the envelope.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use corelib::{Error, ForwardResponse};
use tracing::{info, warn};

use crate::codec::{ApiError, Envelope, FailureMessage};
use crate::protocol::{ReplicaSet, ScalePayload};
use crate::AppState;

// ── Control plane ──────────────────────────────────────────────

/// GET /rep
pub async fn replica_status(State(state): State<AppState>) -> Json<Envelope<ReplicaSet>> {
    Json(Envelope::successful(state.pool().snapshot().into()))
}

/// POST /add
pub async fn add_servers(
    State(state): State<AppState>,
    payload: Result<Json<ScalePayload>, JsonRejection>,
) -> Result<Json<Envelope<ReplicaSet>>, ApiError> {
    let Json(payload) = payload.map_err(reject_payload)?;
    info!(n = payload.n, hostnames = ?payload.hostnames, "add requested");

    let snapshot = state.pool().add(payload.n, payload.hostnames).await?;
    Ok(Json(Envelope::successful(snapshot.into())))
}

/// DELETE /rm
pub async fn remove_servers(
    State(state): State<AppState>,
    payload: Result<Json<ScalePayload>, JsonRejection>,
) -> Result<Json<Envelope<ReplicaSet>>, ApiError> {
    let Json(payload) = payload.map_err(reject_payload)?;
    info!(n = payload.n, hostnames = ?payload.hostnames, "remove requested");

    let snapshot = state.pool().remove(payload.n, payload.hostnames).await?;
    Ok(Json(Envelope::successful(snapshot.into())))
}

fn reject_payload(rejection: JsonRejection) -> ApiError {
    warn!(error = %rejection, "malformed control payload");
    ApiError(Error::validation(rejection.body_text()))
}

// ── Data plane ─────────────────────────────────────────────────

/// Any other path: forward `GET` to the backend that owns it.
pub async fn route_request(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET {
        let envelope = Envelope::failure(FailureMessage::Text(format!(
            "method {method} is not routed"
        )));
        return (StatusCode::METHOD_NOT_ALLOWED, Json(envelope)).into_response();
    }

    match state.dispatcher.route(uri.path()).await {
        Ok(response) => relay(response),
        Err(e) => ApiError(e).into_response(),
    }
}

fn relay(response: ForwardResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut relayed = (status, response.body).into_response();
    if let Some(value) = response
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        relayed.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    relayed
}
