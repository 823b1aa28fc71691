//! Replica backend application.
//!
//! The process the provisioner starts for every server: `/home` greets with
//! the server's id and `/heartbeat` answers 200 for liveness checks.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

/// Body of `GET /home`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeting {
    pub message: String,
}

/// Router for a replica identified by `id`.
pub fn replica_router(id: impl Into<String>) -> Router {
    Router::new()
        .route("/home", get(home))
        .route("/heartbeat", get(heartbeat))
        .with_state(id.into())
}

async fn home(State(id): State<String>) -> Json<Greeting> {
    Json(Greeting {
        message: format!("Hello from Server: {id}"),
    })
}

async fn heartbeat() -> StatusCode {
    StatusCode::OK
}
