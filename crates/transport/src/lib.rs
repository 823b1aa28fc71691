//! HTTP surface of the load balancer.
//!
//! This crate provides the collaborators around the core:
//! - JSON wire types and the `successful`/`failure` envelope
//! - axum handlers for the control plane and the routed data plane
//! - A hyper-based `Forwarder`
//! - The replica backend application
//! - Signal-driven graceful shutdown
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/rep` | Pool status |
//! | POST | `/add` | Add servers |
//! | DELETE | `/rm` | Remove servers |
//! | GET | any other path | Routed to a backend |

pub mod codec;
pub mod forward;
pub mod handlers;
pub mod protocol;
pub mod replica;
pub mod server;
pub mod shutdown;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use corelib::{Dispatcher, ServerPool};

pub use codec::{ApiError, Envelope, FailureMessage, Status};
pub use forward::{HttpForwarder, DEFAULT_FORWARD_TIMEOUT};
pub use protocol::{ReplicaSet, ScalePayload};
pub use replica::{replica_router, Greeting};
pub use server::serve_until;
pub use shutdown::shutdown_signal;

/// Shared state for the load balancer handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn pool(&self) -> &Arc<ServerPool> {
        self.dispatcher.pool()
    }
}

/// Build the load balancer router (control plane + routed fallback).
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/rep", get(handlers::replica_status))
        .route("/add", post(handlers::add_servers))
        .route("/rm", delete(handlers::remove_servers))
        .fallback(handlers::route_request)
        .with_state(state)
}
