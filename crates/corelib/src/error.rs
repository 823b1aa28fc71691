//! Error types for the core library.

use std::time::Duration;

use thiserror::Error;

use crate::node::ServerId;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed or inconsistent control-plane payload. Nothing was mutated.
    #[error("{0}")]
    Validation(String),

    /// No empty cell was found for one of the server's virtual nodes.
    #[error("ring is full: server {server} placed {placed} of {required} virtual nodes")]
    RingFull {
        server: ServerId,
        placed: usize,
        required: usize,
    },

    /// A removal asked for more servers than were live.
    #[error("requested removal of {requested} servers but only {removed} were live")]
    InsufficientServers { requested: usize, removed: usize },

    /// The ring resolved to an id that has no pool record.
    #[error("server {0} is not registered")]
    BackendNotRegistered(ServerId),

    /// The ring has no occupied cell.
    #[error("no server available to handle the request")]
    NotFound,

    /// The backend could not be reached or did not answer.
    #[error("forwarding to {hostname} failed: {reason}")]
    ForwardingFailed { hostname: String, reason: String },

    /// The backend answered but does not serve the path.
    #[error("'{path}' endpoint does not exist in server replicas")]
    EndpointNotServed { path: String },

    /// Starting or stopping a backend failed.
    #[error("provisioning {hostname} failed: {reason}")]
    ProvisioningFailed { hostname: String, reason: String },

    /// The control-plane lock was not acquired in time.
    #[error("timed out after {0:?} waiting for another pool mutation")]
    LockTimeout(Duration),

    /// Work arrived after shutdown started.
    #[error("load balancer is shutting down")]
    ShuttingDown,

    /// Invalid ring or pool configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Shorthand for a validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }
}
