//! Forwarding contract between the dispatcher and the transport.
//!
//! The dispatcher decides *where* a request goes; a `Forwarder` knows *how* to
//! deliver it. Keeping the HTTP client behind this trait lets the core route
//! without linking a network stack.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Status and body a backend answered with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwardResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl ForwardResponse {
    /// Response with no content type.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    /// True when the backend reported that it does not serve the path.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Delivers a request to a resolved backend address.
#[async_trait]
pub trait Forwarder: Send + Sync + 'static {
    /// Send `GET path` to `address` and return the backend's answer.
    ///
    /// Any status the backend sends back is `Ok`; `Err` is reserved for
    /// failing to get an answer at all (`ForwardingFailed`). Dropping the
    /// returned future cancels the outbound request.
    async fn forward(&self, hostname: &str, address: &str, path: &str) -> Result<ForwardResponse>;
}
