//! Backend lifecycle contract.
//!
//! The pool never starts or stops processes itself. It calls a `Provisioner`,
//! which may run containers, spawn local processes, or do nothing at all when
//! backends are managed elsewhere.

use async_trait::async_trait;

use crate::error::Result;
use crate::node::ServerId;

/// Brings backends up and down on behalf of the pool.
///
/// # Thread Safety
///
/// Implementations are shared between the control plane and every routing
/// task, so they must be `Send + Sync`.
#[async_trait]
pub trait Provisioner: Send + Sync + 'static {
    /// Start the backend for a newly allocated server.
    ///
    /// Called once per server, before the server becomes routable. An error
    /// keeps the server out of the pool.
    async fn start(&self, id: ServerId, hostname: &str) -> Result<()>;

    /// Stop and clean up the backend named `hostname`.
    async fn stop(&self, hostname: &str) -> Result<()>;

    /// Network address (`host:port`) the dispatcher forwards to.
    async fn resolve_address(&self, hostname: &str) -> Result<String>;

    /// Hostname for a server the caller did not name.
    fn hostname_for(&self, id: ServerId) -> String {
        format!("server-{id}")
    }

    /// Get the provisioner name (for logging/debugging).
    fn name(&self) -> &'static str;
}
