//! Request dispatch: pick a backend for a path and forward to it.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::hash::path_request_id;
use crate::network::{ForwardResponse, Forwarder};
use crate::node::ServerRecord;
use crate::pool::ServerPool;

/// How a request id is derived from an inbound request.
///
/// `Path` hashes the request path, so repeated requests for the same path
/// stick to one backend while the ring is unchanged. `Random` draws a fresh id
/// per request and spreads identical paths across the pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestIdPolicy {
    #[default]
    Path,
    Random,
}

impl RequestIdPolicy {
    /// Request id for `path` under this policy.
    pub fn request_id(self, path: &str) -> u64 {
        match self {
            RequestIdPolicy::Path => path_request_id(path),
            RequestIdPolicy::Random => rand::random(),
        }
    }
}

impl FromStr for RequestIdPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "path" => Ok(RequestIdPolicy::Path),
            "random" => Ok(RequestIdPolicy::Random),
            other => Err(Error::InvalidConfig(format!(
                "unknown request id policy '{other}'"
            ))),
        }
    }
}

/// Routes data-plane requests to live backends.
///
/// Cheap to clone; all clones share the pool and forwarder. The dispatcher
/// does not retry or fail over: a failed forward is returned to the caller.
#[derive(Clone)]
pub struct Dispatcher {
    pool: Arc<ServerPool>,
    forwarder: Arc<dyn Forwarder>,
    policy: RequestIdPolicy,
}

impl Dispatcher {
    pub fn new(pool: Arc<ServerPool>, forwarder: Arc<dyn Forwarder>, policy: RequestIdPolicy) -> Self {
        Self {
            pool,
            forwarder,
            policy,
        }
    }

    /// The pool this dispatcher routes over.
    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    pub fn policy(&self) -> RequestIdPolicy {
        self.policy
    }

    /// Backend that currently owns `path`, without forwarding.
    pub fn target(&self, path: &str) -> Result<ServerRecord> {
        if self.pool.is_closed() {
            return Err(Error::ShuttingDown);
        }
        self.pool.resolve(self.policy.request_id(path))
    }

    /// Forward `GET path` to the backend that owns it and relay the answer.
    ///
    /// # Errors
    /// - `NotFound` / `BackendNotRegistered` if no live server owns the path
    /// - `ForwardingFailed` if the backend could not be reached
    /// - `EndpointNotServed` if the backend answered 404
    /// - `ShuttingDown` once the pool is closed
    pub async fn route(&self, path: &str) -> Result<ForwardResponse> {
        let outcome = self.route_inner(path).await;
        metrics::counter!("lb_routed_requests_total", "outcome" => outcome_label(&outcome))
            .increment(1);
        outcome
    }

    async fn route_inner(&self, path: &str) -> Result<ForwardResponse> {
        let record = self.target(path).inspect_err(|e| {
            warn!(%path, error = %e, "no backend for request");
        })?;
        let address = self.pool.resolve_address(&record.hostname).await?;
        debug!(%path, server = %record.id, %address, "forwarding request");

        let response = self
            .forwarder
            .forward(&record.hostname, &address, path)
            .await
            .inspect_err(|e| warn!(%path, server = %record.id, error = %e, "forward failed"))?;

        if response.is_not_found() {
            return Err(Error::EndpointNotServed {
                path: path.to_string(),
            });
        }
        Ok(response)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pool", &self.pool)
            .field("policy", &self.policy)
            .finish()
    }
}

fn outcome_label(outcome: &Result<ForwardResponse>) -> &'static str {
    match outcome {
        Ok(_) => "ok",
        Err(Error::NotFound) | Err(Error::BackendNotRegistered(_)) => "no_backend",
        Err(Error::EndpointNotServed { .. }) => "not_served",
        Err(Error::ForwardingFailed { .. }) => "forward_failed",
        Err(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ServerId;
    use crate::pool::PoolConfig;
    use crate::provision::Provisioner;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct NoopProvisioner;

    #[async_trait]
    impl Provisioner for NoopProvisioner {
        async fn start(&self, _id: ServerId, _hostname: &str) -> Result<()> {
            Ok(())
        }
        async fn stop(&self, _hostname: &str) -> Result<()> {
            Ok(())
        }
        async fn resolve_address(&self, hostname: &str) -> Result<String> {
            Ok(format!("{hostname}:5000"))
        }
        fn name(&self) -> &'static str {
            "noop"
        }
    }

    /// Answers `/home` with the hostname, 404 otherwise; records calls.
    #[derive(Default)]
    struct EchoForwarder {
        calls: Mutex<Vec<(String, String)>>,
        down: bool,
    }

    #[async_trait]
    impl Forwarder for EchoForwarder {
        async fn forward(&self, hostname: &str, address: &str, path: &str) -> Result<ForwardResponse> {
            self.calls.lock().push((address.to_string(), path.to_string()));
            if self.down {
                return Err(Error::ForwardingFailed {
                    hostname: hostname.to_string(),
                    reason: "connection refused".into(),
                });
            }
            match path {
                "/home" => Ok(ForwardResponse::new(200, format!("hello from {hostname}"))),
                _ => Ok(ForwardResponse::new(404, "")),
            }
        }
    }

    fn dispatcher(forwarder: Arc<EchoForwarder>, policy: RequestIdPolicy) -> Dispatcher {
        let pool = ServerPool::new(PoolConfig::default(), Arc::new(NoopProvisioner)).unwrap();
        Dispatcher::new(Arc::new(pool), forwarder, policy)
    }

    #[tokio::test]
    async fn test_route_empty_pool_is_not_found() {
        let d = dispatcher(Arc::new(EchoForwarder::default()), RequestIdPolicy::Path);
        assert_eq!(d.route("/home").await, Err(Error::NotFound));
    }

    #[tokio::test]
    async fn test_route_relays_backend_answer() {
        let forwarder = Arc::new(EchoForwarder::default());
        let d = dispatcher(forwarder.clone(), RequestIdPolicy::Path);
        d.pool().add(1, vec!["s1".into()]).await.unwrap();

        let response = d.route("/home").await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "hello from s1");
        assert_eq!(
            forwarder.calls.lock().as_slice(),
            &[("s1:5000".to_string(), "/home".to_string())]
        );
    }

    #[tokio::test]
    async fn test_backend_404_is_endpoint_not_served() {
        let d = dispatcher(Arc::new(EchoForwarder::default()), RequestIdPolicy::Path);
        d.pool().add(1, vec!["s1".into()]).await.unwrap();

        assert_eq!(
            d.route("/missing").await,
            Err(Error::EndpointNotServed {
                path: "/missing".into()
            })
        );
    }

    #[tokio::test]
    async fn test_transport_failure_is_forwarding_failed() {
        let forwarder = Arc::new(EchoForwarder {
            down: true,
            ..Default::default()
        });
        let d = dispatcher(forwarder, RequestIdPolicy::Random);
        d.pool().add(2, vec![]).await.unwrap();

        assert!(matches!(
            d.route("/home").await,
            Err(Error::ForwardingFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_path_policy_is_sticky() {
        let d = dispatcher(Arc::new(EchoForwarder::default()), RequestIdPolicy::Path);
        d.pool().add(5, vec![]).await.unwrap();

        let first = d.target("/home").unwrap();
        for _ in 0..20 {
            assert_eq!(d.target("/home").unwrap(), first);
        }
    }

    #[tokio::test]
    async fn test_closed_pool_refuses_routes() {
        let d = dispatcher(Arc::new(EchoForwarder::default()), RequestIdPolicy::Path);
        d.pool().add(1, vec![]).await.unwrap();
        assert!(d.pool().shutdown().await.is_empty());
        assert_eq!(d.route("/home").await, Err(Error::ShuttingDown));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("path".parse::<RequestIdPolicy>().unwrap(), RequestIdPolicy::Path);
        assert_eq!("Random".parse::<RequestIdPolicy>().unwrap(), RequestIdPolicy::Random);
        assert!("sticky".parse::<RequestIdPolicy>().is_err());
    }
}
