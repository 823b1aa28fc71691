//! HTTP forwarder.
//!
//! One HTTP/1 connection per routed request: connect, handshake, send
//! `GET path`, collect the body. Backends are addressed by `host:port`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use corelib::{Error, ForwardResponse, Forwarder, Result};
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::debug;

/// Default budget for one forwarded request, connect included.
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

/// Forwards routed requests over plain HTTP/1.1.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    timeout: Duration,
}

impl HttpForwarder {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn exchange(&self, address: &str, path: &str) -> std::result::Result<ForwardResponse, String> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| format!("connect: {e}"))?;
        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| format!("handshake: {e}"))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "backend connection closed with error");
            }
        });

        let request = http::Request::builder()
            .method(http::Method::GET)
            .uri(path)
            .header(http::header::HOST, address)
            .header(http::header::USER_AGENT, "ring-balancer/0.1")
            .body(Empty::<Bytes>::new())
            .map_err(|e| format!("request: {e}"))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| format!("send: {e}"))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| format!("body: {e}"))?
            .to_bytes();

        Ok(ForwardResponse {
            status,
            content_type,
            body,
        })
    }
}

impl Default for HttpForwarder {
    fn default() -> Self {
        Self::new(DEFAULT_FORWARD_TIMEOUT)
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, hostname: &str, address: &str, path: &str) -> Result<ForwardResponse> {
        let outcome = tokio::time::timeout(self.timeout, self.exchange(address, path)).await;
        let reason = match outcome {
            Ok(Ok(response)) => {
                debug!(%hostname, %address, %path, status = response.status, "backend answered");
                return Ok(response);
            }
            Ok(Err(reason)) => reason,
            Err(_) => format!("timed out after {:?}", self.timeout),
        };
        Err(Error::ForwardingFailed {
            hostname: hostname.to_string(),
            reason,
        })
    }
}
