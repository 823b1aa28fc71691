//! Load balancer server lifecycle.

use std::future::Future;

use corelib::Dispatcher;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{build_router, AppState};

/// Serve the load balancer on `listener` until `shutdown` resolves.
///
/// When the signal fires the pool is closed first, so routed requests that
/// arrive during the drain get `ShuttingDown`. In-flight requests finish,
/// then every live backend is stopped.
pub async fn serve_until<F>(
    listener: TcpListener,
    dispatcher: Dispatcher,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let pool = dispatcher.pool().clone();
    let router = build_router(AppState::new(dispatcher));

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "load balancer listening");
    }

    let closing = pool.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.await;
            closing.close();
        })
        .await?;

    let failures = pool.shutdown().await;
    for failure in &failures {
        warn!(hostname = %failure.hostname, error = %failure.error, "backend teardown failed");
    }
    info!(failed = failures.len(), "load balancer stopped");
    Ok(())
}
