//! Admin API.
//!
//! # Routes
//! - `GET  /admin/status`    → [`HealthStatus`](crate::failover::HealthStatus)
//! - `GET  /admin/endpoints` → endpoint list with the active one flagged
//! - `POST /admin/failback`  → explicit failback (409 if the primary is down)
//!
//! All routes require `Authorization: Bearer <api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::failover::FailoverCoordinator;
use crate::health::Probe;
use crate::lifecycle::ShutdownSignal;
use self::auth::admin_auth_middleware;
use self::handlers::{get_endpoints, get_status, post_failback};

/// Requests taking longer than this are cut off. Failback probes the primary,
/// so this must exceed connect + read timeouts.
const ADMIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// State shared by admin handlers.
pub struct AdminState<P: Probe> {
    pub coordinator: Arc<FailoverCoordinator<P>>,
    pub api_key: Arc<str>,
}

impl<P: Probe> Clone for AdminState<P> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            api_key: Arc::clone(&self.api_key),
        }
    }
}

impl<P: Probe> AdminState<P> {
    pub fn new(coordinator: Arc<FailoverCoordinator<P>>, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            coordinator,
            api_key: api_key.into(),
        }
    }
}

#[allow(deprecated)]
pub fn setup_admin_router<P: Probe>(state: AdminState<P>) -> Router {
    Router::new()
        .route("/admin/status", get(get_status::<P>))
        .route("/admin/endpoints", get(get_endpoints::<P>))
        .route("/admin/failback", post(post_failback::<P>))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware::<P>,
        ))
        .layer(TimeoutLayer::new(ADMIN_REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until the shutdown signal fires.
pub async fn serve<P: Probe>(
    listener: TcpListener,
    state: AdminState<P>,
    mut shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            shutdown.wait().await;
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
