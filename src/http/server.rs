//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble the Axum router from registered route and middleware closures
//! - Mount routes under the API prefix
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve until shutdown is triggered or the process is signalled

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::error::BoxError;
use crate::lifecycle::{signals, ShutdownSignal};

/// Adds routes to the API router.
pub type RouteFn = Arc<dyn Fn(Router) -> Router + Send + Sync>;

/// Wraps the whole application router.
pub type MiddlewareFn = Arc<dyn Fn(Router) -> Router + Send + Sync>;

/// Everything a launcher needs to serve the application.
#[derive(Clone)]
pub struct ServePlan {
    pub addr: SocketAddr,
    pub public_url: String,
    /// Normalized prefix (`/app`), or empty to mount at the root.
    pub prefix: String,
    pub routes: Vec<RouteFn>,
    pub middleware: Vec<MiddlewareFn>,
    pub request_timeout: Duration,
    pub shutdown: ShutdownSignal,
}

impl fmt::Debug for ServePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServePlan")
            .field("addr", &self.addr)
            .field("public_url", &self.public_url)
            .field("prefix", &self.prefix)
            .field("routes", &self.routes.len())
            .field("middleware", &self.middleware.len())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Starts the HTTP listener and blocks until it stops.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn serve(&self, plan: ServePlan) -> Result<(), BoxError>;
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(plan: &ServePlan) -> Router {
    let api = plan
        .routes
        .iter()
        .fold(Router::new(), |router, route| route(router));

    let app = if plan.prefix.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(&plan.prefix, api)
    };

    let app = plan
        .middleware
        .iter()
        .fold(app, |router, middleware| middleware(router));

    app.layer(TimeoutLayer::new(plan.request_timeout))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Default launcher backed by `axum::serve`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpServer;

#[async_trait]
impl Launcher for HttpServer {
    async fn serve(&self, plan: ServePlan) -> Result<(), BoxError> {
        let listener = TcpListener::bind(plan.addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(
            address = %local_addr,
            url = %plan.public_url,
            routes = plan.routes.len(),
            "HTTP server listening"
        );

        let app = build_router(&plan);
        let shutdown = plan.shutdown;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown.recv() => {},
                    _ = signals::terminate() => {},
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
