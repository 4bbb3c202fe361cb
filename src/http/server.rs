//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the axum Router: every request falls through to the gateway
//! - Wire up tower layers (request id, tracing)
//! - Serve on a listener until the shutdown signal fires

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::pipeline::Gateway;

pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            router: Self::build_router(gateway),
        }
    }

    /// Outermost layer last: request id is assigned before tracing sees it.
    fn build_router(gateway: Arc<Gateway>) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(gateway)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The assembled router, for serving or for driving with `oneshot`.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn dispatch(State(gateway): State<Arc<Gateway>>, request: Request) -> Response {
    gateway.handle(request).await
}
