pub mod handlers;

use axum::{http::HeaderName, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::storage::{
    models::{TOTAL_HEADER, TOTAL_PAGES_HEADER},
    PostStore,
};
use handlers::{get_post, list_posts};

/// Build the API router
pub fn create_router(storage: Arc<dyn PostStore>) -> Router {
    Router::new()
        .route("/wp/v2/posts", get(list_posts))
        .route("/wp/v2/posts/:id", get(get_post))
        .with_state(storage)
        // The editor reads the paging headers cross-origin
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers([
                    HeaderName::from_static(TOTAL_HEADER),
                    HeaderName::from_static(TOTAL_PAGES_HEADER),
                ]),
        )
}

/// Start the API server with graceful shutdown support
pub async fn start_server_with_shutdown(
    router: Router,
    port: u16,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let shutdown_signal = async {
        shutdown_signal.await;
        info!("🛑 Shutdown signal received, stopping server gracefully...");
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("✅ API server stopped gracefully");
    Ok(())
}
