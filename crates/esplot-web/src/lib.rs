//! ESPlot Web Server
//!
//! Axum server in front of the broadcast hub: producers submit plots to
//! `/new`, viewers connect to `/websocket`.

pub mod routes;
pub mod state;
pub mod websocket;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use esplot_core::{BrokerConfig, Hub};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = DefaultBodyLimit::max(state.config.max_payload_bytes);

    let mut router = Router::new()
        .route("/", get(routes::viewer::index))
        .route("/index.html", get(routes::viewer::index))
        .route("/websocket", get(websocket::ws_handler))
        .route("/new", post(routes::ingress::submit).layer(body_limit))
        .route("/status", get(routes::status::get_status));

    if let Some(dir) = &state.config.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind the configured address and run until `shutdown` resolves.
pub async fn run_server(
    config: BrokerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_address()).await?;
    serve(listener, config, shutdown).await
}

/// Run the broker on an already bound listener.
///
/// When `shutdown` resolves the hub is stopped first, which releases every
/// viewer session, then the HTTP server drains.
pub async fn serve(
    listener: TcpListener,
    config: BrokerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    config.validate()?;

    let (hub, hub_task) = Hub::spawn(config.hub_capacity);
    let app = create_router(AppState::new(hub.clone(), config));

    tracing::info!("Web server listening on http://{}", listener.local_addr()?);

    let signal_hub = hub.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutting down, releasing viewer sessions");
            signal_hub.shutdown();
        })
        .await?;

    hub.shutdown();
    let stats = hub_task.await?;
    tracing::info!(
        broadcasts = stats.broadcasts,
        deliveries = stats.deliveries,
        evictions = stats.evictions,
        "Web server stopped"
    );
    Ok(())
}
