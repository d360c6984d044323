mod api;
mod config;
mod cors;
mod error;
mod reaper;
mod rooms;
mod store;
mod ws;

use anyhow::Context;
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use config::ServerConfig;
use reaper::{start_reaper, ReaperConfig};
use rooms::RoomRegistry;
use std::time::Instant;
use store::SessionStore;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::{
    attach_request_id_header, request_id_from_headers_or_generate, with_request_id_scope,
};

const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let store = SessionStore::default();
    let rooms = RoomRegistry::default();
    let reaper = start_reaper(
        store.clone(),
        ReaperConfig {
            tick_interval: config.reap_interval,
            idle_timeout: config.session_idle_timeout,
            max_age: config.session_max_age,
        },
    );

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.listen_addr))?;

    info!(listen_addr = %config.listen_addr, "starting codepair server");

    let app = build_router(store, rooms, config);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited unexpectedly")?;

    // Stop the reclamation loop before the process exits so no timer
    // outlives the server.
    reaper.shutdown().await;
    Ok(())
}

fn build_router(store: SessionStore, rooms: RoomRegistry, config: ServerConfig) -> Router {
    let api_state = api::ApiState::new(store.clone(), config.clone());
    apply_middleware(
        Router::new()
            .merge(api::router(api_state))
            .merge(ws::router(store, rooms))
            .fallback(api::not_found),
        &config,
    )
}

fn apply_middleware(router: Router, config: &ServerConfig) -> Router {
    router
        .layer(cors::cors_layer(config.cors_origins.as_deref()))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(middleware::from_fn(request_context_middleware))
        .layer(middleware::from_fn(panic_handler))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}

async fn panic_handler(request: Request<Body>, next: Next) -> Response {
    match tokio::spawn(async move { next.run(request).await }).await {
        Ok(response) => response,
        Err(join_error) => {
            error!(?join_error, "request handling panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn request_context_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = request_id_from_headers_or_generate(request.headers());

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started_at = Instant::now();

    let mut response = with_request_id_scope(request_id.clone(), next.run(request)).await;

    attach_request_id_header(&mut response, &request_id);

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started_at.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}
