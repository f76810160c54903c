use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use driver_companion::api;
use driver_companion::config::Config;
use driver_companion::error::AppError;
use driver_companion::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.compact().init();
    }

    if config.opencage_api_key.is_none() {
        tracing::warn!("OPENCAGE_API_KEY not set; destinations will use the fallback point");
    }

    let shared_state = Arc::new(AppState::from_config(&config)?);
    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("127.0.0.1:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        backend_url = %config.backend_url,
        "companion service started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    if let Some(mut session) = shared_state.session.lock().await.take() {
        session.progress.teardown();
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
