use std::sync::Arc;

use booking_dispatch::api;
use booking_dispatch::config::{Config, LogFormat};
use booking_dispatch::error::AppError;
use booking_dispatch::state::AppState;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    init_tracing(&config);

    let shared_state = Arc::new(AppState::new(&config));
    let app = api::rest::router(shared_state.clone());

    let cancel = CancellationToken::new();
    let scheduler = tokio::spawn(shared_state.scheduler.clone().run(cancel.clone()));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        auto_assign_interval_secs = config.auto_assign_interval.as_secs(),
        "http server started"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")));

    cancel.cancel();
    if let Err(err) = scheduler.await {
        tracing::error!(error = %err, "auto-assign scheduler task failed");
    }

    served
}

fn init_tracing(config: &Config) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
