//! Entry point for the `keel-gateway` HTTP server.

use std::{net::SocketAddr, sync::Arc};

use keel_gateway::{config::GatewayConfig, error::StartupError, routes::create_router, telemetry};
use tracing::info;

#[tokio::main]
async fn main() {
    let config = match GatewayConfig::from_env() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("keel-gateway: {e}");
            std::process::exit(1);
        }
    };

    let _guard = match telemetry::init(&config.logging, config.features.logging) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("keel-gateway: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "gateway stopped");
        std::process::exit(1);
    }
}

async fn run(config: Arc<GatewayConfig>) -> Result<(), StartupError> {
    let addr = config.server.listen_addr();
    let environment = config.server.environment_name.clone();
    let app = create_router(config)?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind { addr: addr.clone(), source })?;

    info!(addr = %addr, environment = %environment, "keel-gateway listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Serve)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
