use std::process::ExitCode;
use std::sync::Arc;

use config::PanelConfig;
use runtime::docker::{self, DockerRuntime};

mod api;
mod cli;
mod config;
mod logs;
mod runtime;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize the logger
    env_logger::init();

    let config = match PanelConfig::try_init() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Unable to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Nothing works without the daemon, so this is fatal.
    let client = match docker::connect().await {
        Ok(client) => client,
        Err(e) => {
            log::error!("Failed to connect to Docker daemon: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let state = Arc::new(api::AppState {
        runtime: Arc::new(DockerRuntime::new(client, config.stop_timeout)),
        default_image: config.default_image.clone(),
    });
    let app = api::router(state, config.static_dir.as_deref());

    let listener = match tokio::net::TcpListener::bind(config.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Unable to bind {}: {}", config.listen, e);
            return ExitCode::FAILURE;
        }
    };

    log::info!("Listening on {}", config.listen);
    let _ = sd_notify::notify(false, &[sd_notify::NotifyState::Ready]);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        log::error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    log::info!("Shut down cleanly");
    ExitCode::SUCCESS
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Unable to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Unable to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }

    log::info!("Shutdown signal received");
    let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Stopping]);
}
