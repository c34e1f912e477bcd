//! Keymint registry server binary.
//!
//! Main application entry point that wires the registration coordinator to
//! its key manager and storage backends and starts the HTTP server with
//! graceful shutdown.

use anyhow::Result;
use keymint::{
    config::Config,
    http::{AppState, build_router},
    keymanager::{KeyManager, MemoryKeyManager, RemoteKeyManager},
    registry::{KeyedLocks, RegistrationCoordinator, TokenDomainGuard},
    storage::{create_storage_backend, parse_storage_backend},
};
use std::{env, sync::Arc};

use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "keymint=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();

    let version = keymint::config::version()?;

    env::args().for_each(|arg| {
        if arg == "--version" {
            println!("{version}");
            std::process::exit(0);
        }
    });

    tracing::info!(?version, "Starting keymint");

    let config = Config::new()?;

    // Build HTTP client with certificate bundles
    let mut client_builder = reqwest::Client::builder();
    for ca_certificate in config.certificate_bundles.as_ref() {
        tracing::info!("Loading CA certificate: {:?}", ca_certificate);
        let cert = std::fs::read(ca_certificate)?;
        let cert = reqwest::Certificate::from_pem(&cert)?;
        client_builder = client_builder.add_root_certificate(cert);
    }

    client_builder = client_builder
        .user_agent(config.user_agent.clone())
        .timeout(*config.http_client_timeout.as_ref());
    let http_client = client_builder.build()?;

    // Parse storage backend configuration
    let storage_backend =
        parse_storage_backend(&config.storage_backend, config.database_url.as_deref())?;
    let storage = create_storage_backend(storage_backend).await?;

    // Wire the key manager: remote when a base URL is configured, otherwise
    // the in-memory double
    let key_manager: Arc<dyn KeyManager> = match config.key_manager_base.as_ref() {
        Some(base) => {
            tracing::info!(base = %base, "Using remote key manager");
            Arc::new(RemoteKeyManager::new(http_client.clone(), base.clone()))
        }
        None => {
            tracing::warn!("KEY_MANAGER_BASE not set, using in-memory key manager");
            Arc::new(MemoryKeyManager::new())
        }
    };

    let token_locks = Arc::new(KeyedLocks::new());
    let coordinator = Arc::new(RegistrationCoordinator::new(
        key_manager.clone(),
        storage.clone(),
        token_locks.clone(),
        *config.default_token_validity.as_ref(),
    ));
    let domain_guard = Arc::new(TokenDomainGuard::new(
        key_manager,
        storage.clone(),
        token_locks,
    ));

    // Create application context
    let app_context = AppState {
        http_client,
        config: Arc::new(config.clone()),
        coordinator,
        domain_guard,
        storage,
    };

    // Build the router
    let app = build_router(app_context);

    // Setup graceful shutdown
    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    {
        let tracker = tracker.clone();
        let inner_token = token.clone();

        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::spawn(async move {
            tokio::select! {
                () = inner_token.cancelled() => { },
                _ = terminate => {},
                _ = ctrl_c => {},
            }

            tracker.close();
            inner_token.cancel();
        });
    }

    // Start HTTP server
    {
        let inner_config = config.clone();
        let http_port = *inner_config.http_port.as_ref();
        let inner_token = token.clone();
        tracker.spawn(async move {
            let bind_address = format!("0.0.0.0:{http_port}");
            tracing::info!("Starting server on {bind_address}");
            let listener = match TcpListener::bind(&bind_address).await {
                Ok(listener) => listener,
                Err(err) => {
                    tracing::error!("failed to bind {bind_address}: {err}");
                    inner_token.cancel();
                    return;
                }
            };

            let shutdown_token = inner_token.clone();
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    tokio::select! {
                        () = shutdown_token.cancelled() => { }
                    }
                    tracing::info!("axum graceful shutdown complete");
                })
                .await;
            if let Err(err) = result {
                tracing::error!("axum task failed: {}", err);
            }

            inner_token.cancel();
        });
    }

    tracker.wait().await;

    Ok(())
}
