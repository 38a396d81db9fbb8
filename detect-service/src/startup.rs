//! Application startup and lifecycle management.

use crate::config::{DetectConfig, StorageBackend};
use crate::services::{
    Database, DiseaseCatalog, GcsStorage, HistoryService, LocalStorage, PredictionClient, Storage,
};
use service_core::error::AppError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: DetectConfig,
    pub db: Database,
    pub storage: Arc<dyn Storage>,
    pub history: HistoryService,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: DetectConfig) -> Result<Self, AppError> {
        let catalog = Arc::new(DiseaseCatalog::load(&config.catalog.path)?);

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        let storage: Arc<dyn Storage> = match config.storage.backend {
            StorageBackend::Local => {
                let local_path = config.storage.local_path.as_deref().ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!(
                        "STORAGE_LOCAL_PATH is required for the local backend"
                    ))
                })?;
                let public_base_url =
                    config.storage.local_public_base_url.as_deref().ok_or_else(|| {
                        AppError::ConfigError(anyhow::anyhow!(
                            "STORAGE_LOCAL_PUBLIC_BASE_URL is required for the local backend"
                        ))
                    })?;
                Arc::new(LocalStorage::new(local_path, public_base_url).await?)
            }
            StorageBackend::Gcs => {
                let bucket = config.storage.gcs_bucket.as_deref().ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!(
                        "STORAGE_GCS_BUCKET is required for the gcs backend"
                    ))
                })?;
                Arc::new(GcsStorage::new(
                    config.storage.gcs_api_base.clone(),
                    bucket,
                    config.storage.gcs_access_token.clone(),
                ))
            }
        };

        let predictor = PredictionClient::new(&config.predictor)?;

        let history = HistoryService::new(
            db.clone(),
            predictor,
            storage.clone(),
            catalog,
        );

        let state = AppState {
            config: config.clone(),
            db,
            storage,
            history,
        };

        // Bind listener (port 0 = random port for testing)
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Detect service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the application state for use in tests.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = crate::build_router(self.state);
        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
