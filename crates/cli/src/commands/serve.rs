//! Run the reference cart API.
//!
//! # Usage
//!
//! ```bash
//! cartsync serve
//! CART_SERVER_PORT=4100 CART_SERVER_CATALOG=catalog.json cartsync serve
//! ```

use cartsync_server::{AppState, Catalog, CatalogError, ConfigError, ServerConfig};
use thiserror::Error;

use crate::telemetry;

/// Errors that can stop the server.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serve until Ctrl+C or SIGTERM.
pub async fn run() -> Result<(), ServeError> {
    let config = ServerConfig::from_env()?;
    let _sentry_guard = telemetry::init(
        config.sentry_dsn.as_deref(),
        config.sentry_environment.clone(),
    );

    let catalog = match &config.catalog_path {
        Some(path) => Catalog::load(path)?,
        None => {
            tracing::info!("No catalog configured, accepting every variant");
            Catalog::open()
        }
    };

    let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
    let state = AppState::new(config, catalog);

    cartsync_server::serve(listener, state, cartsync_server::shutdown_signal()).await?;
    Ok(())
}
