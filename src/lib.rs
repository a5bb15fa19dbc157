//! State core of the iCATERYou catering storefront.
//!
//! Embedders either wire a [`Marketplace`] over their own [`PersistentStore`] or call
//! [`bootstrap`] to read configuration from the environment, install tracing and open the
//! file-backed store.

pub mod config;
pub mod error;
pub mod marketplace;
pub mod store;
pub mod telemetry;

use std::sync::Arc;

pub use error::{AppError, ErrorKind, MarketplaceError};
pub use marketplace::Marketplace;
pub use store::{FileStore, MemoryStore, PersistentStore, StoreError};

use config::AppConfig;

/// Open the file-backed marketplace described by `config`.
pub fn open(config: &AppConfig) -> Result<Marketplace<FileStore>, MarketplaceError> {
    let store = Arc::new(FileStore::new(config.store.directory.clone()));
    Marketplace::open(store, &config.store, config.marketplace)
}

/// Load configuration, install the tracing subscriber and open the marketplace.
pub fn bootstrap() -> Result<Marketplace<FileStore>, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config)?;
    let marketplace = open(&config)?;
    tracing::info!(
        environment = ?config.environment,
        store = %config.store.directory.display(),
        "marketplace ready"
    );
    Ok(marketplace)
}
