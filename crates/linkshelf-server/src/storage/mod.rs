//! Storage layer
//!
//! SQLite through sqlx for persistent deployments, DashMap for a throwaway
//! in-memory store. Both implement the same ports.

pub mod db;
pub mod memory;

pub use db::Database;
pub use memory::MemoryStore;

use crate::config::{ServerConfig, StoreKind};
use linkshelf_core::ports::Storage;
use std::sync::Arc;
use tracing::info;

/// Open the backend selected by `DATABASE_URL`
pub async fn connect(config: &ServerConfig) -> anyhow::Result<Arc<dyn Storage>> {
    match config.store_kind() {
        StoreKind::Memory => {
            info!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreKind::Sqlite(url) => Ok(Arc::new(Database::connect(&url).await?)),
    }
}
