pub mod sqlite;

use std::sync::Arc;

use crate::config::{StorageConfig, resolve_path};
use async_trait::async_trait;
use eyre::{Context, Result};
use sqlite::Sqlite;

/// Durable client storage: string values under string keys.
#[async_trait]
pub trait Storage {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;
    async fn remove_item(&self, key: &str) -> Result<()>;
}

pub type ArcStorage = Arc<dyn Storage + Send + Sync>;

pub async fn new_storage(config: &StorageConfig) -> Result<ArcStorage> {
    let storage = match config {
        StorageConfig::Sqlite(sqlite_config) => {
            let path = match sqlite_config.path() {
                Some(path) => Some(
                    resolve_path(path).wrap_err(format!("resolving sqlite path {}", path))?,
                ),
                None => None,
            };
            Arc::new(Sqlite::new(path.as_deref()).await?)
        }
    };
    Ok(storage)
}
