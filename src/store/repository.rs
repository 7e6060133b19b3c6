#[cfg(test)]
#[path = "repository_test.rs"]
mod tests;

use eyre::{Context, Result};

use crate::config::constants::{CONVERSATIONS_KEY, DEFAULT_MODEL_KEY};
use crate::models::Catalog;
use crate::storage::ArcStorage;

use super::{ConversationStore, Snapshot, parse_conversations};

/// Reads and writes store snapshots as two independent storage keys.
pub struct Repository {
    storage: ArcStorage,
}

impl Repository {
    pub fn new(storage: ArcStorage) -> Self {
        Self { storage }
    }

    /// Load and revalidate the persisted snapshot. Corrupted content never
    /// fails the load; only storage errors do.
    pub async fn load(&self, catalog: &Catalog) -> Result<Snapshot> {
        let default_model = self
            .storage
            .get_item(DEFAULT_MODEL_KEY)
            .await
            .wrap_err("loading default model")?
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        let effective_model = default_model
            .as_deref()
            .filter(|m| catalog.has_model(m))
            .unwrap_or(catalog.default_model())
            .to_string();

        let conversations = match self
            .storage
            .get_item(CONVERSATIONS_KEY)
            .await
            .wrap_err("loading conversations")?
        {
            Some(raw) => parse_conversations(&raw, catalog, &effective_model),
            None => vec![],
        };

        log::debug!(
            "Loaded {} conversations, default model {:?}",
            conversations.len(),
            default_model
        );
        Ok(Snapshot {
            conversations,
            default_model,
        })
    }

    /// Rebuild the store from storage. `catalog` must already list the models
    /// the server serves, or stored model ids it lacks are reset. A storage
    /// failure starts an empty history.
    pub async fn restore(&self, catalog: Catalog) -> ConversationStore {
        let snapshot = match self.load(&catalog).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::warn!("Starting with no history: {:#}", err);
                Snapshot::default()
            }
        };
        ConversationStore::from_snapshot(catalog, snapshot)
    }

    pub async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let raw = serde_json::to_string(&snapshot.conversations)
            .wrap_err("serializing conversations")?;
        self.storage
            .set_item(CONVERSATIONS_KEY, &raw)
            .await
            .wrap_err("saving conversations")?;

        match snapshot.default_model.as_deref() {
            Some(model) => self
                .storage
                .set_item(DEFAULT_MODEL_KEY, model)
                .await
                .wrap_err("saving default model")?,
            None => self
                .storage
                .remove_item(DEFAULT_MODEL_KEY)
                .await
                .wrap_err("removing default model")?,
        }
        Ok(())
    }
}
