#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

use thiserror::Error;

use crate::config::constants::DEFAULT_TITLE;
use crate::models::{
    Catalog, Conversation, ConversationSettings, Message, Model, ToolEvent, find_mode,
};

use super::Snapshot;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("conversation {0} not found")]
    NotFound(String),
    #[error("conversation {0} is archived")]
    Archived(String),
    #[error("unknown mode {0}")]
    UnknownMode(String),
    #[error("unknown model {0}")]
    UnknownModel(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Initial content of a new conversation. Anything left unset takes the
/// store defaults.
#[derive(Debug, Clone, Default)]
pub struct Seed {
    title: Option<String>,
    mode_id: Option<String>,
    model_id: Option<String>,
    messages: Vec<Message>,
    tool_events: Vec<ToolEvent>,
    settings: Option<ConversationSettings>,
}

impl Seed {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_mode(mut self, mode_id: impl Into<String>) -> Self {
        self.mode_id = Some(mode_id.into());
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_tool_events(mut self, tool_events: Vec<ToolEvent>) -> Self {
        self.tool_events = tool_events;
        self
    }

    pub fn with_settings(mut self, settings: ConversationSettings) -> Self {
        self.settings = Some(settings);
        self
    }
}

/// Owns every conversation and the active selection. Never empty, and the
/// active conversation is never archived once an operation returns.
#[derive(Debug)]
pub struct ConversationStore {
    catalog: Catalog,
    conversations: Vec<Conversation>,
    active_id: String,
    default_model: String,
}

impl ConversationStore {
    pub fn new(catalog: Catalog) -> Self {
        Self::from_snapshot(catalog, Snapshot::default())
    }

    /// Rehydrate from a validated snapshot, seeding a fresh conversation when
    /// nothing usable survived.
    pub fn from_snapshot(catalog: Catalog, snapshot: Snapshot) -> Self {
        let default_model = match snapshot.default_model {
            Some(model) if catalog.has_model(&model) => model,
            Some(model) => {
                log::warn!(
                    "Stored default model {} is unknown, using {}",
                    model,
                    catalog.default_model()
                );
                catalog.default_model().to_string()
            }
            None => catalog.default_model().to_string(),
        };

        let mut store = Self {
            catalog,
            conversations: snapshot.conversations,
            active_id: String::new(),
            default_model,
        };
        store.retarget_active();
        store
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id() == id)
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn active(&self) -> &Conversation {
        match self.get(&self.active_id) {
            Some(convo) => convo,
            // retarget_active keeps active_id pointing at a stored conversation
            None => &self.conversations[0],
        }
    }

    /// Create a conversation and make it active. Returns its id.
    pub fn create(&mut self, seed: Seed) -> String {
        let mode = seed
            .mode_id
            .as_deref()
            .map(|id| self.catalog.mode(id))
            .unwrap_or(self.catalog.default_mode());
        let model_id = seed
            .model_id
            .filter(|id| self.catalog.has_model(id))
            .unwrap_or_else(|| self.default_model.clone());

        let mut convo = Conversation::new(mode, model_id)
            .with_messages(seed.messages)
            .with_tool_events(seed.tool_events);
        if let Some(title) = seed.title {
            convo.set_title(title);
        }
        if let Some(settings) = seed.settings {
            convo = convo.with_settings(settings);
        }

        let id = convo.id().to_string();
        log::debug!("Created conversation {}", id);
        self.conversations.push(convo);
        self.active_id = id.clone();
        id
    }

    pub fn select(&mut self, id: &str) -> Result<()> {
        let convo = self.find(id)?;
        if convo.archived() {
            return Err(StoreError::Archived(id.to_string()));
        }
        self.active_id = id.to_string();
        Ok(())
    }

    /// Apply `f` to the conversation and refresh its `updatedAt`. Returns
    /// `None` when the conversation does not exist.
    pub fn update<R>(&mut self, id: &str, f: impl FnOnce(&mut Conversation) -> R) -> Option<R> {
        let convo = self.conversations.iter_mut().find(|c| c.id() == id)?;
        let ret = f(convo);
        convo.touch();
        Some(ret)
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        let idx = self
            .conversations
            .iter()
            .position(|c| c.id() == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.conversations.remove(idx);
        log::debug!("Deleted conversation {}", id);

        if self.active_id == id || self.conversations.is_empty() {
            self.retarget_active();
        }
        Ok(())
    }

    /// Returns the new pinned state.
    pub fn toggle_pin(&mut self, id: &str) -> Result<bool> {
        self.try_update(id, |c| {
            c.set_pinned(!c.pinned());
            c.pinned()
        })
    }

    /// Returns the new archived state.
    pub fn toggle_archive(&mut self, id: &str) -> Result<bool> {
        let archived = self.try_update(id, |c| {
            c.set_archived(!c.archived());
            c.archived()
        })?;
        if archived && self.active_id == id {
            self.retarget_active();
        }
        Ok(archived)
    }

    /// Blank titles fall back to the placeholder.
    pub fn rename(&mut self, id: &str, title: &str) -> Result<()> {
        let title = match title.trim() {
            "" => DEFAULT_TITLE,
            title => title,
        };
        self.try_update(id, |c| c.set_title(title))
    }

    /// Copy a conversation under a new id and make the copy active.
    pub fn duplicate(&mut self, id: &str) -> Result<String> {
        let copy = self.find(id)?.duplicate();
        let copy_id = copy.id().to_string();
        self.conversations.push(copy);
        self.active_id = copy_id.clone();
        Ok(copy_id)
    }

    /// Pinned first, then non-archived, then most recently updated. Ties
    /// keep creation order.
    pub fn sorted(&self) -> Vec<&Conversation> {
        let mut ret = self.conversations.iter().collect::<Vec<_>>();
        ret.sort_by(|a, b| {
            b.pinned()
                .cmp(&a.pinned())
                .then(a.archived().cmp(&b.archived()))
                .then(b.updated_at().cmp(&a.updated_at()))
        });
        ret
    }

    /// Case-insensitive match on title or latest message preview, in sort
    /// order. An empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<&Conversation> {
        let query = query.trim().to_lowercase();
        self.sorted()
            .into_iter()
            .filter(|c| {
                query.is_empty()
                    || c.title().to_lowercase().contains(&query)
                    || c.preview().to_lowercase().contains(&query)
            })
            .collect()
    }

    /// Switch mode, resetting the settings to the mode's defaults.
    pub fn set_mode(&mut self, id: &str, mode_id: &str) -> Result<()> {
        let mode = find_mode(mode_id).ok_or_else(|| StoreError::UnknownMode(mode_id.to_string()))?;
        self.try_update(id, |c| c.set_mode(mode))
    }

    pub fn set_model(&mut self, id: &str, model_id: &str) -> Result<()> {
        if !self.catalog.has_model(model_id) {
            return Err(StoreError::UnknownModel(model_id.to_string()));
        }
        self.try_update(id, |c| c.set_model_id(model_id))
    }

    pub fn update_settings(
        &mut self,
        id: &str,
        f: impl FnOnce(&mut ConversationSettings),
    ) -> Result<()> {
        self.try_update(id, |c| f(c.settings_mut()))
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn set_default_model(&mut self, model_id: &str) -> Result<()> {
        if !self.catalog.has_model(model_id) {
            return Err(StoreError::UnknownModel(model_id.to_string()));
        }
        self.default_model = model_id.to_string();
        Ok(())
    }

    /// Adopt a new model list. The default model and every conversation whose
    /// model vanished move to the first listed model. Returns how many
    /// conversations were reassigned.
    pub fn reconcile_models(&mut self, models: Vec<Model>) -> usize {
        if models.is_empty() {
            return 0;
        }
        let catalog_mode = self.catalog.default_mode().id;
        self.catalog = Catalog::new(models).with_default_mode(catalog_mode);

        if !self.catalog.has_model(&self.default_model) {
            let fallback = self.catalog.models()[0].id().to_string();
            log::info!(
                "Default model {} is no longer served, switching to {}",
                self.default_model,
                fallback
            );
            self.default_model = fallback;
        }

        let mut reassigned = 0;
        for convo in self.conversations.iter_mut() {
            if self.catalog.has_model(convo.model_id()) {
                continue;
            }
            convo.set_model_id(self.default_model.clone());
            convo.touch();
            reassigned += 1;
        }
        reassigned
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            conversations: self.conversations.clone(),
            default_model: Some(self.default_model.clone()),
        }
    }

    fn find(&self, id: &str) -> Result<&Conversation> {
        self.get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn try_update<R>(&mut self, id: &str, f: impl FnOnce(&mut Conversation) -> R) -> Result<R> {
        self.update(id, f)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Point `active_id` at the most recently updated non-archived
    /// conversation, creating one when there is none.
    fn retarget_active(&mut self) {
        let fallback = self
            .conversations
            .iter()
            .filter(|c| !c.archived())
            .max_by_key(|c| c.updated_at())
            .map(|c| c.id().to_string());
        match fallback {
            Some(id) => self.active_id = id,
            None => {
                self.create(Seed::default());
            }
        }
    }
}
