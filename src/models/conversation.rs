#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::config::constants::{DEFAULT_TITLE, PREVIEW_ELLIPSIS, PREVIEW_MAX_CHARS};
use crate::models::{Message, Mode, catalog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSettings {
    pub deep_thinking: bool,
    pub allow_web_search: bool,
    pub allow_image_tool: bool,
}

/// A tool invocation reported by the agent. Arguments and result are kept
/// exactly as the agent sent them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEvent {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
    #[serde(default)]
    pub result: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    id: String,
    title: String,
    mode_id: String,
    model_id: String,
    pinned: bool,
    archived: bool,
    messages: Vec<Message>,
    tool_events: Vec<ToolEvent>,
    settings: ConversationSettings,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(mode: &Mode, model_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            mode_id: mode.id.to_string(),
            model_id: model_id.into(),
            pinned: false,
            archived: false,
            messages: vec![],
            tool_events: vec![],
            settings: mode.defaults,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    pub fn with_archived(mut self, archived: bool) -> Self {
        self.archived = archived;
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
        self.settings = settings;
        self
    }

    pub fn with_created_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.created_at = timestamp;
        if self.updated_at < timestamp {
            self.updated_at = timestamp;
        }
        self
    }

    /// Timestamps older than `created_at` are clamped.
    pub fn with_updated_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.updated_at = timestamp.max(self.created_at);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn mode_id(&self) -> &str {
        &self.mode_id
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn pinned(&self) -> bool {
        self.pinned
    }

    pub fn archived(&self) -> bool {
        self.archived
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn tool_events(&self) -> &[ToolEvent] {
        &self.tool_events
    }

    pub fn settings(&self) -> &ConversationSettings {
        &self.settings
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_pinned(&mut self, pinned: bool) {
        self.pinned = pinned;
    }

    pub fn set_archived(&mut self, archived: bool) {
        self.archived = archived;
    }

    /// Switching mode resets the settings to the mode's defaults.
    pub fn set_mode(&mut self, mode: &Mode) {
        self.mode_id = mode.id.to_string();
        self.settings = mode.defaults;
    }

    pub fn set_model_id(&mut self, model_id: impl Into<String>) {
        self.model_id = model_id.into();
    }

    pub fn settings_mut(&mut self) -> &mut ConversationSettings {
        &mut self.settings
    }

    /// Move `updated_at` strictly forward.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + TimeDelta::milliseconds(1)
        };
    }

    pub fn append_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id() == id)
    }

    pub fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id() == id)
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn append_tool_events(&mut self, events: impl IntoIterator<Item = ToolEvent>) {
        self.tool_events.extend(events);
    }

    /// Preview of the latest message, empty when there is none.
    pub fn preview(&self) -> String {
        self.last_message()
            .map(|m| preview(m.content()))
            .unwrap_or_default()
    }

    /// Deep copy under a new id: messages get fresh ids, timestamps restart.
    pub fn duplicate(&self) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: format!("{} (copy)", self.title),
            mode_id: self.mode_id.clone(),
            model_id: self.model_id.clone(),
            pinned: false,
            archived: false,
            messages: self.messages.iter().map(Message::duplicate).collect(),
            tool_events: self.tool_events.clone(),
            settings: self.settings,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(&catalog::MODES[0], catalog::DEFAULT_MODEL_ID)
    }
}

/// Single-line preview of a text: whitespace collapsed, at most
/// `PREVIEW_MAX_CHARS` characters plus an ellipsis when cut.
pub fn preview(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= PREVIEW_MAX_CHARS {
        return collapsed;
    }
    let mut cut = collapsed
        .chars()
        .take(PREVIEW_MAX_CHARS)
        .collect::<String>()
        .trim_end()
        .to_string();
    cut.push(PREVIEW_ELLIPSIS);
    cut
}
