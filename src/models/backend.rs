use serde::{Deserialize, Serialize};

use crate::config::Language;
use crate::models::{ConversationSettings, Message, Role, ToolEvent};

/// Body of `POST /api/chat/stream`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub mode: String,
    pub messages: Vec<ChatMessage>,
    pub options: ChatOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<Language>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChatOptions {
    pub deep_thinking: bool,
    pub allow_web_search: bool,
    pub allow_image_tool: bool,
}

/// One decoded frame of the chat stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireEvent {
    Chunk { delta: String },
    Tools { tool_events: Vec<ToolEvent> },
    Error { detail: String },
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role(),
            content: msg.content().to_string(),
        }
    }
}

impl From<&ConversationSettings> for ChatOptions {
    fn from(settings: &ConversationSettings) -> Self {
        Self {
            deep_thinking: settings.deep_thinking,
            allow_web_search: settings.allow_web_search,
            allow_image_tool: settings.allow_image_tool,
        }
    }
}
