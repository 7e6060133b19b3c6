#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::config::constants::DEFAULT_TITLE;
use crate::models::{Catalog, Conversation, ConversationSettings, Message, Role, ToolEvent};

/// Persisted form of the store.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub conversations: Vec<Conversation>,
    pub default_model: Option<String>,
}

/// Rebuild conversations from untrusted persisted JSON.
///
/// Never fails: records that cannot be salvaged are dropped and broken fields
/// fall back to defaults. Ids of surviving records are kept.
pub fn parse_conversations(raw: &str, catalog: &Catalog, default_model: &str) -> Vec<Conversation> {
    let value = match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(err) => {
            log::warn!("Discarding unparseable conversations: {}", err);
            return vec![];
        }
    };

    let Value::Array(records) = value else {
        log::warn!("Discarding conversations: expected an array");
        return vec![];
    };

    let mut seen = HashSet::new();
    let mut conversations = vec![];
    for (idx, record) in records.iter().enumerate() {
        let Some(record) = record.as_object() else {
            log::warn!("Discarding conversation #{}: not an object", idx);
            continue;
        };
        let Some(id) = non_empty_str(record, "id") else {
            log::warn!("Discarding conversation #{}: missing id", idx);
            continue;
        };
        if !seen.insert(id.to_string()) {
            log::warn!("Discarding conversation #{}: duplicate id {}", idx, id);
            continue;
        }
        conversations.push(parse_conversation(id, record, catalog, default_model));
    }
    conversations
}

fn parse_conversation(
    id: &str,
    record: &Map<String, Value>,
    catalog: &Catalog,
    default_model: &str,
) -> Conversation {
    let mode = match record.get("modeId").and_then(Value::as_str) {
        Some(mode_id) if catalog.has_mode(mode_id) => catalog.mode(mode_id),
        other => {
            if let Some(mode_id) = other {
                log::debug!("Conversation {}: unknown mode {}", id, mode_id);
            }
            catalog.default_mode()
        }
    };

    let model_id = match record.get("modelId").and_then(Value::as_str) {
        Some(model_id) if catalog.has_model(model_id) => model_id,
        _ => default_model,
    };

    let title = non_empty_str(record, "title").unwrap_or(DEFAULT_TITLE);

    let settings = match record.get("settings").and_then(Value::as_object) {
        Some(raw) => ConversationSettings {
            deep_thinking: bool_or(raw, "deepThinking", mode.defaults.deep_thinking),
            allow_web_search: bool_or(raw, "allowWebSearch", mode.defaults.allow_web_search),
            allow_image_tool: bool_or(raw, "allowImageTool", mode.defaults.allow_image_tool),
        },
        None => mode.defaults,
    };

    let messages = record
        .get("messages")
        .and_then(Value::as_array)
        .map(|raw| parse_messages(id, raw))
        .unwrap_or_default();

    let tool_events = record
        .get("toolEvents")
        .and_then(Value::as_array)
        .map(|raw| {
            raw.iter()
                .filter_map(|e| serde_json::from_value::<ToolEvent>(e.clone()).ok())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let now = Utc::now();
    let created_at = record.get("createdAt").and_then(timestamp).unwrap_or(now);
    let updated_at = record
        .get("updatedAt")
        .and_then(timestamp)
        .unwrap_or(created_at);

    Conversation::new(mode, model_id)
        .with_id(id)
        .with_title(title)
        .with_pinned(bool_or(record, "pinned", false))
        .with_archived(bool_or(record, "archived", false))
        .with_messages(messages)
        .with_tool_events(tool_events)
        .with_settings(settings)
        .with_created_at(created_at)
        .with_updated_at(updated_at)
}

fn parse_messages(conversation_id: &str, raw: &[Value]) -> Vec<Message> {
    let mut seen = HashSet::new();
    let mut messages = vec![];
    for record in raw {
        let Some(record) = record.as_object() else {
            continue;
        };
        let Some(role) = record
            .get("role")
            .and_then(Value::as_str)
            .and_then(Role::parse)
        else {
            continue;
        };
        let Some(content) = record.get("content").and_then(Value::as_str) else {
            continue;
        };

        let mut message = Message::new(role, content);
        match non_empty_str(record, "id") {
            Some(id) if seen.insert(id.to_string()) => message = message.with_id(id),
            _ => {
                log::debug!(
                    "Conversation {}: regenerated message id {}",
                    conversation_id,
                    message.id()
                );
                seen.insert(message.id().to_string());
            }
        }
        messages.push(message);
    }
    messages
}

fn non_empty_str<'a>(record: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    record
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn bool_or(record: &Map<String, Value>, key: &str, default: bool) -> bool {
    record.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// Epoch milliseconds, or an RFC 3339 string.
fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        _ => None,
    }
}
