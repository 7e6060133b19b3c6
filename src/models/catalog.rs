use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::ConversationSettings;

pub const DEFAULT_MODE_ID: &str = "assistant";
pub const DEFAULT_MODEL_ID: &str = "qwen3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mode {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub defaults: ConversationSettings,
}

/// Built-in conversation modes. The first one is the default.
pub const MODES: &[Mode] = &[
    Mode {
        id: DEFAULT_MODE_ID,
        name: "Assistant",
        description: "Everyday questions with web search and image tools",
        defaults: ConversationSettings {
            deep_thinking: false,
            allow_web_search: true,
            allow_image_tool: true,
        },
    },
    Mode {
        id: "reasoning",
        name: "Reasoning",
        description: "Deliberate step-by-step reasoning",
        defaults: ConversationSettings {
            deep_thinking: true,
            allow_web_search: true,
            allow_image_tool: false,
        },
    },
    Mode {
        id: "creative",
        name: "Creative",
        description: "Writing and image generation, offline",
        defaults: ConversationSettings {
            deep_thinking: false,
            allow_web_search: false,
            allow_image_tool: true,
        },
    },
];

pub fn find_mode(id: &str) -> Option<&'static Mode> {
    MODES.iter().find(|m| m.id == id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

impl Model {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            tags: vec![],
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())?;
        if self.name.is_some() {
            write!(f, " ({})", self.id)?;
        }
        if !self.tags.is_empty() {
            write!(f, " [{}]", self.tags.join(", "))?;
        }
        Ok(())
    }
}

/// Static model list used when the agent cannot tell us what it serves.
pub fn builtin_models() -> Vec<Model> {
    vec![
        Model::new(DEFAULT_MODEL_ID)
            .with_name("Qwen3")
            .with_description("General purpose model")
            .with_tags(&["default"]),
        Model::new("qwen-plus")
            .with_name("Qwen Plus")
            .with_description("Balanced quality and latency"),
        Model::new("qwen-max")
            .with_name("Qwen Max")
            .with_description("Highest quality, slower")
            .with_tags(&["reasoning"]),
    ]
}

/// Known modes and models plus the defaults applied to new or invalid
/// conversations.
#[derive(Debug, Clone)]
pub struct Catalog {
    models: Vec<Model>,
    default_mode: &'static Mode,
    default_model: String,
}

impl Catalog {
    pub fn new(models: Vec<Model>) -> Self {
        let models = if models.is_empty() {
            builtin_models()
        } else {
            models
        };
        let default_model = models
            .iter()
            .find(|m| m.id() == DEFAULT_MODEL_ID)
            .or(models.first())
            .map(|m| m.id().to_string())
            .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string());
        Self {
            models,
            default_mode: &MODES[0],
            default_model,
        }
    }

    /// Unknown mode ids keep the current default.
    pub fn with_default_mode(mut self, id: &str) -> Self {
        match find_mode(id) {
            Some(mode) => self.default_mode = mode,
            None => log::warn!("Unknown default mode {}, keeping {}", id, self.default_mode.id),
        }
        self
    }

    /// Unknown model ids keep the current default.
    pub fn with_default_model(mut self, id: &str) -> Self {
        if self.has_model(id) {
            self.default_model = id.to_string();
        } else {
            log::warn!(
                "Unknown default model {}, keeping {}",
                id,
                self.default_model
            );
        }
        self
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn has_model(&self, id: &str) -> bool {
        self.models.iter().any(|m| m.id() == id)
    }

    pub fn has_mode(&self, id: &str) -> bool {
        find_mode(id).is_some()
    }

    /// Mode for the id, or the default mode when it is unknown.
    pub fn mode(&self, id: &str) -> &'static Mode {
        find_mode(id).unwrap_or(self.default_mode)
    }

    pub fn default_mode(&self) -> &'static Mode {
        self.default_mode
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(builtin_models())
    }
}
