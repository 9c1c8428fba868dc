use serde::{Deserialize, Serialize};

/// Stable string identity for one of the six predefined agents.
pub type AgentId = String;

/// A `(id, display-name, provider, model-identifier, color)` record.
///
/// Six predefined, loaded once at process start and treated as immutable
/// thereafter (§3: "Immutable once loaded").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    #[serde(rename = "name")]
    pub display_name: String,
    pub provider: String,
    #[serde(rename = "model")]
    pub model_identifier: String,
    pub color: String,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        provider: impl Into<String>,
        model_identifier: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            provider: provider.into(),
            model_identifier: model_identifier.into(),
            color: color.into(),
        }
    }

    /// The six predefined agents for the installation.
    pub fn default_roster() -> Vec<Agent> {
        vec![
            Agent::new("lumen", "Lumen", "openai", "gpt-4o", "#f4c542"),
            Agent::new("tidal", "Tidal", "anthropic", "claude-3-5-sonnet", "#3b8ea5"),
            Agent::new("verdant", "Verdant", "google", "gemini-1.5-pro", "#5fa777"),
            Agent::new("ember", "Ember", "openai", "gpt-4o-mini", "#d9643a"),
            Agent::new("quartz", "Quartz", "mistral", "mistral-large", "#9a8cc2"),
            Agent::new("ash", "Ash", "meta", "llama-3.1-70b", "#7d7f85"),
        ]
    }
}
