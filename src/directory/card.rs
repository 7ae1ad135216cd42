use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The parsed self-description document of a remote agent.
///
/// Only `url` and `name` are interpreted by the directory. Every other field of the
/// document (description, version, capabilities, skills, ...) is kept verbatim in
/// `metadata` and written back out unchanged on serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCard {
    /// Canonical endpoint URL, the directory key.
    #[serde(default)]
    pub url: String,
    /// Human-readable name shown in notifications.
    pub name: String,
    /// Protocol-specific fields the directory does not interpret.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl AgentCard {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            metadata: Map::new(),
        }
    }

    /// Adds one opaque metadata field. Used when building cards by hand.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Parses a discovery document.
    ///
    /// A document that omits `url`, or leaves it blank, is assigned `fallback_url`.
    pub fn from_document(body: &[u8], fallback_url: &str) -> Result<Self, String> {
        let mut card: AgentCard = serde_json::from_slice(body)
            .map_err(|err| format!("malformed agent card: {err}"))?;
        if card.name.trim().is_empty() {
            return Err(String::from("malformed agent card: `name` is empty"));
        }
        if card.url.trim().is_empty() {
            card.url = fallback_url.to_string();
        } else {
            card.url = card.url.trim().to_string();
        }
        Ok(card)
    }

    /// Looks up a metadata field by name.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}
