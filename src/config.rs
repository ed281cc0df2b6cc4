//! Session and factory configuration.

use serde::{Deserialize, Serialize};

/// Identity of the session on whose behalf descriptors are fetched. Passed
/// through to every `DescriptorSource` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub user_id: String,
    pub workspace: String,
}

impl SessionInfo {
    pub fn new(user_id: impl Into<String>, workspace: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), workspace: workspace.into() }
    }
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self::new("anonymous", "default")
    }
}

/// What the reference view reports when the service cannot answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceFailurePolicy {
    /// Log and report "no references": `is_empty()` is `true`.
    #[default]
    FailOpen,
    /// Log and report the node as referenced: `is_empty()` is `false`.
    /// Callers that gate deletion on `is_empty()` then refuse conservatively.
    AssumeReferenced,
}

/// Tunables of the item-state factory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    pub reference_failure_policy: ReferenceFailurePolicy,
}

impl FactoryConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::Error::Config(e.to_string()))
    }
}
