use serde::{Deserialize, Serialize};

use crate::domain::RuleFields;

use super::error::ApiError;

fn default_active() -> bool {
    true
}

/// Request body for creating or replacing a rule.
///
/// Used for both POST and PUT. PUT is a full replacement: an omitted
/// `description` clears it and an omitted `is_active` resets it to `true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleInput {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Opaque condition expression
    pub condition: String,

    /// Opaque action name
    pub action: String,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl RuleInput {
    /// Check constraints serde cannot express and convert to domain fields.
    pub fn validate(self) -> Result<RuleFields, ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("name must not be empty".to_string()));
        }

        Ok(RuleFields {
            name: self.name,
            description: self.description,
            condition: self.condition,
            action: self.action,
            is_active: self.is_active,
        })
    }
}
