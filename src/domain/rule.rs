use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Server-assigned rule identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    pub fn new(id: impl Into<String>) -> Self {
        RuleId(id.into())
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        RuleId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The caller-controlled part of a rule.
///
/// Condition and action are opaque strings; nothing here parses them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFields {
    pub name: String,
    pub description: Option<String>,
    pub condition: String,
    pub action: String,
    pub is_active: bool,
}

/// A persisted expense rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub description: Option<String>,
    pub condition: String,
    pub action: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Build a new rule with a fresh id and both timestamps set to `now`.
    ///
    /// Timestamps are kept at microsecond precision, the finest the
    /// relational store holds.
    pub fn new(fields: RuleFields, now: DateTime<Utc>) -> Self {
        let now = now.trunc_subsecs(6);
        Rule {
            id: RuleId::generate(),
            name: fields.name,
            description: fields.description,
            condition: fields.condition,
            action: fields.action,
            is_active: fields.is_active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace every mutable field and bump `updated_at`.
    ///
    /// `updated_at` never moves backwards, even if the clock does.
    pub fn apply(&mut self, fields: &RuleFields, now: DateTime<Utc>) {
        self.name = fields.name.clone();
        self.description = fields.description.clone();
        self.condition = fields.condition.clone();
        self.action = fields.action.clone();
        self.is_active = fields.is_active;
        self.updated_at = now.trunc_subsecs(6).max(self.updated_at);
    }

    /// The mutable fields of this rule.
    pub fn fields(&self) -> RuleFields {
        RuleFields {
            name: self.name.clone(),
            description: self.description.clone(),
            condition: self.condition.clone(),
            action: self.action.clone(),
            is_active: self.is_active,
        }
    }
}
