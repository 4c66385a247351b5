// src/storage/traits.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Rule, RuleFields, RuleId};

/// Storage trait for rule persistence.
///
/// Absence is reported through `Option`/`bool`; an `Err` always means the
/// backend itself failed.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Short backend name for readiness reporting.
    fn backend(&self) -> &'static str;

    // Rules
    async fn create(&self, rule: &Rule) -> anyhow::Result<()>;
    async fn find_one(&self, id: &RuleId) -> anyhow::Result<Option<Rule>>;
    async fn find_all(&self) -> anyhow::Result<Vec<Rule>>;
    async fn update(
        &self,
        id: &RuleId,
        fields: &RuleFields,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<Option<Rule>>;
    async fn delete(&self, id: &RuleId) -> anyhow::Result<bool>;

    // Lifecycle
    async fn ping(&self) -> anyhow::Result<()>;
    async fn close(&self);
}
