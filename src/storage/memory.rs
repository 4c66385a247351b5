// src/storage/memory.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::{Rule, RuleFields, RuleId};

use super::traits::Storage;

/// In-process storage, kept in insertion order.
///
/// Used when no database is configured, and by tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    rules: Mutex<Vec<Rule>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rules.
    pub fn len(&self) -> usize {
        self.rules.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.lock().is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, rule: &Rule) -> anyhow::Result<()> {
        let mut rules = self.rules.lock();

        if rules.iter().any(|r| r.id == rule.id) {
            anyhow::bail!("duplicate rule id {}", rule.id);
        }

        rules.push(rule.clone());
        Ok(())
    }

    async fn find_one(&self, id: &RuleId) -> anyhow::Result<Option<Rule>> {
        Ok(self.rules.lock().iter().find(|r| &r.id == id).cloned())
    }

    async fn find_all(&self) -> anyhow::Result<Vec<Rule>> {
        Ok(self.rules.lock().clone())
    }

    async fn update(
        &self,
        id: &RuleId,
        fields: &RuleFields,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<Option<Rule>> {
        let mut rules = self.rules.lock();

        let Some(rule) = rules.iter_mut().find(|r| &r.id == id) else {
            return Ok(None);
        };

        rule.apply(fields, updated_at);
        Ok(Some(rule.clone()))
    }

    async fn delete(&self, id: &RuleId) -> anyhow::Result<bool> {
        let mut rules = self.rules.lock();
        let before = rules.len();
        rules.retain(|r| &r.id != id);
        Ok(rules.len() < before)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn close(&self) {}
}
