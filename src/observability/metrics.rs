use std::sync::atomic::{AtomicU64, Ordering};

use crate::api::error::ApiError;

/// Operations exposed by the rules API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Create,
    Get,
    Update,
    Delete,
}

/// Metrics registry for the application.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Successful operations by kind
    pub rules_listed: AtomicU64,
    pub rules_created: AtomicU64,
    pub rules_fetched: AtomicU64,
    pub rules_updated: AtomicU64,
    pub rules_deleted: AtomicU64,

    /// Failed operations by error kind
    pub validation_errors: AtomicU64,
    pub not_found_errors: AtomicU64,
    pub store_errors: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    /// Record a successful operation.
    pub fn record_success(&self, op: Operation) {
        let counter = match op {
            Operation::List => &self.rules_listed,
            Operation::Create => &self.rules_created,
            Operation::Get => &self.rules_fetched,
            Operation::Update => &self.rules_updated,
            Operation::Delete => &self.rules_deleted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed operation.
    pub fn record_error(&self, error: &ApiError) {
        let counter = match error {
            ApiError::Validation(_) => &self.validation_errors,
            ApiError::NotFound => &self.not_found_errors,
            ApiError::Store(_) => &self.store_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of an operation and pass it through.
    pub fn track<T>(&self, op: Operation, result: Result<T, ApiError>) -> Result<T, ApiError> {
        match &result {
            Ok(_) => self.record_success(op),
            Err(e) => self.record_error(e),
        }
        result
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self, uptime_secs: u64) -> String {
        format!(
            r#"# HELP expense_rules_uptime_seconds Application uptime in seconds
# TYPE expense_rules_uptime_seconds counter
expense_rules_uptime_seconds {}

# HELP expense_rules_operations_total Successful rule operations
# TYPE expense_rules_operations_total counter
expense_rules_operations_total{{op="list"}} {}
expense_rules_operations_total{{op="create"}} {}
expense_rules_operations_total{{op="get"}} {}
expense_rules_operations_total{{op="update"}} {}
expense_rules_operations_total{{op="delete"}} {}

# HELP expense_rules_errors_total Failed rule operations by kind
# TYPE expense_rules_errors_total counter
expense_rules_errors_total{{kind="validation"}} {}
expense_rules_errors_total{{kind="not_found"}} {}
expense_rules_errors_total{{kind="store"}} {}
"#,
            uptime_secs,
            self.rules_listed.load(Ordering::Relaxed),
            self.rules_created.load(Ordering::Relaxed),
            self.rules_fetched.load(Ordering::Relaxed),
            self.rules_updated.load(Ordering::Relaxed),
            self.rules_deleted.load(Ordering::Relaxed),
            self.validation_errors.load(Ordering::Relaxed),
            self.not_found_errors.load(Ordering::Relaxed),
            self.store_errors.load(Ordering::Relaxed),
        )
    }
}
