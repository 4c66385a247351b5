pub mod api;
pub mod config;
pub mod domain;
pub mod observability;
pub mod storage;

pub use config::Config;
pub use domain::{Rule, RuleFields, RuleId};
pub use storage::{MemoryStorage, PostgresStorage, Storage};
