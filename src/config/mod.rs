use clap::{ArgAction, Parser};

const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://localhost:3000"];

/// Expense rules service configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "expense-rules")]
#[command(about = "CRUD service for expense rules")]
pub struct Config {
    /// HTTP server listen address
    #[arg(long, default_value = "0.0.0.0:8000", env = "EXPENSE_RULES_LISTEN_ADDR")]
    pub listen_addr: String,

    /// PostgreSQL connection URL (optional, uses in-memory storage if not set)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Minimum pooled database connections
    #[arg(long, default_value = "1", env = "EXPENSE_RULES_DB_MIN_CONNECTIONS")]
    pub db_min_connections: u32,

    /// Maximum pooled database connections
    #[arg(long, default_value = "10", env = "EXPENSE_RULES_DB_MAX_CONNECTIONS")]
    pub db_max_connections: u32,

    /// Apply embedded migrations on startup
    #[arg(
        long,
        default_value = "true",
        action = ArgAction::Set,
        env = "EXPENSE_RULES_RUN_MIGRATIONS"
    )]
    pub run_migrations: bool,

    /// Origins allowed to make cross-origin requests (comma separated)
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = DEFAULT_CORS_ORIGINS.map(String::from),
        env = "EXPENSE_RULES_CORS_ORIGINS"
    )]
    pub cors_origins: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(
        long,
        default_value = "false",
        action = ArgAction::Set,
        env = "EXPENSE_RULES_LOG_JSON"
    )]
    pub log_json: bool,

    /// Enable graceful shutdown
    #[arg(
        long,
        default_value = "true",
        action = ArgAction::Set,
        env = "EXPENSE_RULES_GRACEFUL_SHUTDOWN"
    )]
    pub graceful_shutdown: bool,
}

impl Config {
    /// Whether a database is configured.
    pub fn uses_database(&self) -> bool {
        self.database_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0:8000".to_string(),
            database_url: None,
            db_min_connections: 1,
            db_max_connections: 10,
            run_migrations: true,
            cors_origins: DEFAULT_CORS_ORIGINS.map(String::from).to_vec(),
            log_level: "info".to_string(),
            log_json: false,
            graceful_shutdown: true,
        }
    }
}
