// src/storage/postgres.rs
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::domain::{Rule, RuleFields, RuleId};

use super::traits::Storage;

/// PostgreSQL implementation of the Storage trait.
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Create a new PostgresStorage instance with a connection pool.
    pub async fn connect(
        database_url: &str,
        min_connections: u32,
        max_connections: u32,
    ) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(min_connections)
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn rule_from_row(row: &PgRow) -> anyhow::Result<Rule> {
    let id: String = row.try_get("id")?;

    Ok(Rule {
        id: RuleId::new(id),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        condition: row.try_get("condition")?,
        action: row.try_get("action")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl Storage for PostgresStorage {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn create(&self, rule: &Rule) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rules (id, name, description, condition, action, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(rule.id.as_str())
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(&rule.condition)
        .bind(&rule.action)
        .bind(rule.is_active)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_one(&self, id: &RuleId) -> anyhow::Result<Option<Rule>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, condition, action, is_active, created_at, updated_at
            FROM rules
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(rule_from_row).transpose()
    }

    async fn find_all(&self) -> anyhow::Result<Vec<Rule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, condition, action, is_active, created_at, updated_at
            FROM rules
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(rule_from_row).collect()
    }

    async fn update(
        &self,
        id: &RuleId,
        fields: &RuleFields,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<Option<Rule>> {
        let row = sqlx::query(
            r#"
            UPDATE rules
            SET name = $2,
                description = $3,
                condition = $4,
                action = $5,
                is_active = $6,
                updated_at = GREATEST($7, updated_at)
            WHERE id = $1
            RETURNING id, name, description, condition, action, is_active, created_at, updated_at
            "#,
        )
        .bind(id.as_str())
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.condition)
        .bind(&fields.action)
        .bind(fields.is_active)
        .bind(updated_at.trunc_subsecs(6))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(rule_from_row).transpose()
    }

    async fn delete(&self, id: &RuleId) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM rules
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
