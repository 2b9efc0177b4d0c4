use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Row};
use uuid::Uuid;

use crate::{
    db::MatchStore,
    error::{AppError, AppResult},
    models::{MatchRecord, MatchReport, MatchStatus},
};

/// Creates a PostgreSQL connection pool and applies pending migrations
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Match store backed by the `matches` table
#[derive(Clone)]
pub struct PgMatchStore {
    pool: PgPool,
}

impl PgMatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn set_outcome(
        &self,
        id: Uuid,
        status: MatchStatus,
        error_message: Option<&str>,
        result: Option<&MatchReport>,
    ) -> AppResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE matches
            SET status = $2, error_message = $3, result = $4, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error_message)
        .bind(result.map(Json))
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Match {} not found", id)));
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl MatchStore for PgMatchStore {
    async fn insert(&self, record: &MatchRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO matches
                (id, username_a, username_b, status, error_message, result, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(&record.username_a)
        .bind(&record.username_b)
        .bind(record.status.as_str())
        .bind(record.error_message.as_deref())
        .bind(record.result.as_ref().map(Json))
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<MatchRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, username_a, username_b, status, error_message, result, created_at, updated_at
            FROM matches
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.try_get("status")?;
        let status = MatchStatus::parse(&status)
            .ok_or_else(|| AppError::Internal(format!("Unknown match status {}", status)))?;
        let result: Option<Json<MatchReport>> = row.try_get("result")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        Ok(Some(MatchRecord {
            id: row.try_get("id")?,
            username_a: row.try_get("username_a")?,
            username_b: row.try_get("username_b")?,
            status,
            error_message: row.try_get("error_message")?,
            result: result.map(|json| json.0),
            created_at,
            updated_at,
        }))
    }

    async fn mark_ready(&self, id: Uuid, report: &MatchReport) -> AppResult<()> {
        self.set_outcome(id, MatchStatus::Ready, None, Some(report))
            .await
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> AppResult<()> {
        self.set_outcome(id, MatchStatus::Failed, Some(error_message), None)
            .await
    }

    async fn pending_ids(&self) -> AppResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM matches
            WHERE status = $1
            ORDER BY created_at
            "#,
        )
        .bind(MatchStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
