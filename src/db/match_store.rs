use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{MatchRecord, MatchReport, MatchStatus},
};

/// Persistence for match requests and their results
#[async_trait::async_trait]
pub trait MatchStore: Send + Sync {
    async fn insert(&self, record: &MatchRecord) -> AppResult<()>;

    async fn get(&self, id: Uuid) -> AppResult<Option<MatchRecord>>;

    /// Stores the report and flips the match to `READY`
    async fn mark_ready(&self, id: Uuid, report: &MatchReport) -> AppResult<()>;

    /// Records the failure message, clears any report and flips the match to `FAILED`
    async fn mark_failed(&self, id: Uuid, error_message: &str) -> AppResult<()>;

    /// IDs of matches still `PENDING`, oldest first
    async fn pending_ids(&self) -> AppResult<Vec<Uuid>>;
}

/// Default cap on records held by [`InMemoryMatchStore`]
pub const DEFAULT_MAX_RECORDS: usize = 10_000;

/// Process-local store, used when no database is configured
///
/// Holds at most `max_records` matches. Once full, the least recently
/// updated finished matches are evicted to make room; pending ones are kept.
pub struct InMemoryMatchStore {
    records: RwLock<HashMap<Uuid, MatchRecord>>,
    max_records: usize,
}

impl Default for InMemoryMatchStore {
    fn default() -> Self {
        Self::with_max_records(DEFAULT_MAX_RECORDS)
    }
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_records(max_records: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            max_records: max_records.max(1),
        }
    }

    /// Drops the oldest finished records until one more fits
    fn evict_finished(records: &mut HashMap<Uuid, MatchRecord>, max_records: usize) {
        if records.len() < max_records {
            return;
        }

        let mut finished: Vec<(chrono::DateTime<Utc>, Uuid)> = records
            .values()
            .filter(|record| record.status != MatchStatus::Pending)
            .map(|record| (record.updated_at, record.id))
            .collect();
        finished.sort();

        let excess = records.len() + 1 - max_records;
        for (_, id) in finished.into_iter().take(excess) {
            records.remove(&id);
        }

        tracing::debug!(remaining = records.len(), "Evicted finished matches");
    }

    async fn update<F>(&self, id: Uuid, apply: F) -> AppResult<()>
    where
        F: FnOnce(&mut MatchRecord) + Send,
    {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Match {} not found", id)))?;
        apply(record);
        record.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait::async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn insert(&self, record: &MatchRecord) -> AppResult<()> {
        let mut records = self.records.write().await;
        if !records.contains_key(&record.id) {
            Self::evict_finished(&mut records, self.max_records);
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<MatchRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn mark_ready(&self, id: Uuid, report: &MatchReport) -> AppResult<()> {
        let report = report.clone();
        self.update(id, move |record| {
            record.status = MatchStatus::Ready;
            record.error_message = None;
            record.result = Some(report);
        })
        .await
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> AppResult<()> {
        let error_message = error_message.to_string();
        self.update(id, move |record| {
            record.status = MatchStatus::Failed;
            record.error_message = Some(error_message);
            record.result = None;
        })
        .await
    }

    async fn pending_ids(&self) -> AppResult<Vec<Uuid>> {
        let records = self.records.read().await;
        let mut pending: Vec<&MatchRecord> = records
            .values()
            .filter(|record| record.status == MatchStatus::Pending)
            .collect();
        pending.sort_by_key(|record| record.created_at);
        Ok(pending.into_iter().map(|record| record.id).collect())
    }
}
