use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::task::JoinSet;
use uuid::Uuid;

use crate::{
    db::MatchStore,
    error::AppResult,
    models::{
        ListenerProfile, MatchRecord, MatchReport, MatchResult, MatchStatus, Window,
        WindowPayloads, WindowScores,
    },
    services::{matching::compute_match, providers::ListeningDataProvider, retry::RetryPolicy},
};

pub const SELF_MATCH_WARNING: &str = "Comparing a user to themselves; automatically 100%.";

/// Fetches listening data for a match, scores it and stores the outcome
pub struct MatchRunner {
    provider: Arc<dyn ListeningDataProvider>,
    store: Arc<dyn MatchStore>,
    retry: RetryPolicy,
    artist_limit: u32,
    /// Background runs started by `dispatch`, awaited by `drain`
    tasks: Mutex<JoinSet<()>>,
}

impl MatchRunner {
    pub fn new(
        provider: Arc<dyn ListeningDataProvider>,
        store: Arc<dyn MatchStore>,
        retry: RetryPolicy,
        artist_limit: u32,
    ) -> Self {
        Self {
            provider,
            store,
            retry,
            artist_limit,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Stores a new match request
    ///
    /// Comparing a user with themselves needs no listening data, so such a
    /// request is stored already finished with a perfect score. Returns
    /// whether the match still has to be run.
    pub async fn create(&self, record: &mut MatchRecord) -> AppResult<bool> {
        if record.is_self_match() {
            record.status = MatchStatus::Ready;
            record.result = Some(self_match_report(&record.username_a));
            self.store.insert(record).await?;
            tracing::info!(
                match_id = %record.id,
                username = %record.username_a,
                "Self match resolved"
            );
            return Ok(false);
        }

        self.store.insert(record).await?;
        Ok(true)
    }

    /// Runs a match on a background task tracked until `drain`
    pub fn dispatch(self: &Arc<Self>, id: Uuid) {
        let runner = Arc::clone(self);
        let mut tasks = self.lock_tasks();

        // Reap finished runs so the set only holds live ones
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            if let Err(e) = runner.run(id).await {
                tracing::error!(match_id = %id, error = %e, "Match run failed to record outcome");
            }
        });
    }

    /// Waits for every dispatched run to record its outcome
    pub async fn drain(&self) {
        let mut tasks = std::mem::take(&mut *self.lock_tasks());
        if tasks.is_empty() {
            return;
        }

        tracing::info!(in_flight = tasks.len(), "Waiting for dispatched matches");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Dispatched match task panicked");
            }
        }
    }

    /// Dispatches every match still `PENDING`, e.g. left over from a crash
    pub async fn resume_pending(self: &Arc<Self>) -> AppResult<usize> {
        let pending = self.store.pending_ids().await?;
        for id in &pending {
            self.dispatch(*id);
        }
        if !pending.is_empty() {
            tracing::info!(resumed = pending.len(), "Resumed pending matches");
        }
        Ok(pending.len())
    }

    fn lock_tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs a stored match to completion
    ///
    /// Provider failures are retried per the retry policy; a failure that
    /// survives it marks the match `FAILED`. The returned error only covers
    /// the store itself.
    pub async fn run(&self, id: Uuid) -> AppResult<()> {
        let Some(record) = self.store.get(id).await? else {
            tracing::warn!(match_id = %id, "Match not found, skipping run");
            return Ok(());
        };

        let start = Instant::now();
        tracing::info!(
            match_id = %id,
            user_a = %record.username_a,
            user_b = %record.username_b,
            provider = self.provider.name(),
            "Running match"
        );

        let outcome = self
            .retry
            .execute("run_match", || {
                self.fetch_and_score(&record.username_a, &record.username_b)
            })
            .await;

        match outcome {
            Ok(report) => {
                tracing::info!(
                    match_id = %id,
                    final_score = report.result.final_score,
                    processing_time_ms = start.elapsed().as_millis(),
                    "Match ready"
                );
                self.store.mark_ready(id, &report).await
            }
            Err(e) => {
                tracing::error!(match_id = %id, error = %e, "Match failed");
                self.store.mark_failed(id, &e.to_string()).await
            }
        }
    }

    async fn fetch_and_score(&self, username_a: &str, username_b: &str) -> AppResult<MatchReport> {
        let (user_a, user_b) = tokio::try_join!(
            self.provider.fetch_profile(username_a),
            self.provider.fetch_profile(username_b),
        )?;

        let (payloads_a, payloads_b) = tokio::try_join!(
            self.fetch_payloads(username_a),
            self.fetch_payloads(username_b),
        )?;

        Ok(MatchReport {
            user_a,
            user_b,
            result: compute_match(&payloads_a, &payloads_b),
            warning: None,
        })
    }

    async fn fetch_payloads(&self, username: &str) -> AppResult<WindowPayloads> {
        let mut payloads = WindowPayloads::new();
        for window in Window::ALL {
            let artists = self
                .provider
                .fetch_top_artists(username, window, self.artist_limit)
                .await?;
            payloads.insert(window, artists);
        }
        Ok(payloads)
    }
}

fn self_match_report(username: &str) -> MatchReport {
    let profile = ListenerProfile {
        username: username.to_string(),
        ..Default::default()
    };

    MatchReport {
        user_a: profile.clone(),
        user_b: profile,
        result: MatchResult {
            scores: WindowScores::uniform(1.0),
            final_score: 100.0,
            source_window: Window::Overall,
            overlap: vec![],
            recs_for_a: vec![],
            recs_for_b: vec![],
        },
        warning: Some(SELF_MATCH_WARNING.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::InMemoryMatchStore,
        error::AppError,
        models::ArtistEntry,
        services::providers::MockListeningDataProvider,
    };
    use mockall::predicate::eq;
    use std::time::Duration;

    fn profile(username: &str) -> ListenerProfile {
        ListenerProfile {
            username: username.to_string(),
            playcount: 1000,
            ..Default::default()
        }
    }

    fn provider_with_library() -> MockListeningDataProvider {
        let mut provider = MockListeningDataProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_fetch_profile()
            .returning(|username| Ok(profile(username)));
        provider
            .expect_fetch_top_artists()
            .returning(|username, window, _| {
                let shared = ArtistEntry::new("Shared Artist", None, 40);
                let own = ArtistEntry::new(format!("{} {} pick", username, window), None, 10);
                Ok(vec![shared, own])
            });
        provider
    }

    fn runner(provider: MockListeningDataProvider, store: Arc<InMemoryMatchStore>) -> MatchRunner {
        MatchRunner::new(
            Arc::new(provider),
            store,
            RetryPolicy::new(vec![Duration::ZERO; 3]),
            300,
        )
    }

    #[tokio::test]
    async fn test_run_marks_match_ready() {
        let store = Arc::new(InMemoryMatchStore::new());
        let runner = runner(provider_with_library(), store.clone());
        let mut record = MatchRecord::pending("alice".to_string(), "bob".to_string());

        assert!(runner.create(&mut record).await.unwrap());
        runner.run(record.id).await.unwrap();

        let stored = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Ready);

        let report = stored.result.unwrap();
        assert_eq!(report.user_a.username, "alice");
        assert_eq!(report.user_b.username, "bob");
        assert_eq!(report.result.source_window, Window::Overall);
        assert_eq!(report.result.overlap.len(), 1);
        assert_eq!(report.result.overlap[0].artist, "Shared Artist");
        assert_eq!(report.result.recs_for_a[0].artist, "bob overall pick");
        assert_eq!(report.result.recs_for_b[0].artist, "alice overall pick");
        assert!(report.result.final_score > 0.0 && report.result.final_score < 100.0);
    }

    #[tokio::test]
    async fn test_fetches_every_window_with_limit() {
        let mut provider = MockListeningDataProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_fetch_profile()
            .times(2)
            .returning(|username| Ok(profile(username)));
        for window in Window::ALL {
            provider
                .expect_fetch_top_artists()
                .with(eq("alice"), eq(window), eq(300))
                .times(1)
                .returning(|_, _, _| Ok(vec![]));
            provider
                .expect_fetch_top_artists()
                .with(eq("bob"), eq(window), eq(300))
                .times(1)
                .returning(|_, _, _| Ok(vec![]));
        }

        let store = Arc::new(InMemoryMatchStore::new());
        let runner = runner(provider, store.clone());
        let mut record = MatchRecord::pending("alice".to_string(), "bob".to_string());
        runner.create(&mut record).await.unwrap();

        runner.run(record.id).await.unwrap();

        let stored = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Ready);
        assert_eq!(stored.result.unwrap().result.final_score, 0.0);
    }

    #[tokio::test]
    async fn test_rate_limit_retried_then_succeeds() {
        let mut provider = MockListeningDataProvider::new();
        provider.expect_name().return_const("mock");

        let mut seq = mockall::Sequence::new();
        provider
            .expect_fetch_profile()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(AppError::RateLimited("Rate Limit Exceeded".to_string())));
        provider
            .expect_fetch_profile()
            .returning(|username| Ok(profile(username)));
        provider
            .expect_fetch_top_artists()
            .returning(|_, _, _| Ok(vec![ArtistEntry::new("Low", None, 3)]));

        let store = Arc::new(InMemoryMatchStore::new());
        let runner = runner(provider, store.clone());
        let mut record = MatchRecord::pending("alice".to_string(), "bob".to_string());
        runner.create(&mut record).await.unwrap();

        runner.run(record.id).await.unwrap();

        let stored = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Ready);
        assert_eq!(stored.result.unwrap().result.final_score, 100.0);
    }

    #[tokio::test]
    async fn test_persistent_rate_limit_marks_failed() {
        let mut provider = MockListeningDataProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_fetch_profile()
            .returning(|_| Err(AppError::RateLimited("Rate Limit Exceeded".to_string())));

        let store = Arc::new(InMemoryMatchStore::new());
        let runner = runner(provider, store.clone());
        let mut record = MatchRecord::pending("alice".to_string(), "bob".to_string());
        runner.create(&mut record).await.unwrap();

        runner.run(record.id).await.unwrap();

        let stored = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Failed);
        assert_eq!(
            stored.error_message.as_deref(),
            Some("Rate limited: Rate Limit Exceeded")
        );
    }

    #[tokio::test]
    async fn test_unknown_user_fails_without_retry() {
        let mut provider = MockListeningDataProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_fetch_profile()
            .with(eq("alice"))
            .returning(|username| Ok(profile(username)));
        provider
            .expect_fetch_profile()
            .with(eq("ghost"))
            .times(1)
            .returning(|_| Err(AppError::NotFound("User not found".to_string())));

        let store = Arc::new(InMemoryMatchStore::new());
        let runner = runner(provider, store.clone());
        let mut record = MatchRecord::pending("alice".to_string(), "ghost".to_string());
        runner.create(&mut record).await.unwrap();

        runner.run(record.id).await.unwrap();

        let stored = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Failed);
        assert_eq!(
            stored.error_message.as_deref(),
            Some("Not found: User not found")
        );
    }

    #[tokio::test]
    async fn test_self_match_skips_provider() {
        let provider = MockListeningDataProvider::new();
        let store = Arc::new(InMemoryMatchStore::new());
        let runner = runner(provider, store.clone());
        let mut record = MatchRecord::pending("alice".to_string(), "alice".to_string());

        assert!(!runner.create(&mut record).await.unwrap());

        let stored = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Ready);
        let report = stored.result.unwrap();
        assert_eq!(report.result.final_score, 100.0);
        assert_eq!(report.result.scores, WindowScores::uniform(1.0));
        assert!(report.result.overlap.is_empty());
        assert_eq!(report.warning.as_deref(), Some(SELF_MATCH_WARNING));
    }

    #[tokio::test]
    async fn test_drain_waits_for_dispatched_runs() {
        let store = Arc::new(InMemoryMatchStore::new());
        let runner = Arc::new(runner(provider_with_library(), store.clone()));
        let mut record = MatchRecord::pending("alice".to_string(), "bob".to_string());
        runner.create(&mut record).await.unwrap();

        runner.dispatch(record.id);
        runner.drain().await;

        let stored = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Ready);
    }

    #[tokio::test]
    async fn test_drain_without_dispatch_returns() {
        let store = Arc::new(InMemoryMatchStore::new());
        let runner = runner(MockListeningDataProvider::new(), store);
        tokio_test::assert_ready!(tokio_test::task::spawn(runner.drain()).poll());
    }

    #[tokio::test]
    async fn test_resume_pending_finishes_leftover_matches() {
        let store = Arc::new(InMemoryMatchStore::new());
        let leftover = MatchRecord::pending("alice".to_string(), "bob".to_string());
        store.insert(&leftover).await.unwrap();

        let runner = Arc::new(runner(provider_with_library(), store.clone()));
        assert_eq!(runner.resume_pending().await.unwrap(), 1);
        runner.drain().await;

        let stored = store.get(leftover.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Ready);
        assert_eq!(runner.resume_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_unknown_match_is_noop() {
        let provider = MockListeningDataProvider::new();
        let store = Arc::new(InMemoryMatchStore::new());
        let runner = runner(provider, store);

        assert!(runner.run(Uuid::new_v4()).await.is_ok());
    }
}
