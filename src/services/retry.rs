use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Retry schedule for calls to the listening-data provider
///
/// The first attempt runs immediately. Each following attempt waits for the
/// next delay in the schedule; once the schedule is exhausted the last error
/// is returned.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(vec![
            Duration::from_secs(5),
            Duration::from_secs(15),
            Duration::from_secs(45),
        ])
    }
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Policy that gives up after the first failure
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }

    /// Delay before the given retry (1-based), if the schedule allows one
    pub fn delay_for(&self, retry: usize) -> Option<Duration> {
        retry.checked_sub(1).and_then(|i| self.delays.get(i)).copied()
    }

    /// Whether an error is worth another attempt
    ///
    /// Rate limits and transient upstream failures are; missing users,
    /// bad input and local failures are not.
    pub fn is_retryable(error: &AppError) -> bool {
        match error {
            AppError::RateLimited(_)
            | AppError::Provider { .. }
            | AppError::ExternalApi(_)
            | AppError::HttpClient(_)
            | AppError::Cache(_) => true,
            AppError::NotFound(_)
            | AppError::InvalidInput(_)
            | AppError::Database(_)
            | AppError::Internal(_) => false,
        }
    }

    /// Runs `operation` until it succeeds, fails permanently or the schedule runs out
    pub async fn execute<T, F, Fut>(&self, label: &str, mut operation: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut retry = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if Self::is_retryable(&e) => {
                    retry += 1;
                    let Some(delay) = self.delay_for(retry) else {
                        tracing::error!(
                            operation = label,
                            attempts = retry,
                            error = %e,
                            "Retries exhausted"
                        );
                        return Err(e);
                    };

                    tracing::warn!(
                        operation = label,
                        retry,
                        max_attempts = self.max_attempts(),
                        delay_secs = delay.as_secs_f64(),
                        error = %e,
                        "Retryable failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
