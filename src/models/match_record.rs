use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

use super::{ListenerProfile, MatchResult};

/// Lifecycle of a match request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Pending,
    Ready,
    Failed,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "PENDING",
            MatchStatus::Ready => "READY",
            MatchStatus::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(MatchStatus::Pending),
            "READY" => Some(MatchStatus::Ready),
            "FAILED" => Some(MatchStatus::Failed),
            _ => None,
        }
    }
}

impl Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored outcome of a finished match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub user_a: ListenerProfile,
    pub user_b: ListenerProfile,
    #[serde(flatten)]
    pub result: MatchResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// A match request and, once finished, its report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: Uuid,
    pub username_a: String,
    pub username_b: String,
    pub status: MatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<MatchReport>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Creates a new pending match between two usernames
    pub fn pending(username_a: String, username_b: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username_a,
            username_b,
            status: MatchStatus::Pending,
            error_message: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_self_match(&self) -> bool {
        self.username_a == self.username_b
    }
}
