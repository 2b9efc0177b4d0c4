use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{MatchRecord, MatchStatus},
    routes::AppState,
};

const MAX_USERNAME_LEN: usize = 50;

#[derive(Debug, Deserialize)]
pub struct CreateMatchRequest {
    pub username_a: String,
    pub username_b: String,
}

#[derive(Debug, Serialize)]
pub struct CreateMatchResponse {
    pub id: Uuid,
    pub status: MatchStatus,
    pub status_url: String,
    pub detail_url: String,
}

#[derive(Debug, Serialize)]
pub struct MatchStatusResponse {
    pub status: MatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn detail_url(id: Uuid) -> String {
    format!("/api/v1/matches/{}", id)
}

fn status_url(id: Uuid) -> String {
    format!("/api/v1/matches/{}/status", id)
}

/// Trims a username and checks it is a plausible Last.fm name
fn clean_username(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::InvalidInput(format!("{} cannot be empty", field)));
    }
    if value.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::InvalidInput(format!(
            "{} must be at most {} characters",
            field, MAX_USERNAME_LEN
        )));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::InvalidInput(format!(
            "{} may only contain letters, numbers, underscores, and hyphens",
            field
        )));
    }
    Ok(value.to_string())
}

/// 201 when the match already finished (inline run or self match), 202 while it is pending
fn creation_status(status: MatchStatus) -> StatusCode {
    match status {
        MatchStatus::Pending => StatusCode::ACCEPTED,
        MatchStatus::Ready | MatchStatus::Failed => StatusCode::CREATED,
    }
}

/// Handler for creating a match between two listeners
pub async fn create_match(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<CreateMatchRequest>,
) -> AppResult<(StatusCode, Json<CreateMatchResponse>)> {
    let username_a = clean_username("username_a", &request.username_a)?;
    let username_b = clean_username("username_b", &request.username_b)?;

    let mut record = MatchRecord::pending(username_a, username_b);
    let needs_run = state.runner.create(&mut record).await?;

    tracing::info!(
        request_id = %request_id,
        match_id = %record.id,
        user_a = %record.username_a,
        user_b = %record.username_b,
        inline = state.inline_matching,
        "Match requested"
    );

    let mut status = record.status;
    if needs_run {
        if state.inline_matching {
            state.runner.run(record.id).await?;
            status = state
                .store
                .get(record.id)
                .await?
                .map(|stored| stored.status)
                .unwrap_or(status);
        } else {
            state.runner.dispatch(record.id);
        }
    }

    Ok((
        creation_status(status),
        Json(CreateMatchResponse {
            id: record.id,
            status,
            status_url: status_url(record.id),
            detail_url: detail_url(record.id),
        }),
    ))
}

/// Handler returning the full match record
pub async fn get_match(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MatchRecord>> {
    let record = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Match {} not found", id)))?;
    Ok(Json(record))
}

/// Handler for status polling
pub async fn match_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MatchStatusResponse>> {
    let record = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Match {} not found", id)))?;

    let response = match record.status {
        MatchStatus::Pending => MatchStatusResponse {
            status: record.status,
            redirect: None,
            error: None,
        },
        MatchStatus::Ready => MatchStatusResponse {
            status: record.status,
            redirect: Some(detail_url(id)),
            error: None,
        },
        MatchStatus::Failed => MatchStatusResponse {
            status: record.status,
            redirect: None,
            error: record.error_message,
        },
    };

    Ok(Json(response))
}
