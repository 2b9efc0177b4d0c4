/// Last.fm API provider
///
/// Reads listening history through the Last.fm 2.0 REST API. Every call is a
/// GET against a single endpoint with a `method` parameter; errors come back
/// as `{"error": code, "message": ...}` bodies, sometimes with HTTP 200.
///
/// API Flow:
/// 1. Profile: `user.getInfo` → playcount, country, avatar
/// 2. Top artists: `user.getTopArtists` with `period` = window id
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{
        ArtistEntry, LastfmErrorResponse, LastfmTopArtistsResponse, LastfmUserInfoResponse,
        ListenerProfile, Window,
    },
    services::providers::ListeningDataProvider,
};
use reqwest::{Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

// Last.fm error codes
const INVALID_PARAMETERS: i32 = 6;
const RATE_LIMIT_EXCEEDED: i32 = 29;

#[derive(Clone)]
pub struct LastfmProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    cache: Cache,
    top_artists_ttl: u64,
    profile_ttl: u64,
}

impl LastfmProvider {
    pub fn new(
        cache: Cache,
        api_key: String,
        api_url: String,
        top_artists_ttl: u64,
        profile_ttl: u64,
    ) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http_client,
            api_key,
            api_url,
            cache,
            top_artists_ttl,
            profile_ttl,
        })
    }

    /// Calls one API method and decodes the response body
    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> AppResult<T> {
        let response = self
            .http_client
            .get(&self.api_url)
            .query(&[
                ("method", method),
                ("api_key", self.api_key.as_str()),
                ("format", "json"),
            ])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited("Rate limited by Last.fm".to_string()));
        }

        let body = response.text().await?;
        parse_response(method, status, &body)
    }

    async fn request_top_artists(
        &self,
        username: &str,
        window: Window,
        limit: u32,
    ) -> AppResult<Vec<ArtistEntry>> {
        let response: LastfmTopArtistsResponse = self
            .request(
                "user.getTopArtists",
                &[
                    ("user", username.to_string()),
                    ("period", window.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let artists = dedupe_artists(
            response
                .top_artists
                .artist
                .into_iter()
                .map(ArtistEntry::from)
                .collect(),
        );

        tracing::info!(
            username = %username,
            window = %window,
            artists = artists.len(),
            provider = "lastfm",
            "Top artists fetched"
        );

        Ok(artists)
    }

    async fn request_profile(&self, username: &str) -> AppResult<ListenerProfile> {
        let response: LastfmUserInfoResponse = self
            .request("user.getInfo", &[("user", username.to_string())])
            .await?;

        tracing::info!(username = %username, provider = "lastfm", "Profile fetched");

        Ok(ListenerProfile::from(response.user))
    }
}

#[async_trait::async_trait]
impl ListeningDataProvider for LastfmProvider {
    async fn fetch_top_artists(
        &self,
        username: &str,
        window: Window,
        limit: u32,
    ) -> AppResult<Vec<ArtistEntry>> {
        cached!(
            self.cache,
            CacheKey::TopArtists {
                username: username.to_string(),
                window,
                limit,
            },
            self.top_artists_ttl,
            self.request_top_artists(username, window, limit)
        )
    }

    async fn fetch_profile(&self, username: &str) -> AppResult<ListenerProfile> {
        cached!(
            self.cache,
            CacheKey::Profile(username.to_string()),
            self.profile_ttl,
            self.request_profile(username)
        )
    }

    fn name(&self) -> &'static str {
        "lastfm"
    }
}

/// Decodes a Last.fm response body, mapping API error payloads to `AppError`
fn parse_response<T: DeserializeOwned>(
    method: &str,
    status: StatusCode,
    body: &str,
) -> AppResult<T> {
    if let Ok(api_error) = serde_json::from_str::<LastfmErrorResponse>(body) {
        tracing::warn!(
            method = %method,
            code = api_error.error,
            message = %api_error.message,
            "Last.fm returned an error"
        );
        return Err(classify_error(api_error));
    }

    if !status.is_success() {
        return Err(AppError::ExternalApi(format!(
            "Last.fm returned status {}: {}",
            status, body
        )));
    }

    serde_json::from_str(body).map_err(|e| {
        tracing::error!(method = %method, error = %e, "Failed to deserialize Last.fm response");
        AppError::ExternalApi(format!("Failed to parse Last.fm response: {}", e))
    })
}

/// Keeps the first (highest ranked) entry per artist key
fn dedupe_artists(artists: Vec<ArtistEntry>) -> Vec<ArtistEntry> {
    let mut seen = HashSet::new();
    artists
        .into_iter()
        .filter(|artist| seen.insert(artist.key()))
        .collect()
}

fn classify_error(api_error: LastfmErrorResponse) -> AppError {
    match api_error.error {
        // 429 is not a documented code but mirrors the HTTP status some proxies return
        RATE_LIMIT_EXCEEDED | 429 => AppError::RateLimited(api_error.message),
        INVALID_PARAMETERS => AppError::NotFound(api_error.message),
        code => AppError::Provider {
            code,
            message: api_error.message,
        },
    }
}
