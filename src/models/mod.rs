use serde::{de, Deserialize, Deserializer, Serialize};
use std::{collections::HashMap, fmt::Display};

mod match_record;
mod matching;

pub use match_record::{MatchRecord, MatchReport, MatchStatus};
pub use matching::{
    MatchResult, OverlapEntry, PreferenceVector, RecommendationEntry, WindowScores,
};

/// Listening-history time range a top-artist list covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Window {
    /// Short-term taste (~3 months)
    #[serde(rename = "3month")]
    ThreeMonth,
    /// Medium-term taste (~12 months)
    #[serde(rename = "12month")]
    TwelveMonth,
    /// All-time taste
    #[serde(rename = "overall")]
    Overall,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::ThreeMonth, Window::TwelveMonth, Window::Overall];

    /// Identifier used by the listening-data provider (Last.fm `period`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Window::ThreeMonth => "3month",
            Window::TwelveMonth => "12month",
            Window::Overall => "overall",
        }
    }
}

impl Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One artist from a user's ranked top-artist list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtistEntry {
    pub name: String,
    /// Stable catalog identifier (MusicBrainz ID on Last.fm), often blank
    #[serde(default)]
    pub external_id: Option<String>,
    pub play_count: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl ArtistEntry {
    pub fn new(name: impl Into<String>, external_id: Option<&str>, play_count: u64) -> Self {
        Self {
            name: name.into(),
            external_id: external_id.map(str::to_string),
            play_count,
            url: None,
        }
    }

    /// Matching identity: external ID when present, otherwise the lower-cased name
    pub fn key(&self) -> String {
        match self.external_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.name.to_lowercase(),
        }
    }
}

/// Ranked artist lists for one user, keyed by window
pub type WindowPayloads = HashMap<Window, Vec<ArtistEntry>>;

/// Public profile details of a listener
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListenerProfile {
    pub username: String,
    pub playcount: u64,
    pub realname: String,
    pub country: String,
    pub avatar_url: String,
}

// ============================================================================
// Last.fm API Types
// ============================================================================

/// Response of `user.getTopArtists`
#[derive(Debug, Deserialize)]
pub struct LastfmTopArtistsResponse {
    #[serde(rename = "topartists")]
    pub top_artists: LastfmTopArtists,
}

#[derive(Debug, Deserialize)]
pub struct LastfmTopArtists {
    #[serde(default)]
    pub artist: Vec<LastfmArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastfmArtist {
    pub name: String,
    #[serde(default)]
    pub mbid: Option<String>,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub playcount: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl From<LastfmArtist> for ArtistEntry {
    fn from(artist: LastfmArtist) -> Self {
        ArtistEntry {
            name: artist.name,
            external_id: artist.mbid,
            play_count: artist.playcount,
            url: artist.url,
        }
    }
}

/// Response of `user.getInfo`
#[derive(Debug, Deserialize)]
pub struct LastfmUserInfoResponse {
    pub user: LastfmUser,
}

#[derive(Debug, Deserialize)]
pub struct LastfmUser {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub playcount: u64,
    #[serde(default)]
    pub realname: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub image: Vec<LastfmImage>,
}

#[derive(Debug, Deserialize)]
pub struct LastfmImage {
    #[serde(rename = "#text", default)]
    pub url: String,
}

impl From<LastfmUser> for ListenerProfile {
    fn from(user: LastfmUser) -> Self {
        // Images come smallest first
        let avatar_url = user
            .image
            .iter()
            .rev()
            .map(|image| image.url.as_str())
            .find(|url| !url.is_empty())
            .unwrap_or_default()
            .to_string();

        ListenerProfile {
            username: user.name,
            playcount: user.playcount,
            realname: user.realname.unwrap_or_default(),
            country: user.country.unwrap_or_default(),
            avatar_url,
        }
    }
}

/// Error payload Last.fm returns with HTTP 200 or 4xx
#[derive(Debug, Deserialize)]
pub struct LastfmErrorResponse {
    pub error: i32,
    #[serde(default)]
    pub message: String,
}

/// Last.fm encodes counts as strings; accept both strings and numbers
fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) if s.trim().is_empty() => Ok(0),
        Count::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}
