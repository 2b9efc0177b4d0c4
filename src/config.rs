use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Last.fm API key
    pub lastfm_api_key: String,

    /// Last.fm API base URL
    #[serde(default = "default_lastfm_api_url")]
    pub lastfm_api_url: String,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// PostgreSQL connection URL; matches are kept in memory when unset
    #[serde(default)]
    pub database_url: Option<String>,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// How many top artists to fetch per user and window
    #[serde(default = "default_top_artist_limit")]
    pub top_artist_limit: u32,

    /// Cache lifetime of top-artist lists, in seconds
    #[serde(default = "default_top_artists_ttl_secs")]
    pub top_artists_ttl_secs: u64,

    /// Cache lifetime of listener profiles, in seconds
    #[serde(default = "default_profile_ttl_secs")]
    pub profile_ttl_secs: u64,

    /// Run matches inside the request instead of on a background task
    #[serde(default)]
    pub inline_matching: bool,
}

fn default_lastfm_api_url() -> String {
    "https://ws.audioscrobbler.com/2.0/".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_top_artist_limit() -> u32 {
    300
}

fn default_top_artists_ttl_secs() -> u64 {
    43_200 // 12 hours
}

fn default_profile_ttl_secs() -> u64 {
    86_400 // 24 hours
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Socket address the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let vars = vec![("LASTFM_API_KEY".to_string(), "secret".to_string())];
        let config: Config = envy::from_iter(vars).unwrap();

        assert_eq!(config.lastfm_api_key, "secret");
        assert_eq!(config.lastfm_api_url, "https://ws.audioscrobbler.com/2.0/");
        assert_eq!(config.database_url, None);
        assert_eq!(config.top_artist_limit, 300);
        assert_eq!(config.top_artists_ttl_secs, 43_200);
        assert_eq!(config.profile_ttl_secs, 86_400);
        assert!(!config.inline_matching);
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_overrides() {
        let vars = vec![
            ("LASTFM_API_KEY".to_string(), "secret".to_string()),
            ("DATABASE_URL".to_string(), "postgres://localhost/taste".to_string()),
            ("PORT".to_string(), "8080".to_string()),
            ("TOP_ARTIST_LIMIT".to_string(), "50".to_string()),
            ("INLINE_MATCHING".to_string(), "true".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();

        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/taste")
        );
        assert_eq!(config.port, 8080);
        assert_eq!(config.top_artist_limit, 50);
        assert!(config.inline_matching);
    }

    #[test]
    fn test_missing_api_key_fails() {
        let vars: Vec<(String, String)> = vec![];
        assert!(envy::from_iter::<_, Config>(vars).is_err());
    }
}
