//! External show metadata: which seasons a show has and which episodes a
//! season contains. Fetching and parsing are kept separate so the parsers
//! can be exercised on fixture payloads.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::http::get_text_with_retries;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const READ_TIMEOUT: Duration = Duration::from_secs(6);
const RETRY_DELAY: Duration = Duration::from_secs(1);
const ATTEMPTS: usize = 3;

/// One episode as listed by the metadata service, in the service's display
/// order within its season.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EpisodeInfo {
    pub(crate) id: i64,
    pub(crate) season: i64,
    pub(crate) episode: i64,
}

/// The metadata collaborator. Calls block and may fail; callers degrade to
/// "no next episode" instead of surfacing the failure.
pub(crate) trait MetadataSource: Send + Sync {
    /// Season numbers of a show, in the order the service publishes them.
    fn seasons(&self, show_id: i64) -> Result<Vec<i64>>;

    /// Episodes of one season, in the service's display order.
    fn season_episodes(&self, show_id: i64, season: i64) -> Result<Vec<EpisodeInfo>>;
}

/// TMDB-style HTTP client, configured from the environment.
pub(crate) struct TmdbClient {
    base_url: String,
    api_key: String,
}

impl TmdbClient {
    pub(crate) fn from_env() -> Result<Self> {
        let api_key = env::var("WATCHTRACK_TMDB_API_KEY")
            .context("WATCHTRACK_TMDB_API_KEY is not set")?;
        let base_url = env::var("WATCHTRACK_TMDB_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string());
        Ok(Self { base_url, api_key })
    }

    fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}{path}", self.base_url);
        let query = vec![("api_key".to_string(), self.api_key.clone())];
        let body = get_text_with_retries(
            &url,
            &query,
            CONNECT_TIMEOUT,
            READ_TIMEOUT,
            ATTEMPTS,
            RETRY_DELAY,
        )?;
        serde_json::from_str(&body).with_context(|| format!("malformed response from {path}"))
    }
}

impl MetadataSource for TmdbClient {
    fn seasons(&self, show_id: i64) -> Result<Vec<i64>> {
        let value = self.get_json(&format!("/tv/{show_id}"))?;
        parse_season_numbers(&value).ok_or_else(|| anyhow!("no season list for show {show_id}"))
    }

    fn season_episodes(&self, show_id: i64, season: i64) -> Result<Vec<EpisodeInfo>> {
        let value = self.get_json(&format!("/tv/{show_id}/season/{season}"))?;
        parse_season_episodes(&value)
            .ok_or_else(|| anyhow!("no episode list for show {show_id} season {season}"))
    }
}

pub(crate) fn parse_season_numbers(value: &Value) -> Option<Vec<i64>> {
    let seasons = value.get("seasons")?.as_array()?;

    let mut numbers = Vec::new();
    for season in seasons {
        if let Some(number) = season.get("season_number").and_then(Value::as_i64) {
            numbers.push(number);
        }
    }
    if numbers.is_empty() { None } else { Some(numbers) }
}

pub(crate) fn parse_season_episodes(value: &Value) -> Option<Vec<EpisodeInfo>> {
    let episodes = value.get("episodes")?.as_array()?;

    let mut parsed = Vec::new();
    for episode in episodes {
        let Some(id) = episode.get("id").and_then(Value::as_i64) else {
            continue;
        };
        let Some(season) = episode.get("season_number").and_then(Value::as_i64) else {
            continue;
        };
        let Some(number) = episode.get("episode_number").and_then(Value::as_i64) else {
            continue;
        };
        parsed.push(EpisodeInfo {
            id,
            season,
            episode: number,
        });
    }
    if parsed.is_empty() { None } else { Some(parsed) }
}
