//! Deterministic storage keys.
//!
//! Every record address is a string built from a type tag plus the
//! identifying fields, so the same identity always reads and writes the
//! same entries. Two movie titles that normalize identically collide for
//! the same movie id; that matches the historical key layout and is left
//! as-is.

use super::{EpisodeRef, MediaId};

/// Spaces become underscores, then everything is lowercased.
pub(crate) fn normalize_title(title: &str) -> String {
    title.replace(' ', "_").to_lowercase()
}

impl MediaId {
    pub(crate) fn progress_key(&self) -> String {
        match self {
            Self::Movie { id, title } => {
                format!("movie_progress_{id}_{}", normalize_title(title))
            }
            Self::Episode { show_id, position } => episode_progress_key(*show_id, *position),
        }
    }

    pub(crate) fn duration_key(&self) -> String {
        match self {
            Self::Movie { id, title } => {
                format!("movie_duration_{id}_{}", normalize_title(title))
            }
            Self::Episode { show_id, position } => episode_duration_key(*show_id, *position),
        }
    }

    pub(crate) fn watched_key(&self) -> String {
        match self {
            Self::Movie { id, title } => {
                format!("movie_watched_{id}_{}", normalize_title(title))
            }
            Self::Episode { show_id, position } => episode_watched_key(*show_id, *position),
        }
    }
}

pub(crate) fn episode_progress_key(show_id: i64, position: EpisodeRef) -> String {
    format!(
        "episode_progress_{show_id}_s{}_e{}",
        position.season, position.episode
    )
}

pub(crate) fn episode_duration_key(show_id: i64, position: EpisodeRef) -> String {
    format!(
        "episode_duration_{show_id}_s{}_e{}",
        position.season, position.episode
    )
}

pub(crate) fn episode_watched_key(show_id: i64, position: EpisodeRef) -> String {
    format!(
        "episode_watched_{show_id}_s{}_e{}",
        position.season, position.episode
    )
}

pub(crate) fn latest_watched_key(show_id: i64) -> String {
    format!("episode_latest_watched_{show_id}")
}

pub(crate) fn episode_progress_prefix(show_id: i64) -> String {
    format!("episode_progress_{show_id}_")
}

pub(crate) fn episode_duration_prefix(show_id: i64) -> String {
    format!("episode_duration_{show_id}_")
}

pub(crate) fn episode_watched_prefix(show_id: i64) -> String {
    format!("episode_watched_{show_id}_")
}

/// Recover the season/episode pair from keys shaped like
/// `..._s<season>_e<episode>`. Malformed keys yield `None` rather than a
/// bogus position.
pub(crate) fn parse_season_episode(key: &str) -> Option<EpisodeRef> {
    let mut parts = key.rsplit('_');
    let episode = parts.next()?.strip_prefix('e')?.parse().ok()?;
    let season = parts.next()?.strip_prefix('s')?.parse().ok()?;
    Some(EpisodeRef::new(season, episode))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movie_keys_normalize_the_title() {
        let id = MediaId::movie(603, "The Matrix Reloaded");
        assert_eq!(id.progress_key(), "movie_progress_603_the_matrix_reloaded");
        assert_eq!(id.duration_key(), "movie_duration_603_the_matrix_reloaded");
        assert_eq!(id.watched_key(), "movie_watched_603_the_matrix_reloaded");
    }

    #[test]
    fn episode_keys_embed_season_and_episode() {
        let id = MediaId::episode(123, 3, 14);
        assert_eq!(id.progress_key(), "episode_progress_123_s3_e14");
        assert_eq!(id.duration_key(), "episode_duration_123_s3_e14");
        assert_eq!(id.watched_key(), "episode_watched_123_s3_e14");
        assert_eq!(latest_watched_key(123), "episode_latest_watched_123");
    }

    #[test]
    fn distinct_titles_can_collide_after_normalization() {
        let a = MediaId::movie(7, "Up Above");
        let b = MediaId::movie(7, "UP ABOVE");
        assert_eq!(a.progress_key(), b.progress_key());
    }

    #[test]
    fn parse_season_episode_round_trips() {
        let parsed = parse_season_episode("episode_progress_123_s3_e14").expect("key should parse");
        assert_eq!(parsed, EpisodeRef::new(3, 14));
    }

    #[test]
    fn parse_season_episode_rejects_malformed_keys() {
        assert_eq!(parse_season_episode("episode_progress_123"), None);
        assert_eq!(parse_season_episode("episode_progress_123_s3_x14"), None);
        assert_eq!(parse_season_episode("episode_progress_123_sx_e14"), None);
        assert_eq!(parse_season_episode("episode_latest_watched_123"), None);
    }
}
