//! Show-wide aggregation over stored keys: resolving the latest watched
//! episode and bulk-resetting a show. Both discover records by prefix scan;
//! nothing else links episodes to their show.

use anyhow::Result;
use tracing::info;

use crate::db::KeyValueStore;

use super::keys::{
    episode_duration_key, episode_duration_prefix, episode_progress_prefix,
    episode_watched_prefix, latest_watched_key, parse_season_episode,
};
use super::store::WATCHED_THRESHOLD;
use super::{EpisodeRef, ProgressStore};

impl<S: KeyValueStore> ProgressStore<S> {
    /// The lexicographically greatest (season, episode) the user has
    /// watched, folded from three signals: the stored latest-watched
    /// pointer, explicit watched flags, and progress at or above the
    /// watched threshold. A max-fold keeps the result independent of scan
    /// order. `None` means no signal exists at all.
    pub(crate) fn latest_watched_episode(&self, show_id: i64) -> Result<Option<EpisodeRef>> {
        let mut latest = self.latest_pointer(show_id)?;

        for key in self
            .storage()
            .keys_with_prefix(&episode_watched_prefix(show_id))?
        {
            let Some(candidate) = parse_season_episode(&key) else {
                continue;
            };
            if !self.read_bool(&key)?.unwrap_or(false) {
                continue;
            }
            if latest.is_none_or(|current| candidate > current) {
                latest = Some(candidate);
            }
        }

        for key in self
            .storage()
            .keys_with_prefix(&episode_progress_prefix(show_id))?
        {
            let Some(candidate) = parse_season_episode(&key) else {
                continue;
            };
            let Some(total_duration) = self.read_f64(&episode_duration_key(show_id, candidate))?
            else {
                continue;
            };
            if total_duration <= 0.0 {
                continue;
            }
            let current_time = self.read_f64(&key)?.unwrap_or(0.0);
            if current_time / total_duration >= WATCHED_THRESHOLD
                && latest.is_none_or(|current| candidate > current)
            {
                latest = Some(candidate);
            }
        }

        Ok(latest)
    }

    /// Delete every progress, duration, and watched entry for the show's
    /// episodes, plus its latest-watched pointer. Returns the number of
    /// episode keys removed. The deletes are independent single-key
    /// operations; a concurrent reader may observe a partially cleared
    /// show.
    pub(crate) fn reset_show(&self, show_id: i64) -> Result<usize> {
        self.storage().remove(&latest_watched_key(show_id))?;

        let mut removed = 0;
        for prefix in [
            episode_progress_prefix(show_id),
            episode_watched_prefix(show_id),
            episode_duration_prefix(show_id),
        ] {
            for key in self.storage().keys_with_prefix(&prefix)? {
                if self.storage().remove(&key)? {
                    removed += 1;
                }
            }
        }

        info!("reset entire progress for show {show_id}: cleared {removed} keys");
        Ok(removed)
    }
}
