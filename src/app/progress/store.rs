use anyhow::Result;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::db::KeyValueStore;

use super::keys::latest_watched_key;
use super::{EpisodeRef, MediaId};

/// Completion fraction at or above which a record counts as watched.
pub(crate) const WATCHED_THRESHOLD: f64 = 0.95;

/// Keyed store for playback progress, duration, and watched flags.
///
/// Writes are per-key atomic only. A multi-key operation (progress, then
/// duration, then possibly the watched flag) is visible to concurrent
/// readers one key at a time; the write order is fixed so a reader on the
/// same connection always sees a duration for any progress it reads.
pub(crate) struct ProgressStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> ProgressStore<S> {
    pub(crate) fn new(store: S) -> Self {
        Self { store }
    }

    pub(super) fn storage(&self) -> &S {
        &self.store
    }

    /// Record a playback position. Invalid input is logged and dropped
    /// without touching stored state. Crossing the watched threshold sets
    /// the watched flag; dropping back below it later never clears the
    /// flag.
    pub(crate) fn update_progress(
        &self,
        id: &MediaId,
        current_time: f64,
        total_duration: f64,
    ) -> Result<()> {
        // Non-finite values cannot be stored as JSON numbers and are
        // rejected along with the range violations.
        let valid = current_time.is_finite()
            && total_duration.is_finite()
            && current_time >= 0.0
            && total_duration > 0.0
            && current_time <= total_duration;
        if !valid {
            warn!(
                "invalid progress values for {id}: current_time={current_time}, total_duration={total_duration}"
            );
            return Ok(());
        }

        self.store.set(&id.progress_key(), &json!(current_time))?;
        self.store.set(&id.duration_key(), &json!(total_duration))?;

        let ratio = current_time / total_duration;
        if ratio >= WATCHED_THRESHOLD {
            self.store.set(&id.watched_key(), &json!(true))?;
        }

        info!("updated progress for {id}: {:.1}%", ratio * 100.0);
        Ok(())
    }

    /// Entry point for periodic player ticks. Junk ticks from a player
    /// whose duration is not known yet (non-finite or zero) or whose clock
    /// is momentarily out of range are dropped silently; everything else
    /// goes through [`Self::update_progress`].
    pub(crate) fn record_tick(
        &self,
        id: &MediaId,
        current_time: f64,
        total_duration: f64,
    ) -> Result<()> {
        if !total_duration.is_finite() || total_duration <= 0.0 {
            return Ok(());
        }
        if !current_time.is_finite() || current_time < 0.0 || current_time > total_duration {
            return Ok(());
        }
        self.update_progress(id, current_time, total_duration)
    }

    /// Completion fraction in `[0, 1]`. Absent records read as zero.
    pub(crate) fn progress(&self, id: &MediaId) -> Result<f64> {
        let Some(total_duration) = self.read_f64(&id.duration_key())? else {
            return Ok(0.0);
        };
        if total_duration <= 0.0 {
            return Ok(0.0);
        }
        let current_time = self.read_f64(&id.progress_key())?.unwrap_or(0.0);
        Ok((current_time / total_duration).min(1.0))
    }

    /// Raw stored playback position in seconds, or zero if absent.
    pub(crate) fn current_time(&self, id: &MediaId) -> Result<f64> {
        Ok(self.read_f64(&id.progress_key())?.unwrap_or(0.0))
    }

    /// Watched status derived at read time from three signals: the stored
    /// flag, the completion fraction, and (for episodes) the show's
    /// latest-watched pointer, which covers everything up to and including
    /// its own position.
    pub(crate) fn is_watched(&self, id: &MediaId) -> Result<bool> {
        if self.read_bool(&id.watched_key())?.unwrap_or(false) {
            return Ok(true);
        }
        if self.progress(id)? >= WATCHED_THRESHOLD {
            return Ok(true);
        }
        if let MediaId::Episode { show_id, position } = id
            && let Some(latest) = self.latest_pointer(*show_id)?
            && *position <= latest
        {
            return Ok(true);
        }
        Ok(false)
    }

    /// Set the watched flag and snap progress to the stored duration. A
    /// record with no duration yet keeps no fabricated one.
    pub(crate) fn mark_watched(&self, id: &MediaId) -> Result<()> {
        self.store.set(&id.watched_key(), &json!(true))?;

        if let Some(total_duration) = self.read_f64(&id.duration_key())?
            && total_duration > 0.0
        {
            self.store.set(&id.progress_key(), &json!(total_duration))?;
        }

        info!("marked {id} as watched");
        Ok(())
    }

    /// Overwrite the show's latest-watched pointer. This is a direct set,
    /// not a monotonic max: callers moving the pointer backward will see
    /// the resolver still honor any later explicit or progress-derived
    /// watch signal.
    pub(crate) fn mark_watched_through(&self, show_id: i64, through: EpisodeRef) -> Result<()> {
        let pointer = json!({ "season": through.season, "episode": through.episode });
        self.store.set(&latest_watched_key(show_id), &pointer)?;

        info!("marked all episodes through {through} as watched for show {show_id}");
        Ok(())
    }

    /// Zero the playback position and clear the watched flag. The stored
    /// duration and the show's latest-watched pointer survive a reset.
    pub(crate) fn reset(&self, id: &MediaId) -> Result<()> {
        self.store.set(&id.progress_key(), &json!(0.0))?;
        self.store.set(&id.watched_key(), &json!(false))?;

        info!("reset progress for {id}");
        Ok(())
    }

    pub(super) fn latest_pointer(&self, show_id: i64) -> Result<Option<EpisodeRef>> {
        let Some(value) = self.store.get(&latest_watched_key(show_id))? else {
            return Ok(None);
        };
        let season = value.get("season").and_then(Value::as_i64);
        let episode = value.get("episode").and_then(Value::as_i64);
        match (season, episode) {
            (Some(season), Some(episode)) => Ok(Some(EpisodeRef::new(season, episode))),
            _ => {
                debug!("ignoring malformed latest-watched pointer for show {show_id}: {value}");
                Ok(None)
            }
        }
    }

    pub(super) fn read_f64(&self, key: &str) -> Result<Option<f64>> {
        let Some(value) = self.store.get(key)? else {
            return Ok(None);
        };
        match value.as_f64() {
            Some(number) => Ok(Some(number)),
            None => {
                debug!("ignoring non-numeric value under '{key}': {value}");
                Ok(None)
            }
        }
    }

    pub(super) fn read_bool(&self, key: &str) -> Result<Option<bool>> {
        let Some(value) = self.store.get(key)? else {
            return Ok(None);
        };
        match value.as_bool() {
            Some(flag) => Ok(Some(flag)),
            None => {
                debug!("ignoring non-boolean value under '{key}': {value}");
                Ok(None)
            }
        }
    }
}
