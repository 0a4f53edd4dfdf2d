//! Next-episode planning on top of the latest-watched signal and the
//! metadata service. Season 0 holds specials and is excluded from default
//! progression; successor episodes follow the service's list order, not
//! episode-number arithmetic.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use tracing::warn;

use super::metadata::{EpisodeInfo, MetadataSource};
use super::progress::EpisodeRef;

/// What to watch next, or `None` at the end of the series. Metadata
/// failures also resolve to `None`; the planner never surfaces an error.
pub(crate) fn next_episode(
    source: &dyn MetadataSource,
    show_id: i64,
    latest: Option<EpisodeRef>,
) -> Option<EpisodeInfo> {
    match latest {
        Some(latest) => next_after(source, show_id, latest),
        None => {
            let first_season = *regular_seasons(source, show_id)?.first()?;
            first_episode_of(source, show_id, first_season)
        }
    }
}

/// Season to present when returning to a show: the latest watched season
/// if the show still lists it, otherwise the first regular season.
pub(crate) fn resume_season(
    source: &dyn MetadataSource,
    show_id: i64,
    latest: Option<EpisodeRef>,
) -> Option<i64> {
    let seasons = regular_seasons(source, show_id)?;
    if let Some(latest) = latest
        && seasons.contains(&latest.season)
    {
        return Some(latest.season);
    }
    seasons.first().copied()
}

fn next_after(
    source: &dyn MetadataSource,
    show_id: i64,
    latest: EpisodeRef,
) -> Option<EpisodeInfo> {
    let episodes = match source.season_episodes(show_id, latest.season) {
        Ok(episodes) => episodes,
        Err(err) => {
            warn!("episode lookup failed for show {show_id} season {}: {err:#}", latest.season);
            return None;
        }
    };

    // Episode <= 0 is the "start of season" sentinel.
    if latest.episode <= 0 {
        return episodes.first().copied();
    }

    if let Some(index) = episodes
        .iter()
        .position(|candidate| candidate.episode == latest.episode)
        && index + 1 < episodes.len()
    {
        return Some(episodes[index + 1]);
    }

    // Last episode of its season (or not in the list at all): roll over to
    // the next regular season.
    let seasons = regular_seasons(source, show_id)?;
    let index = seasons.iter().position(|season| *season == latest.season)?;
    let next_season = *seasons.get(index + 1)?;
    first_episode_of(source, show_id, next_season)
}

fn first_episode_of(source: &dyn MetadataSource, show_id: i64, season: i64) -> Option<EpisodeInfo> {
    match source.season_episodes(show_id, season) {
        Ok(episodes) => episodes.first().copied(),
        Err(err) => {
            warn!("episode lookup failed for show {show_id} season {season}: {err:#}");
            None
        }
    }
}

/// Non-special seasons in ascending order, or `None` when the show lists
/// none or the lookup fails.
fn regular_seasons(source: &dyn MetadataSource, show_id: i64) -> Option<Vec<i64>> {
    let mut seasons = match source.seasons(show_id) {
        Ok(seasons) => seasons,
        Err(err) => {
            warn!("season lookup failed for show {show_id}: {err:#}");
            return None;
        }
    };
    seasons.retain(|season| *season > 0);
    seasons.sort_unstable();
    if seasons.is_empty() { None } else { Some(seasons) }
}

/// A completed next-episode computation. Updates from superseded requests
/// are discarded before they are ever observed.
#[derive(Debug)]
pub(crate) struct NextEpisodeUpdate {
    pub(crate) show_id: i64,
    pub(crate) next: Option<EpisodeInfo>,
    generation: u64,
}

/// Runs next-episode computations off the caller's thread, so a playback
/// timer or UI loop never blocks on metadata I/O. Each `request`
/// supersedes the one before it; `try_latest` only ever yields the result
/// of the newest request, no matter in which order the fetches finish.
pub(crate) struct NextEpisodeWatcher {
    source: Arc<dyn MetadataSource>,
    tx: mpsc::Sender<NextEpisodeUpdate>,
    rx: mpsc::Receiver<NextEpisodeUpdate>,
    generation: u64,
}

impl NextEpisodeWatcher {
    pub(crate) fn new(source: Arc<dyn MetadataSource>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            source,
            tx,
            rx,
            generation: 0,
        }
    }

    /// Start computing the next episode for `show_id` in the background.
    /// The caller supplies the latest-watched signal it already holds, so
    /// no store access happens off-thread.
    pub(crate) fn request(&mut self, show_id: i64, latest: Option<EpisodeRef>) {
        self.generation += 1;
        let generation = self.generation;
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let next = next_episode(source.as_ref(), show_id, latest);
            // The receiver may be gone if the watcher was dropped.
            let _ = tx.send(NextEpisodeUpdate {
                show_id,
                next,
                generation,
            });
        });
    }

    /// Drain completed computations, returning the newest one that still
    /// matches the newest request. Stale results are dropped.
    pub(crate) fn try_latest(&self) -> Option<NextEpisodeUpdate> {
        let mut newest = None;
        while let Ok(update) = self.rx.try_recv() {
            if update.generation == self.generation {
                newest = Some(update);
            }
        }
        newest
    }
}
