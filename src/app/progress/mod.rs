mod keys;
mod latest;
mod store;

pub(crate) use store::ProgressStore;

/// Position of an episode within a show. The derived ordering is season
/// first, episode as tiebreak; episode numbers are never compared across
/// seasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct EpisodeRef {
    pub(crate) season: i64,
    pub(crate) episode: i64,
}

impl EpisodeRef {
    pub(crate) fn new(season: i64, episode: i64) -> Self {
        Self { season, episode }
    }
}

impl std::fmt::Display for EpisodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{}E{}", self.season, self.episode)
    }
}

/// Identity of one tracked record. Movies are addressed by id plus
/// normalized title, episodes by show id and position; the same identity
/// always derives the same storage keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MediaId {
    Movie { id: i64, title: String },
    Episode { show_id: i64, position: EpisodeRef },
}

impl MediaId {
    pub(crate) fn movie(id: i64, title: &str) -> Self {
        Self::Movie {
            id,
            title: title.to_string(),
        }
    }

    pub(crate) fn episode(show_id: i64, season: i64, episode: i64) -> Self {
        Self::Episode {
            show_id,
            position: EpisodeRef::new(season, episode),
        }
    }
}

impl std::fmt::Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Movie { id, title } => write!(f, "movie {id} ({title})"),
            Self::Episode { show_id, position } => write!(f, "show {show_id} {position}"),
        }
    }
}
