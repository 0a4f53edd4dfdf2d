use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "watchtrack",
    version,
    about = "Track watch progress for movies and TV episodes"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Movie progress operations
    #[command(subcommand)]
    Movie(MovieCommand),
    /// Episode progress operations
    #[command(subcommand)]
    Episode(EpisodeCommand),
    /// Show-wide operations
    #[command(subcommand)]
    Show(ShowCommand),
}

#[derive(Debug, Subcommand)]
pub enum MovieCommand {
    /// Record a playback position
    Update {
        movie_id: i64,
        title: String,
        /// Current playback position in seconds
        current_time: f64,
        /// Total duration in seconds
        total_duration: f64,
    },
    /// Feed one periodic player position sample; junk samples are dropped
    Tick {
        movie_id: i64,
        title: String,
        current_time: f64,
        total_duration: f64,
    },
    /// Print stored progress and watched status
    Status { movie_id: i64, title: String },
    /// Mark as watched
    Watched { movie_id: i64, title: String },
    /// Clear the playback position and the watched flag
    Reset { movie_id: i64, title: String },
}

#[derive(Debug, Subcommand)]
pub enum EpisodeCommand {
    /// Record a playback position
    Update {
        show_id: i64,
        season: i64,
        episode: i64,
        /// Current playback position in seconds
        current_time: f64,
        /// Total duration in seconds
        total_duration: f64,
    },
    /// Feed one periodic player position sample; junk samples are dropped
    Tick {
        show_id: i64,
        season: i64,
        episode: i64,
        current_time: f64,
        total_duration: f64,
    },
    /// Print stored progress and watched status
    Status {
        show_id: i64,
        season: i64,
        episode: i64,
    },
    /// Mark as watched
    Watched {
        show_id: i64,
        season: i64,
        episode: i64,
    },
    /// Clear the playback position and the watched flag
    Reset {
        show_id: i64,
        season: i64,
        episode: i64,
    },
}

#[derive(Debug, Subcommand)]
pub enum ShowCommand {
    /// Mark everything up to and including S<season>E<episode> as watched
    WatchedThrough {
        show_id: i64,
        season: i64,
        episode: i64,
    },
    /// Print the latest watched episode across all watch signals
    Latest { show_id: i64 },
    /// Ask the metadata service for the next unwatched episode
    Next { show_id: i64 },
    /// Print the season to resume from
    Resume { show_id: i64 },
    /// Delete all stored progress for a show
    Reset { show_id: i64 },
}
