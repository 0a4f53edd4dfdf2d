mod metadata;
mod planner;
mod progress;


use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::cli::{Cli, Command, EpisodeCommand, MovieCommand, ShowCommand};
use crate::db::Database;
use crate::paths::database_file_path;

use self::metadata::{MetadataSource, TmdbClient};
use self::planner::{NextEpisodeUpdate, NextEpisodeWatcher};
use self::progress::{EpisodeRef, MediaId, ProgressStore};

const NEXT_EPISODE_WAIT: Duration = Duration::from_secs(30);

pub fn run(cli: Cli) -> Result<()> {
    let store = ProgressStore::new(open_db()?);

    match cli.command {
        Command::Movie(command) => run_movie(&store, command),
        Command::Episode(command) => run_episode(&store, command),
        Command::Show(command) => run_show(&store, command),
    }
}

fn run_movie(store: &ProgressStore<Database>, command: MovieCommand) -> Result<()> {
    match command {
        MovieCommand::Update {
            movie_id,
            title,
            current_time,
            total_duration,
        } => {
            let id = MediaId::movie(movie_id, &title);
            store.update_progress(&id, current_time, total_duration)?;
            print_status(store, &id)
        }
        MovieCommand::Tick {
            movie_id,
            title,
            current_time,
            total_duration,
        } => {
            let id = MediaId::movie(movie_id, &title);
            store.record_tick(&id, current_time, total_duration)?;
            print_status(store, &id)
        }
        MovieCommand::Status { movie_id, title } => {
            print_status(store, &MediaId::movie(movie_id, &title))
        }
        MovieCommand::Watched { movie_id, title } => {
            let id = MediaId::movie(movie_id, &title);
            store.mark_watched(&id)?;
            print_status(store, &id)
        }
        MovieCommand::Reset { movie_id, title } => {
            let id = MediaId::movie(movie_id, &title);
            store.reset(&id)?;
            print_status(store, &id)
        }
    }
}

fn run_episode(store: &ProgressStore<Database>, command: EpisodeCommand) -> Result<()> {
    match command {
        EpisodeCommand::Update {
            show_id,
            season,
            episode,
            current_time,
            total_duration,
        } => {
            let id = MediaId::episode(show_id, season, episode);
            store.update_progress(&id, current_time, total_duration)?;
            print_status(store, &id)
        }
        EpisodeCommand::Tick {
            show_id,
            season,
            episode,
            current_time,
            total_duration,
        } => {
            let id = MediaId::episode(show_id, season, episode);
            store.record_tick(&id, current_time, total_duration)?;
            print_status(store, &id)
        }
        EpisodeCommand::Status {
            show_id,
            season,
            episode,
        } => print_status(store, &MediaId::episode(show_id, season, episode)),
        EpisodeCommand::Watched {
            show_id,
            season,
            episode,
        } => {
            let id = MediaId::episode(show_id, season, episode);
            store.mark_watched(&id)?;
            print_status(store, &id)
        }
        EpisodeCommand::Reset {
            show_id,
            season,
            episode,
        } => {
            let id = MediaId::episode(show_id, season, episode);
            store.reset(&id)?;
            print_status(store, &id)
        }
    }
}

fn run_show(store: &ProgressStore<Database>, command: ShowCommand) -> Result<()> {
    match command {
        ShowCommand::WatchedThrough {
            show_id,
            season,
            episode,
        } => {
            store.mark_watched_through(show_id, EpisodeRef::new(season, episode))?;
            println!("Marked show {show_id} as watched through S{season}E{episode}.");
            Ok(())
        }
        ShowCommand::Latest { show_id } => {
            match store.latest_watched_episode(show_id)? {
                Some(latest) => println!("Latest watched for show {show_id}: {latest}"),
                None => println!("No watch history for show {show_id} yet."),
            }
            Ok(())
        }
        ShowCommand::Next { show_id } => {
            let latest = store.latest_watched_episode(show_id)?;
            let mut watcher = NextEpisodeWatcher::new(metadata_source()?);
            watcher.request(show_id, latest);

            match wait_for_update(&watcher, NEXT_EPISODE_WAIT) {
                Some(update) => match update.next {
                    Some(next) => println!(
                        "Up next for show {}: S{}E{} (id {})",
                        update.show_id, next.season, next.episode, next.id
                    ),
                    None => println!("No next episode for show {}.", update.show_id),
                },
                None => println!("No next episode for show {show_id}."),
            }
            Ok(())
        }
        ShowCommand::Resume { show_id } => {
            let source = metadata_source()?;
            let latest = store.latest_watched_episode(show_id)?;
            match planner::resume_season(source.as_ref(), show_id, latest) {
                Some(season) => println!("Resume show {show_id} at season {season}."),
                None => println!("No seasons listed for show {show_id}."),
            }
            Ok(())
        }
        ShowCommand::Reset { show_id } => {
            let removed = store.reset_show(show_id)?;
            println!("Cleared {removed} stored entries for show {show_id}.");
            Ok(())
        }
    }
}

fn wait_for_update(watcher: &NextEpisodeWatcher, timeout: Duration) -> Option<NextEpisodeUpdate> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(update) = watcher.try_latest() {
            return Some(update);
        }
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

fn print_status(store: &ProgressStore<Database>, id: &MediaId) -> Result<()> {
    let progress = store.progress(id)?;
    let current_time = store.current_time(id)?;
    let watched = store.is_watched(id)?;

    println!(
        "{id}: {:.1}% ({current_time:.0}s), {}",
        progress * 100.0,
        if watched { "watched" } else { "unwatched" }
    );
    Ok(())
}

fn metadata_source() -> Result<Arc<dyn MetadataSource>> {
    Ok(Arc::new(TmdbClient::from_env()?))
}

fn open_db() -> Result<Database> {
    let db_path = database_file_path()?;
    let db = Database::open(&db_path)?;
    db.migrate()?;
    Ok(db)
}
