use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

/// Storage capability the progress tracker runs on: a single flat namespace
/// of string keys holding JSON values, with per-key atomic reads/writes and
/// prefix enumeration. There is no cross-key transaction; multi-key
/// operations observe each write independently.
///
/// `Database` is the process-wide implementation; tests inject
/// [`Database::open_in_memory`] instead of a file-backed store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: &Value) -> Result<()>;
    fn remove(&self, key: &str) -> Result<bool>;
    /// All stored keys starting with `prefix`, in key order.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS progress_kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM progress_kv WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(text) => {
                let value = serde_json::from_str(&text)
                    .with_context(|| format!("stored value under '{key}' is not valid JSON"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO progress_kv (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![key, value.to_string()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM progress_kv WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        // GLOB instead of LIKE: every key contains underscores, which LIKE
        // would treat as single-character wildcards.
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM progress_kv WHERE key GLOB ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![format!("{prefix}*")], |row| row.get(0))?;

        let mut keys = Vec::new();
        for key in rows {
            keys.push(key?);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open() -> Database {
        let db = Database::open_in_memory().expect("open in-memory database");
        db.migrate().expect("migrate");
        db
    }

    #[test]
    fn set_then_get_round_trips_json_values() {
        let db = open();
        db.set("movie_progress_1_x", &json!(42.5)).expect("set");
        db.set("movie_watched_1_x", &json!(true)).expect("set");

        assert_eq!(db.get("movie_progress_1_x").expect("get"), Some(json!(42.5)));
        assert_eq!(db.get("movie_watched_1_x").expect("get"), Some(json!(true)));
        assert_eq!(db.get("movie_progress_2_x").expect("get"), None);
    }

    #[test]
    fn set_overwrites_existing_value() {
        let db = open();
        db.set("episode_progress_9_s1_e1", &json!(10.0)).expect("set");
        db.set("episode_progress_9_s1_e1", &json!(20.0)).expect("set");

        assert_eq!(
            db.get("episode_progress_9_s1_e1").expect("get"),
            Some(json!(20.0))
        );
    }

    #[test]
    fn remove_reports_whether_a_key_existed() {
        let db = open();
        db.set("episode_watched_9_s1_e1", &json!(true)).expect("set");

        assert!(db.remove("episode_watched_9_s1_e1").expect("remove"));
        assert!(!db.remove("episode_watched_9_s1_e1").expect("remove"));
        assert_eq!(db.get("episode_watched_9_s1_e1").expect("get"), None);
    }

    #[test]
    fn prefix_scan_does_not_treat_underscores_as_wildcards() {
        let db = open();
        db.set("episode_progress_10_s1_e1", &json!(1.0)).expect("set");
        db.set("episode_progress_10_s1_e2", &json!(2.0)).expect("set");
        db.set("episode_progress_101_s1_e1", &json!(3.0)).expect("set");
        db.set("episode_duration_10_s1_e1", &json!(4.0)).expect("set");

        let keys = db.keys_with_prefix("episode_progress_10_").expect("scan");
        assert_eq!(
            keys,
            vec![
                "episode_progress_10_s1_e1".to_string(),
                "episode_progress_10_s1_e2".to_string(),
            ]
        );
    }
}
