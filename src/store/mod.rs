//! Store - SQLite persistence for completions, scans and settings
//!
//! One connection behind a mutex. Async callers go through [`call_blocking`].
//!
//! ```text
//! ritual_completions (id, date, step, completed_at)   UNIQUE(date, step)
//! monster_scans      (id, timestamp, result)
//! settings           (id, key UNIQUE, value)
//! ```

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{HubError, HubResult};

pub const NO_MONSTERS: &str = "NO_MONSTERS";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ritual_completions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    step TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    UNIQUE(date, step)
);
CREATE TABLE IF NOT EXISTS monster_scans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    result TEXT NOT NULL DEFAULT 'NO_MONSTERS'
);
CREATE INDEX IF NOT EXISTS idx_monster_scans_timestamp ON monster_scans(timestamp);
CREATE TABLE IF NOT EXISTS settings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL UNIQUE,
    value TEXT NOT NULL
);
";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RitualCompletion {
    pub id: i64,
    pub date: String,
    pub step: String,
    pub completed_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonsterScan {
    pub id: i64,
    pub timestamp: String,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Setting {
    pub id: i64,
    pub key: String,
    pub value: String,
}

pub struct Store {
    conn: Mutex<Connection>,
}

/// Run a store closure on the blocking pool.
pub async fn call_blocking<T, F>(store: Arc<Store>, f: F) -> HubResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Store) -> HubResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| HubError::Task(format!("store task join error: {e}")))?
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> HubResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| HubError::Config(format!("mkdir {}: {e}", parent.display())))?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> HubResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> HubResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> HubResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| HubError::Task("store lock poisoned".into()))
    }

    // Ritual completions

    pub fn ritual_status(&self, date: &str) -> HubResult<Vec<RitualCompletion>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, date, step, completed_at FROM ritual_completions WHERE date = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![date], |row| {
            Ok(RitualCompletion { id: row.get(0)?, date: row.get(1)?, step: row.get(2)?, completed_at: row.get(3)? })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Insert the (date, step) row unless it exists. Returns the stored row and
    /// whether this call created it.
    pub fn complete_step(&self, date: &str, step: &str) -> HubResult<(RitualCompletion, bool)> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO ritual_completions (date, step, completed_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(date, step) DO NOTHING",
            params![date, step, now_rfc3339()],
        )?;
        let row = conn.query_row(
            "SELECT id, date, step, completed_at FROM ritual_completions WHERE date = ?1 AND step = ?2",
            params![date, step],
            |row| Ok(RitualCompletion { id: row.get(0)?, date: row.get(1)?, step: row.get(2)?, completed_at: row.get(3)? }),
        )?;
        Ok((row, inserted > 0))
    }

    /// Delete the given steps' rows for `date`. Returns rows removed.
    pub fn delete_steps(&self, date: &str, steps: &[&str]) -> HubResult<usize> {
        if steps.is_empty() {
            return Ok(0);
        }
        let placeholders = (0..steps.len()).map(|i| format!("?{}", i + 2)).collect::<Vec<_>>().join(", ");
        let sql = format!("DELETE FROM ritual_completions WHERE date = ?1 AND step IN ({placeholders})");
        let conn = self.conn()?;
        let args = std::iter::once(date).chain(steps.iter().copied());
        Ok(conn.execute(&sql, params_from_iter(args))?)
    }

    // Monster scans

    pub fn create_monster_scan(&self, result: &str) -> HubResult<MonsterScan> {
        let conn = self.conn()?;
        let timestamp = now_rfc3339();
        conn.execute("INSERT INTO monster_scans (timestamp, result) VALUES (?1, ?2)", params![timestamp, result])?;
        Ok(MonsterScan { id: conn.last_insert_rowid(), timestamp, result: result.to_string() })
    }

    /// Newest first.
    pub fn monster_scan_history(&self, limit: usize) -> HubResult<Vec<MonsterScan>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, result FROM monster_scans ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(MonsterScan { id: row.get(0)?, timestamp: row.get(1)?, result: row.get(2)? })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // Settings

    pub fn get_setting(&self, key: &str) -> HubResult<Option<Setting>> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT id, key, value FROM settings WHERE key = ?1",
            params![key],
            |row| Ok(Setting { id: row.get(0)?, key: row.get(1)?, value: row.get(2)? }),
        ).optional()?)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> HubResult<Setting> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value
             RETURNING id, key, value",
            params![key, value],
            |row| Ok(Setting { id: row.get(0)?, key: row.get(1)?, value: row.get(2)? }),
        )?)
    }

    pub fn all_settings(&self) -> HubResult<Vec<Setting>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, key, value FROM settings ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok(Setting { id: row.get(0)?, key: row.get(1)?, value: row.get(2)? }))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn completion_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let (first, created) = store.complete_step("2026-10-16", "TEETH").unwrap();
        assert!(created);
        let (second, created) = store.complete_step("2026-10-16", "TEETH").unwrap();
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(store.ritual_status("2026-10-16").unwrap().len(), 1);
    }

    #[test]
    fn delete_steps_is_scoped_to_date_and_names() {
        let store = Store::open_in_memory().unwrap();
        store.complete_step("2026-10-16", "TEETH").unwrap();
        store.complete_step("2026-10-16", "MORNING_TOILET").unwrap();
        store.complete_step("2026-10-17", "TEETH").unwrap();
        assert_eq!(store.delete_steps("2026-10-16", &["TEETH", "TOILET"]).unwrap(), 1);
        let left: Vec<_> = store.ritual_status("2026-10-16").unwrap().into_iter().map(|c| c.step).collect();
        assert_eq!(left, vec!["MORNING_TOILET"]);
        assert_eq!(store.ritual_status("2026-10-17").unwrap().len(), 1);
        assert_eq!(store.delete_steps("2026-10-16", &[]).unwrap(), 0);
    }

    #[test]
    fn settings_upsert_keeps_one_row() {
        let store = Store::open_in_memory().unwrap();
        let first = store.set_setting("home_assistant_url", "http://ha.local").unwrap();
        let second = store.set_setting("home_assistant_url", "http://ha.lan:8123").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.value, "http://ha.lan:8123");
        assert_eq!(store.all_settings().unwrap().len(), 1);
        assert!(store.get_setting("missing").unwrap().is_none());
    }

    #[test]
    fn scan_history_is_newest_first() {
        let store = Store::open_in_memory().unwrap();
        let ids: Vec<i64> = (0..5).map(|_| store.create_monster_scan(NO_MONSTERS).unwrap().id).collect();
        let history = store.monster_scan_history(2).unwrap();
        assert_eq!(history.iter().map(|s| s.id).collect::<Vec<_>>(), vec![ids[4], ids[3]]);
        assert!(history.iter().all(|s| s.result == NO_MONSTERS));
    }

    #[test]
    fn reopens_persisted_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested").join("hub.sqlite");
        {
            let store = Store::open(&path).unwrap();
            store.set_setting("k", "v").unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(store.get_setting("k").unwrap().unwrap().value, "v");
    }
}
