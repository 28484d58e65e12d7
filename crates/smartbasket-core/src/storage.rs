// SQLite-backed key-value store for client state that survives restarts.
//
// The only key the client writes is the bearer token; the table is a plain
// key/value map so it behaves like browser local storage.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

/// Key under which the bearer token is persisted.
pub const TOKEN_KEY: &str = "token";

pub struct LocalStorage {
    conn: Mutex<Connection>,
}

impl LocalStorage {
    /// Open (or create) the store at `path`. Pass `":memory:"` for an
    /// ephemeral store (useful for tests).
    pub fn open(path: &str) -> Result<Self> {
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create storage directory {}", parent.display())
                    })?;
                }
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open local storage at {path}"))?;

        conn.execute_batch("PRAGMA busy_timeout = 5000;")
            .context("failed to set storage pragmas")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS local_storage (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .context("failed to create local_storage table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Ephemeral store, never touching disk.
    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    /// Acquire the connection.
    ///
    /// Panics if the mutex is poisoned, which only happens if another thread
    /// panicked while holding it.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("storage mutex poisoned")
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT value FROM local_storage WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("failed to read storage key {key}"))
    }

    /// Insert or overwrite `key`.
    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO local_storage (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .with_context(|| format!("failed to write storage key {key}"))?;
        Ok(())
    }

    /// Remove `key`. Removing a missing key is not an error.
    pub fn remove_item(&self, key: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM local_storage WHERE key = ?1", params![key])
            .with_context(|| format!("failed to remove storage key {key}"))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
