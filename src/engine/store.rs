// Skiff Engine — Preference Store
//
// The browser pages kept three scalars in localStorage: the page size, the
// theme, and the last-active bot. This is their headless equivalent: a
// SQLite key/value table in the per-user data directory. Nothing else is
// persisted — conversations and cached pages live for the session only.

use crate::atoms::constants::{PREF_LAST_BOT, PREF_PAGE_SIZE, PREF_THEME};
use crate::atoms::error::EngineResult;
use crate::engine::browser::clamp_page_size;
use log::info;
use parking_lot::Mutex;
use rusqlite::{params, Connection};

/// Thread-safe preference store.
pub struct PrefStore {
    conn: Mutex<Connection>,
}

impl PrefStore {
    /// Open (or create) the preference database in the data directory.
    pub fn open() -> EngineResult<Self> {
        let path = super::paths::pref_db_path();
        info!("[store] opening preference store at {:?}", path);
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> EngineResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> EngineResult<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS prefs (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )?;
        Ok(PrefStore { conn: Mutex::new(conn) })
    }

    // ── Raw key/value access ───────────────────────────────────────────

    pub fn get(&self, key: &str) -> EngineResult<Option<String>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT value FROM prefs WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set(&self, key: &str, value: &str) -> EngineResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO prefs (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // ── Typed preferences ──────────────────────────────────────────────

    /// Saved page size, clamped to the valid window. An unparsable stored
    /// value (hand-edited database) reads as absent rather than failing.
    pub fn page_size(&self) -> EngineResult<Option<u32>> {
        Ok(self
            .get(PREF_PAGE_SIZE)?
            .and_then(|v| v.parse::<u32>().ok())
            .map(clamp_page_size))
    }

    pub fn set_page_size(&self, size: u32) -> EngineResult<()> {
        self.set(PREF_PAGE_SIZE, &clamp_page_size(size).to_string())
    }

    pub fn theme(&self) -> EngineResult<Option<String>> {
        self.get(PREF_THEME)
    }

    pub fn set_theme(&self, theme: &str) -> EngineResult<()> {
        self.set(PREF_THEME, theme)
    }

    pub fn last_bot(&self) -> EngineResult<Option<String>> {
        self.get(PREF_LAST_BOT)
    }

    pub fn set_last_bot(&self, bot_id: &str) -> EngineResult<()> {
        self.set(PREF_LAST_BOT, bot_id)
    }
}
