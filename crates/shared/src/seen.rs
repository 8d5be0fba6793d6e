use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS seen (
    url TEXT PRIMARY KEY,
    first_seen INTEGER
)";

/// A URL accepted by a previous run
#[derive(Debug, Clone, PartialEq)]
pub struct SeenRecord {
    pub url: String,
    pub first_seen: DateTime<Utc>,
}

/// Durable set of article URLs that have already been selected.
///
/// Append-only: rows are inserted once and never updated or removed.
pub struct SeenStore {
    conn: Mutex<Connection>,
}

impl SeenStore {
    /// Open (or create) `seen.db` inside `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        let db_path = data_dir.join("seen.db");
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open seen store at {}", db_path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory seen store")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])
            .context("Failed to create seen table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("seen store connection lock poisoned"))
    }

    pub fn is_seen(&self, url: &str) -> Result<bool> {
        if url.is_empty() {
            return Ok(false);
        }
        let conn = self.lock()?;
        let hit: Option<i64> = conn
            .query_row("SELECT 1 FROM seen WHERE url = ?1", params![url], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("Failed to look up seen url {}", url))?;
        Ok(hit.is_some())
    }

    /// Record `url` as seen. The first recorded timestamp always wins.
    pub fn mark_seen(&self, url: &str, now: DateTime<Utc>) -> Result<()> {
        if url.is_empty() {
            return Ok(());
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO seen (url, first_seen) VALUES (?1, ?2)",
            params![url, now.timestamp()],
        )
        .with_context(|| format!("Failed to mark url as seen: {}", url))?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM seen", [], |row| row.get(0))
            .context("Failed to count seen urls")?;
        Ok(count.max(0) as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Most recently recorded URLs, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<SeenRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT url, first_seen FROM seen ORDER BY first_seen DESC, rowid DESC LIMIT ?1")
            .context("Failed to prepare seen listing")?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (url, first_seen) = row.context("Failed to read seen row")?;
            let first_seen = DateTime::from_timestamp(first_seen, 0).unwrap_or_default();
            records.push(SeenRecord { url, first_seen });
        }
        Ok(records)
    }
}
