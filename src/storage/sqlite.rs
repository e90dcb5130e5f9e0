// src/storage/sqlite.rs

//! SQLite-backed seen-postings store.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use super::{Admission, SeenRecord, StoreStats};
use crate::error::{AppError, Result};
use crate::models::CanonicalPosting;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS seen_postings (
        identity_key TEXT PRIMARY KEY,
        url_key      TEXT NOT NULL,
        url          TEXT NOT NULL,
        source_name  TEXT NOT NULL,
        title        TEXT NOT NULL,
        company      TEXT NOT NULL,
        first_seen   TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_seen_url_key ON seen_postings(url_key);
    CREATE INDEX IF NOT EXISTS idx_seen_first_seen ON seen_postings(first_seen);
    CREATE INDEX IF NOT EXISTS idx_seen_source ON seen_postings(source_name);
";

/// Timestamps are stored as `YYYY-MM-DDTHH:MM:SSZ` so text order is time order.
fn to_db_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn from_db_time(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// The dedup store. All mutation goes through [`SeenStore::admit`].
pub struct SeenStore {
    conn: Mutex<Connection>,
}

impl SeenStore {
    /// Open or create the database at `path`.
    ///
    /// Any failure, including a file that is not a healthy SQLite database,
    /// is reported as [`AppError::StoreUnavailable`].
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        let unavailable =
            |e: &dyn std::fmt::Display| AppError::store_unavailable(format!("{}: {e}", path.display()));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| unavailable(&e))?;
        }

        let conn = Connection::open(path).map_err(|e| unavailable(&e))?;
        conn.busy_timeout(busy_timeout).map_err(|e| unavailable(&e))?;

        let check: String = conn
            .query_row("PRAGMA quick_check", [], |row| row.get(0))
            .map_err(|e| unavailable(&e))?;
        if check != "ok" {
            return Err(unavailable(&format!("integrity check failed: {check}")));
        }

        conn.execute_batch(SCHEMA).map_err(|e| unavailable(&e))?;
        log::debug!("Opened seen-postings store at {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::store_unavailable("connection lock poisoned"))
    }

    /// Record `posting` unless its identity key or URL key is already known.
    ///
    /// The lookup and the insert run in one immediate transaction, so two
    /// overlapping runs cannot both admit the same posting.
    pub fn admit(&self, posting: &CanonicalPosting) -> Result<Admission> {
        let identity_key = posting.identity_key();
        let url_key = posting.url_key();

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let by_identity: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM seen_postings WHERE identity_key = ?1)",
            params![identity_key],
            |row| row.get(0),
        )?;
        if by_identity {
            return Ok(Admission::Duplicate);
        }

        // Same listing reached through another source
        let by_url: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM seen_postings WHERE url_key = ?1)",
            params![url_key],
            |row| row.get(0),
        )?;
        if by_url {
            log::debug!("{} matched an existing URL, skipping", posting.url);
            return Ok(Admission::Duplicate);
        }

        tx.execute(
            "INSERT INTO seen_postings
             (identity_key, url_key, url, source_name, title, company, first_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                identity_key,
                url_key,
                posting.url,
                posting.source_name.as_str(),
                posting.title,
                posting.company,
                to_db_time(posting.discovered_at),
            ],
        )?;
        tx.commit()?;

        Ok(Admission::Admitted)
    }

    /// Look up a record by identity key.
    pub fn get(&self, identity_key: &str) -> Result<Option<SeenRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT identity_key, url_key, url, source_name, title, company, first_seen
                 FROM seen_postings WHERE identity_key = ?1",
                params![identity_key],
                |row| {
                    let first_seen: String = row.get(6)?;
                    Ok(SeenRecord {
                        identity_key: row.get(0)?,
                        url_key: row.get(1)?,
                        url: row.get(2)?,
                        source_name: row.get(3)?,
                        title: row.get(4)?,
                        company: row.get(5)?,
                        first_seen: from_db_time(&first_seen).unwrap_or_default(),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Counts over the whole store and the last `window_days`.
    pub fn stats(&self, window_days: u32) -> Result<StoreStats> {
        self.stats_at(window_days, Utc::now())
    }

    pub fn stats_at(&self, window_days: u32, now: DateTime<Utc>) -> Result<StoreStats> {
        let conn = self.lock()?;
        let cutoff = to_db_time(now - chrono::Duration::days(i64::from(window_days)));

        let total_seen: u64 =
            conn.query_row("SELECT COUNT(*) FROM seen_postings", [], |row| row.get(0))?;
        let seen_in_window: u64 = conn.query_row(
            "SELECT COUNT(*) FROM seen_postings WHERE first_seen >= ?1",
            params![cutoff],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT source_name, COUNT(*) FROM seen_postings GROUP BY source_name",
        )?;
        let by_source = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;

        Ok(StoreStats {
            total_seen,
            seen_in_window,
            window_days,
            by_source,
        })
    }
}
