//! SQLite record sink
//!
//! Each crawl opens a row in `runs`; every record is stored in `records`
//! against that run. List fields are stored as JSON arrays.

use crate::crawler::Record;
use crate::output::schema::initialize_schema;
use crate::output::traits::{OutputResult, RecordSink};
use crate::output::CrawlReport;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use url::Url;

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}

/// One row of the `runs` table plus its record count
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub seed_url: String,
    pub config_hash: String,
    pub status: RunStatus,
    pub record_count: u64,
}

/// Record sink backed by a SQLite database
pub struct SqliteSink {
    conn: Connection,
    run_id: i64,
}

impl SqliteSink {
    /// Opens or creates the database at `path` and starts a new run
    ///
    /// With `fresh` all earlier runs and records are deleted first.
    pub fn open(path: &Path, seed_url: &str, config_hash: &str, fresh: bool) -> OutputResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        Self::start(conn, seed_url, config_hash, fresh)
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory(seed_url: &str, config_hash: &str) -> OutputResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::start(conn, seed_url, config_hash, false)
    }

    fn start(conn: Connection, seed_url: &str, config_hash: &str, fresh: bool) -> OutputResult<Self> {
        initialize_schema(&conn)?;

        if fresh {
            conn.execute_batch("DELETE FROM records; DELETE FROM runs;")?;
        }

        conn.execute(
            "INSERT INTO runs (started_at, seed_url, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                Utc::now().to_rfc3339(),
                seed_url,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        let run_id = conn.last_insert_rowid();

        Ok(Self { conn, run_id })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Counts records stored for a run
    pub fn count_records(&self, run_id: i64) -> OutputResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Loads the records of a run in insertion order, with their source URLs
    pub fn load_records(&self, run_id: i64) -> OutputResult<Vec<(String, Record)>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_url, title, global_rating, num_of_voters, release_date, country,
                    award_wins_nominations, creators
             FROM records WHERE run_id = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                Record {
                    title: row.get(1)?,
                    global_rating: row.get(2)?,
                    num_of_voters: row.get(3)?,
                    release_date: row.get(4)?,
                    country: row.get(5)?,
                    award_wins_nominations: Vec::new(),
                    creators: Vec::new(),
                },
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (source, mut record, awards, creators) = row?;
            record.award_wins_nominations = serde_json::from_str(&awards)?;
            record.creators = serde_json::from_str(&creators)?;
            records.push((source, record));
        }

        Ok(records)
    }
}

impl RecordSink for SqliteSink {
    fn write_record(&mut self, source: &Url, record: &Record) -> OutputResult<()> {
        self.conn.execute(
            "INSERT INTO records (run_id, source_url, title, global_rating, num_of_voters,
                                  release_date, country, award_wins_nominations, creators, scraped_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                self.run_id,
                source.as_str(),
                record.title,
                record.global_rating,
                record.num_of_voters,
                record.release_date,
                record.country,
                serde_json::to_string(&record.award_wins_nominations)?,
                serde_json::to_string(&record.creators)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn finish(&mut self, report: &CrawlReport) -> OutputResult<()> {
        let status = if report.stopped_early {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };

        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, listing_pages = ?3, fetch_failures = ?4
             WHERE id = ?5",
            params![
                status.to_db_string(),
                Utc::now().to_rfc3339(),
                report.listing_pages_fetched as i64,
                report.total_fetch_failures() as i64,
                self.run_id
            ],
        )?;
        Ok(())
    }
}

/// Lists every run in the database at `path`, newest first
pub fn load_run_summaries(path: &Path) -> OutputResult<Vec<RunSummary>> {
    let conn = Connection::open(path)?;
    initialize_schema(&conn)?;

    let mut stmt = conn.prepare(
        "SELECT r.id, r.started_at, r.finished_at, r.seed_url, r.config_hash, r.status,
                (SELECT COUNT(*) FROM records WHERE run_id = r.id)
         FROM runs r ORDER BY r.id DESC",
    )?;

    let runs = stmt
        .query_map([], |row| {
            Ok(RunSummary {
                id: row.get(0)?,
                started_at: row.get(1)?,
                finished_at: row.get(2)?,
                seed_url: row.get(3)?,
                config_hash: row.get(4)?,
                status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
                    .unwrap_or(RunStatus::Running),
                record_count: row.get::<_, i64>(6)? as u64,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(runs)
}
