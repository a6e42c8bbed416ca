//! # Snapshot Store
//! Append-only SQLite ledger with one row per calendar date.
//!
//! Dates are stored as ISO `YYYY-MM-DD` text so SQL ordering is calendar
//! ordering. Uniqueness and non-negativity are enforced by the schema as
//! well as by [`Snapshot::validate`].

use std::path::Path;

use chrono::NaiveDate;
use metrics::counter;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension, Row};
use thiserror::Error;

use crate::snapshot::{Snapshot, ValidationError};

const DB_SCHEMA_VERSION: i64 = 1;

const SELECT_SNAPSHOT: &str = "SELECT date, total_cases, new_cases, new_tests, \
     hospitalizations, intensive_care, deaths FROM snapshots";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a snapshot for {0} already exists")]
    AlreadyExists(NaiveDate),
    #[error("invalid snapshot: {0}")]
    Invalid(#[from] ValidationError),
    #[error("snapshot store failure: {0}")]
    Persistence(#[from] rusqlite::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    /// Open (creating if needed) and migrate.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a ledger that must already exist on disk.
    pub fn open_existing(path: impl AsRef<Path>) -> StoreResult<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Self::from_connection(Connection::open_with_flags(path, flags)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Row with the greatest date.
    pub fn latest(&self) -> StoreResult<Option<Snapshot>> {
        let sql = format!("{SELECT_SNAPSHOT} ORDER BY date DESC LIMIT 1");
        Ok(self.conn.query_row(&sql, [], snapshot_from_row).optional()?)
    }

    /// Row with the greatest `new_cases`; ties go to the most recent date.
    /// Rows without `new_cases` never qualify.
    pub fn max_new_cases(&self) -> StoreResult<Option<Snapshot>> {
        let sql = format!(
            "{SELECT_SNAPSHOT} WHERE new_cases IS NOT NULL \
             ORDER BY new_cases DESC, date DESC LIMIT 1"
        );
        Ok(self.conn.query_row(&sql, [], snapshot_from_row).optional()?)
    }

    /// Up to `n` rows, newest first.
    pub fn recent(&self, n: usize) -> StoreResult<Vec<Snapshot>> {
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let sql = format!("{SELECT_SNAPSHOT} ORDER BY date DESC LIMIT ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit], snapshot_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Whole history, oldest first.
    pub fn all(&self) -> StoreResult<Vec<Snapshot>> {
        let sql = format!("{SELECT_SNAPSHOT} ORDER BY date ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], snapshot_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count(&self) -> StoreResult<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(n.max(0) as usize)
    }

    /// Validate and append one row. A duplicate date is rejected, never
    /// overwritten; nothing is written unless the whole row is.
    pub fn insert(&mut self, snapshot: &Snapshot) -> StoreResult<()> {
        snapshot.validate()?;
        let tx = self.conn.transaction()?;
        insert_row(&tx, snapshot)?;
        tx.commit()?;

        counter!("store_inserts_total").increment(1);
        tracing::info!(
            target: "store",
            date = %snapshot.date,
            total_cases = ?snapshot.total_cases,
            new_cases = ?snapshot.new_cases,
            "snapshot stored"
        );
        Ok(())
    }

    /// Insert a whole dataset in one transaction: every row or none.
    pub fn seed(&mut self, snapshots: &[Snapshot]) -> StoreResult<usize> {
        for s in snapshots {
            s.validate()?;
        }
        let tx = self.conn.transaction()?;
        for s in snapshots {
            insert_row(&tx, s)?;
        }
        tx.commit()?;
        tracing::info!(target: "store", rows = snapshots.len(), "dataset seeded");
        Ok(snapshots.len())
    }
}

fn insert_row(conn: &Connection, s: &Snapshot) -> StoreResult<()> {
    let res = conn.execute(
        "INSERT INTO snapshots (date, total_cases, new_cases, new_tests, \
         hospitalizations, intensive_care, deaths) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            s.date.format("%Y-%m-%d").to_string(),
            s.total_cases,
            s.new_cases,
            s.new_tests,
            s.hospitalizations,
            s.intensive_care,
            s.deaths,
        ],
    );
    match res {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Err(StoreError::AlreadyExists(s.date))
        }
        Err(e) => Err(e.into()),
    }
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<Snapshot> {
    let raw: String = row.get(0)?;
    let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    Ok(Snapshot {
        date,
        total_cases: row.get(1)?,
        new_cases: row.get(2)?,
        new_tests: row.get(3)?,
        hospitalizations: row.get(4)?,
        intensive_care: row.get(5)?,
        deaths: row.get(6)?,
    })
}

pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        tracing::warn!(target: "store", version, "ledger schema is newer than this binary");
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY,
            date TEXT NOT NULL UNIQUE,
            total_cases INTEGER CHECK (total_cases IS NULL OR total_cases >= 0),
            new_cases INTEGER CHECK (new_cases IS NULL OR new_cases >= 0),
            new_tests INTEGER CHECK (new_tests IS NULL OR new_tests >= 0),
            hospitalizations INTEGER CHECK (hospitalizations IS NULL OR hospitalizations >= 0),
            intensive_care INTEGER CHECK (intensive_care IS NULL OR intensive_care >= 0),
            deaths INTEGER CHECK (deaths IS NULL OR deaths >= 0)
        );
        ",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 4, d).unwrap()
    }

    fn snap(d: u32, total: i64, new: Option<i64>) -> Snapshot {
        Snapshot {
            total_cases: Some(total),
            new_cases: new,
            ..Snapshot::empty(day(d))
        }
    }

    #[test]
    fn schema_initializes_with_expected_version() {
        let store = SnapshotStore::open_in_memory().expect("in-memory db");
        let version: i64 = store
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("schema version");
        assert_eq!(version, DB_SCHEMA_VERSION);
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.latest().unwrap().is_none());
        assert!(store.max_new_cases().unwrap().is_none());
    }

    #[test]
    fn duplicate_date_is_rejected_not_overwritten() {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        store.insert(&snap(24, 2943, Some(10))).unwrap();

        let err = store.insert(&snap(24, 5000, Some(99))).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(d) if d == day(24)));

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.latest().unwrap().unwrap().total_cases, Some(2943));
    }

    #[test]
    fn negative_metric_rejects_whole_row() {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        let mut s = snap(24, 10, Some(1));
        s.intensive_care = Some(-3);
        let err = store.insert(&s).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Invalid(ValidationError::Negative {
                field: "intensive_care",
                ..
            })
        ));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn latest_is_calendar_max_regardless_of_insert_order() {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        let new_year_eve = NaiveDate::from_ymd_opt(2019, 12, 31).unwrap();
        // As MMDDYYYY text, 12312019 would sort after every 2020 date.
        store.insert(&snap(10, 100, None)).unwrap();
        store.insert(&Snapshot::empty(new_year_eve)).unwrap();
        store.insert(&snap(25, 250, None)).unwrap();
        store.insert(&snap(9, 90, None)).unwrap();
        assert_eq!(store.latest().unwrap().unwrap().date, day(25));

        let recent: Vec<_> = store.recent(3).unwrap().into_iter().map(|s| s.date).collect();
        assert_eq!(recent, vec![day(25), day(10), day(9)]);
        assert_eq!(store.recent(0).unwrap().len(), 0);
        assert_eq!(store.recent(100).unwrap().len(), 4);
        assert_eq!(store.all().unwrap().first().unwrap().date, new_year_eve);
    }

    #[test]
    fn max_new_cases_ties_go_to_latest_date_and_skip_nulls() {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        store.insert(&snap(20, 100, None)).unwrap();
        store.insert(&snap(22, 200, Some(50))).unwrap();
        store.insert(&snap(21, 150, Some(50))).unwrap();
        store.insert(&snap(23, 210, Some(10))).unwrap();

        let max = store.max_new_cases().unwrap().unwrap();
        assert_eq!(max.date, day(22));
        assert_eq!(max.new_cases, Some(50));
    }

    #[test]
    fn seed_is_all_or_nothing() {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        let rows = vec![snap(1, 1, Some(1)), snap(2, 3, Some(2)), snap(1, 9, Some(9))];
        let err = store.seed(&rows).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert_eq!(store.count().unwrap(), 0);

        assert_eq!(store.seed(&rows[..2]).unwrap(), 2);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn open_existing_refuses_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");
        assert!(SnapshotStore::open_existing(&path).is_err());
        assert!(!path.exists());

        let mut created = SnapshotStore::open(&path).unwrap();
        created.insert(&snap(5, 5, Some(5))).unwrap();
        drop(created);

        let reopened = SnapshotStore::open_existing(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
