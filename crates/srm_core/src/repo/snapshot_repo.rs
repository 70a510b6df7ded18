//! Persisted annotation snapshot: contract and SQLite implementation.
//!
//! # Responsibility
//! - Read the `{revision, entries}` snapshot once at startup.
//! - Write the full snapshot on every store mutation.
//! - Hold small user preferences next to the snapshot.
//!
//! # Invariants
//! - `save_snapshot` is a single transaction: readers never observe a mix of
//!   old and new entries.
//! - A database with no state row and no entries has no snapshot.

use crate::db::DbError;
use crate::model::entry::{Entry, EntryMap, Responsibility, Revision};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Version tag written next to every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for snapshot persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted snapshot: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Full persisted annotation state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub revision: Revision,
    pub entries: EntryMap,
}

impl Snapshot {
    pub fn new(revision: Revision, entries: EntryMap) -> Self {
        Self { revision, entries }
    }
}

/// Durable slot for the annotation snapshot and user preferences.
pub trait SnapshotRepository {
    fn load_snapshot(&self) -> RepoResult<Option<Snapshot>>;
    fn save_snapshot(&mut self, snapshot: &Snapshot) -> RepoResult<()>;
    fn load_preference(&self, key: &str) -> RepoResult<Option<String>>;
    fn save_preference(&mut self, key: &str, value: &str) -> RepoResult<()>;
}

/// SQLite-backed snapshot repository.
pub struct SqliteSnapshotRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteSnapshotRepository<'conn> {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl SnapshotRepository for SqliteSnapshotRepository<'_> {
    fn load_snapshot(&self) -> RepoResult<Option<Snapshot>> {
        let state = self
            .conn
            .query_row(
                "SELECT revision, snapshot_version FROM srm_state WHERE id = 1;",
                [],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)),
            )
            .optional()?;

        let mut stmt = self.conn.prepare(
            "SELECT objective_id, responsibility, implementation
             FROM srm_entries
             ORDER BY objective_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut entries = EntryMap::new();
        while let Some(row) = rows.next()? {
            let objective_id: String = row.get(0)?;
            let responsibility_text: String = row.get(1)?;
            let responsibility = parse_responsibility(&responsibility_text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid responsibility `{responsibility_text}` in srm_entries.responsibility"
                ))
            })?;
            entries.insert(
                objective_id,
                Entry {
                    responsibility,
                    implementation: row.get(2)?,
                },
            );
        }

        let revision = match state {
            Some((revision_text, version)) => {
                if version > SNAPSHOT_VERSION {
                    warn!(
                        "event=snapshot_load module=repo status=degraded snapshot_version={} supported={}",
                        version, SNAPSHOT_VERSION
                    );
                }
                parse_revision(&revision_text).ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "invalid revision `{revision_text}` in srm_state.revision"
                    ))
                })?
            }
            None if entries.is_empty() => return Ok(None),
            None => Revision::default(),
        };

        Ok(Some(Snapshot { revision, entries }))
    }

    fn save_snapshot(&mut self, snapshot: &Snapshot) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO srm_state (id, revision, snapshot_version, updated_at)
             VALUES (1, ?1, ?2, strftime('%s', 'now') * 1000)
             ON CONFLICT(id) DO UPDATE SET
                revision = excluded.revision,
                snapshot_version = excluded.snapshot_version,
                updated_at = excluded.updated_at;",
            params![revision_to_db(snapshot.revision), SNAPSHOT_VERSION],
        )?;

        tx.execute("DELETE FROM srm_entries;", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO srm_entries (objective_id, responsibility, implementation)
                 VALUES (?1, ?2, ?3);",
            )?;
            for (objective_id, entry) in &snapshot.entries {
                insert.execute(params![
                    objective_id.as_str(),
                    responsibility_to_db(entry.responsibility),
                    entry.implementation.as_str(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn load_preference(&self, key: &str) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM srm_preferences WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save_preference(&mut self, key: &str, value: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO srm_preferences (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
            [key, value],
        )?;
        Ok(())
    }
}

fn revision_to_db(revision: Revision) -> &'static str {
    revision.as_str()
}

fn parse_revision(value: &str) -> Option<Revision> {
    match value {
        "rev2" => Some(Revision::Rev2),
        "rev3" => Some(Revision::Rev3),
        _ => None,
    }
}

fn responsibility_to_db(value: Responsibility) -> &'static str {
    match value {
        Responsibility::Customer => "customer",
        Responsibility::Provider => "provider",
        Responsibility::Shared => "shared",
    }
}

fn parse_responsibility(value: &str) -> Option<Responsibility> {
    match value {
        "customer" => Some(Responsibility::Customer),
        "provider" => Some(Responsibility::Provider),
        "shared" => Some(Responsibility::Shared),
        _ => None,
    }
}
