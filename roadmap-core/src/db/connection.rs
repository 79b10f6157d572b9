//! Shared SQLite connection
//!
//! One `Database` is owned by the [`crate::Repository`] facade and handed to
//! every per-entity store. Reads go through [`Database::with_conn`]; every
//! mutation goes through [`Database::with_tx`], which holds the connection
//! mutex and an IMMEDIATE transaction for the whole read-validate-write
//! sequence.

use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{Error, Result};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// How long SQLite waits on a locked database before failing a statement
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Database {
    path: Option<PathBuf>,
    conn: Mutex<Option<Connection>>,
}

impl Database {
    /// Opens (or creates) a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn, Some(path))
    }

    /// Opens a private in-memory database, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        init_schema(&conn)?;
        tracing::debug!(path = ?path, "opened database");

        Ok(Self {
            path,
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Path of the backing file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| Error::Lock("database connection mutex poisoned".to_string()))
    }

    /// Runs a read-only closure against the connection
    pub fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(Error::Closed)?;
        f(conn)
    }

    /// Runs `f` inside one IMMEDIATE transaction.
    ///
    /// The transaction commits only if `f` returns `Ok`; any error rolls back
    /// every statement `f` issued.
    pub fn with_tx<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut guard = self.lock()?;
        let conn = guard.as_mut().ok_or(Error::Closed)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Closes the connection. Later calls are no-ops.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock()?;
        if let Some(conn) = guard.take() {
            if let Err((conn, err)) = conn.close() {
                *guard = Some(conn);
                return Err(err.into());
            }
            tracing::debug!(path = ?self.path, "closed database");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.lock().map(|guard| guard.is_none()).unwrap_or(true)
    }
}

/// Initialize the database schema
fn init_schema(conn: &Connection) -> Result<()> {
    let has_version_table: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
        [],
        |row| row.get(0),
    )?;
    // No table, or a table without a row, is a fresh database
    let current_version: i32 = if has_version_table {
        conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?
        .unwrap_or(0)
    } else {
        0
    };

    if current_version == 0 {
        conn.execute_batch(include_str!("schema.sql"))?;
    } else if current_version != SCHEMA_VERSION {
        return Err(Error::UnsupportedSchema {
            found: current_version,
            expected: SCHEMA_VERSION,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_schema_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("project.db");

        let db = Database::open(&path).unwrap();
        db.close().unwrap();

        // Reopening must not re-run the schema script
        let db = Database::open(&path).unwrap();
        let versions: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_unknown_schema_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("future.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch(
                "CREATE TABLE schema_version (version INTEGER NOT NULL);
                 INSERT INTO schema_version (version) VALUES (99);",
            )
            .unwrap();

        let Err(err) = Database::open(&path) else {
            panic!("schema version 99 must be refused");
        };
        assert!(matches!(
            err,
            Error::UnsupportedSchema {
                found: 99,
                expected: SCHEMA_VERSION
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_unreadable_schema_version_is_not_a_fresh_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbled.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch(
                "CREATE TABLE schema_version (version TEXT NOT NULL);
                 INSERT INTO schema_version (version) VALUES ('one');",
            )
            .unwrap();

        let Err(err) = Database::open(&path) else {
            panic!("a garbled schema_version must not be treated as a fresh database");
        };
        assert!(matches!(err, Error::Storage(_)));

        let tables: i64 = Connection::open(&path)
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'tracks'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.close().unwrap();
        db.close().unwrap();
        assert!(db.is_closed());
        assert!(matches!(db.with_conn(|_| Ok(())), Err(Error::Closed)));
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        let result: Result<()> = db.with_tx(|conn| {
            conn.execute(
                "INSERT INTO sequences (project, entity_type, value) VALUES ('PRJ', 'task', 7)",
                [],
            )?;
            Err(Error::invalid("abort"))
        });
        assert!(result.is_err());

        let rows: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM sequences", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let db = Database::open_in_memory().unwrap();
        let result = db.with_tx(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, track_id, title, status, rank, created_at, updated_at)
                 VALUES ('PRJ-task-1', 'PRJ-track-9', 't', 'todo', 1, '', '')",
                [],
            )?;
            Ok(())
        });
        assert!(result.is_err());
    }
}
