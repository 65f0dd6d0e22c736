pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::Result;
pub use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// SQLite-backed datastore. One connection behind a mutex: every write is
/// serialized, and a transaction holds the lock from begin to commit.
pub struct Database {
    conn: Mutex<Connection>,
}

/// Why [`Database::transaction`] did not commit.
#[derive(Debug, thiserror::Error)]
pub enum TxError<E> {
    #[error("failed to begin transaction: {0}")]
    Begin(anyhow::Error),

    /// The closure returned an error; everything it wrote was rolled back.
    #[error("transaction aborted: {0}")]
    Aborted(E),

    /// COMMIT itself failed; SQLite rolled the transaction back.
    #[error("commit failed: {0}")]
    Commit(anyhow::Error),
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn, &path.display().to_string())
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, ":memory:")
    }

    fn init(conn: Connection, label: &str) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", label);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Run `f` inside a transaction and commit if it returns `Ok`.
    ///
    /// Dropping the transaction on any error path rolls it back.
    pub fn transaction<F, T, E>(&self, f: F) -> std::result::Result<T, TxError<E>>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| TxError::Begin(anyhow::anyhow!("DB lock poisoned: {}", e)))?;
        let tx = conn.transaction().map_err(|e| TxError::Begin(e.into()))?;

        let value = f(&tx).map_err(TxError::Aborted)?;

        tx.commit().map_err(|e| TxError::Commit(e.into()))?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries;

    #[test]
    fn aborted_transaction_leaves_nothing_behind() {
        let db = Database::open_in_memory().unwrap();

        let result: std::result::Result<(), TxError<&str>> = db.transaction(|tx| {
            queries::insert_tag_if_absent(tx, "Marvel").map_err(|_| "insert")?;
            Err("changed my mind")
        });
        assert!(matches!(result, Err(TxError::Aborted("changed my mind"))));

        let tags = db.with_conn(queries::list_tags).unwrap();
        assert!(tags.is_empty());
    }

    #[test]
    fn vetoed_commit_is_reported_and_rolled_back() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let _ = conn.commit_hook(Some(|| true));
            Ok(())
        })
        .unwrap();

        let result: std::result::Result<(), TxError<anyhow::Error>> = db.transaction(|tx| {
            queries::insert_tag_if_absent(tx, "DC")?;
            Ok(())
        });
        assert!(matches!(result, Err(TxError::Commit(_))));

        db.with_conn(|conn| {
            let _ = conn.commit_hook(None::<fn() -> bool>);
            Ok(())
        })
        .unwrap();
        let tags = db.with_conn(queries::list_tags).unwrap();
        assert!(tags.is_empty());
    }

    #[test]
    fn open_on_disk_runs_migrations_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blog.db");

        {
            let db = Database::open(&path).unwrap();
            db.transaction(|tx| queries::insert_tag_if_absent(tx, "Marvel").map(|_| ()))
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let tags = db.with_conn(queries::list_tags).unwrap();
        assert_eq!(tags.len(), 1);
    }
}
