//! SQLite database module for the ledger
//!
//! ## Tables
//!
//! - `farmers` - Farmer accounts (phone login, argon2 hash)
//! - `collectors` - Collector accounts
//! - `collections` - Versioned produce hand-off records, foreign keys to both
//!
//! Transactions are not persisted; see [`transactions::TransactionStore`].

pub mod schema;
pub mod actors;
pub mod collections;
pub mod transactions;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::LedgerError;

/// SQLite database for collections and actors
pub struct LedgerDb {
    conn: Mutex<Connection>,
}

impl LedgerDb {
    /// Open or create the ledger database in `storage_dir`
    pub fn open(storage_dir: &Path) -> Result<Self, LedgerError> {
        let db_path = storage_dir.join("ledger.db");
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(&db_path)
            .map_err(|e| LedgerError::StorageUnavailable(format!("Failed to open SQLite: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA busy_timeout=5000;",
        )
        .map_err(|e| LedgerError::Internal(format!("Failed to set PRAGMA: {}", e)))?;

        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory().map_err(|e| {
            LedgerError::StorageUnavailable(format!("Failed to open in-memory SQLite: {}", e))
        })?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, LedgerError> {
        // Referential integrity for farmer_id / collector_id lives here
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| LedgerError::Internal(format!("Failed to enable foreign keys: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), LedgerError> {
        self.with_conn(schema::init_schema)
    }

    /// Run a read-only operation against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&Connection) -> Result<T, LedgerError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LedgerError::StorageUnavailable(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Execute a write operation with exclusive access
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut Connection) -> Result<T, LedgerError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| LedgerError::StorageUnavailable(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Row counts for the health endpoint
    pub fn stats(&self) -> Result<DbStats, LedgerError> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64, LedgerError> {
                let n: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                        row.get(0)
                    })?;
                Ok(n as u64)
            };

            Ok(DbStats {
                farmer_count: count("farmers")?,
                collector_count: count("collectors")?,
                collection_count: count("collections")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub farmer_count: u64,
    pub collector_count: u64,
    pub collection_count: u64,
}

pub use actors::{ActorKind, ActorRow, NewActor};
pub use transactions::{NewTransaction, TransactionRecord, TransactionStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_has_empty_tables() {
        let db = LedgerDb::open_in_memory().unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.farmer_count, 0);
        assert_eq!(stats.collection_count, 0);
    }

    #[test]
    fn test_open_on_disk_is_reopenable() {
        let dir = tempfile::TempDir::new().unwrap();
        {
            let db = LedgerDb::open(dir.path()).unwrap();
            assert_eq!(db.stats().unwrap().collector_count, 0);
        }
        let db = LedgerDb::open(dir.path()).unwrap();
        assert_eq!(db.stats().unwrap().collector_count, 0);
    }
}
