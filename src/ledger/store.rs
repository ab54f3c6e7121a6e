//! Record store seam for collections
//!
//! The mutation path only needs point reads, inserts and a version-qualified
//! status write. [`SqliteRecordStore`] backs the service; [`MemoryRecordStore`]
//! gives each test an isolated store without a database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::db::{collections, LedgerDb};
use crate::error::LedgerError;

use super::model::{Collection, LedgerStatus};

/// Storage operations the ledger core depends on
pub trait RecordStore: Send + Sync {
    /// Point read by id
    fn read(&self, id: &str) -> Result<Option<Collection>, LedgerError>;

    /// Insert a freshly created record
    fn insert(&self, collection: &Collection) -> Result<(), LedgerError>;

    /// Set `status` and bump `version` only if the stored version equals
    /// `expected_version`. Returns rows affected (0 or 1).
    fn conditional_write(
        &self,
        id: &str,
        expected_version: i64,
        status: LedgerStatus,
        updated_at: &str,
    ) -> Result<usize, LedgerError>;

    /// Unconditional administrative delete
    fn delete(&self, id: &str) -> Result<bool, LedgerError>;

    fn list_by_farmer(&self, farmer_id: &str) -> Result<Vec<Collection>, LedgerError>;

    fn list_all(&self) -> Result<Vec<Collection>, LedgerError>;
}

/// SQLite-backed record store
pub struct SqliteRecordStore {
    db: Arc<LedgerDb>,
}

impl SqliteRecordStore {
    pub fn new(db: Arc<LedgerDb>) -> Self {
        Self { db }
    }
}

impl RecordStore for SqliteRecordStore {
    fn read(&self, id: &str) -> Result<Option<Collection>, LedgerError> {
        self.db.with_conn(|conn| collections::get_collection(conn, id))
    }

    fn insert(&self, collection: &Collection) -> Result<(), LedgerError> {
        self.db.with_conn_mut(|conn| collections::insert_collection(conn, collection))
    }

    fn conditional_write(
        &self,
        id: &str,
        expected_version: i64,
        status: LedgerStatus,
        updated_at: &str,
    ) -> Result<usize, LedgerError> {
        self.db.with_conn_mut(|conn| {
            collections::update_status_if_version(conn, id, expected_version, status, updated_at)
        })
    }

    fn delete(&self, id: &str) -> Result<bool, LedgerError> {
        self.db.with_conn_mut(|conn| collections::delete_collection(conn, id))
    }

    fn list_by_farmer(&self, farmer_id: &str) -> Result<Vec<Collection>, LedgerError> {
        self.db.with_conn(|conn| collections::list_by_farmer(conn, farmer_id))
    }

    fn list_all(&self) -> Result<Vec<Collection>, LedgerError> {
        self.db.with_conn(collections::list_all)
    }
}

/// In-memory record store with the same compare-and-swap semantics.
///
/// Does not check that farmer or collector ids exist.
#[derive(Default)]
pub struct MemoryRecordStore {
    rows: Mutex<HashMap<String, Collection>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Collection>>, LedgerError> {
        self.rows
            .lock()
            .map_err(|e| LedgerError::StorageUnavailable(format!("Lock poisoned: {}", e)))
    }

    fn newest_first(mut rows: Vec<Collection>) -> Vec<Collection> {
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }
}

impl RecordStore for MemoryRecordStore {
    fn read(&self, id: &str) -> Result<Option<Collection>, LedgerError> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn insert(&self, collection: &Collection) -> Result<(), LedgerError> {
        let mut rows = self.lock()?;
        if rows.contains_key(&collection.id) {
            return Err(LedgerError::InvalidInput(format!(
                "collection {} already exists",
                collection.id
            )));
        }
        rows.insert(collection.id.clone(), collection.clone());
        Ok(())
    }

    fn conditional_write(
        &self,
        id: &str,
        expected_version: i64,
        status: LedgerStatus,
        updated_at: &str,
    ) -> Result<usize, LedgerError> {
        let mut rows = self.lock()?;
        match rows.get_mut(id) {
            Some(row) if row.version == expected_version => {
                row.status = status;
                row.version += 1;
                row.updated_at = updated_at.to_string();
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    fn delete(&self, id: &str) -> Result<bool, LedgerError> {
        Ok(self.lock()?.remove(id).is_some())
    }

    fn list_by_farmer(&self, farmer_id: &str) -> Result<Vec<Collection>, LedgerError> {
        let rows = self
            .lock()?
            .values()
            .filter(|c| c.farmer_id == farmer_id)
            .cloned()
            .collect();
        Ok(Self::newest_first(rows))
    }

    fn list_all(&self) -> Result<Vec<Collection>, LedgerError> {
        let rows = self.lock()?.values().cloned().collect();
        Ok(Self::newest_first(rows))
    }
}
