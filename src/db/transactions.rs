//! In-memory transaction store
//!
//! A simpler entity family than collections: one mutex over one map, no
//! versioning, last write wins. Callers hold it through an `Arc` handed to
//! them at construction; nothing here is process-global.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::{now_rfc3339, LedgerStatus};

/// Transaction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    pub farmer_id: String,
    pub collector_id: String,
    pub crop: String,
    pub weight_kg: f64,
    pub unit_price: f64,
    pub total_value: f64,
    pub status: LedgerStatus,
    pub created_at: String,
    pub last_modified: String,
}

/// Input for creating a transaction
///
/// Clients supply the farmer, crop and quantities only; id, collector and
/// status are set server-side and the total is always computed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    #[serde(skip_deserializing)]
    pub id: Option<String>,
    pub farmer_id: String,
    #[serde(skip_deserializing)]
    pub collector_id: String,
    pub crop: String,
    pub weight_kg: f64,
    pub unit_price: f64,
    #[serde(skip_deserializing)]
    pub status: Option<LedgerStatus>,
}

/// Mutex-guarded map of transactions
#[derive(Default)]
pub struct TransactionStore {
    transactions: Mutex<HashMap<String, TransactionRecord>>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, TransactionRecord>>, LedgerError> {
        self.transactions
            .lock()
            .map_err(|e| LedgerError::StorageUnavailable(format!("Lock poisoned: {}", e)))
    }

    pub fn create(&self, input: NewTransaction) -> Result<TransactionRecord, LedgerError> {
        let now = now_rfc3339();
        let total_value = input.weight_kg * input.unit_price;

        let record = TransactionRecord {
            id: input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            farmer_id: input.farmer_id,
            collector_id: input.collector_id,
            crop: input.crop,
            weight_kg: input.weight_kg,
            unit_price: input.unit_price,
            total_value,
            status: input.status.unwrap_or(LedgerStatus::Pending),
            created_at: now.clone(),
            last_modified: now,
        };

        let mut map = self.lock()?;
        if map.contains_key(&record.id) {
            return Err(LedgerError::InvalidInput(format!(
                "transaction {} already exists",
                record.id
            )));
        }
        map.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    pub fn get(&self, id: &str) -> Result<Option<TransactionRecord>, LedgerError> {
        Ok(self.lock()?.get(id).cloned())
    }

    pub fn list_by_farmer(&self, farmer_id: &str) -> Result<Vec<TransactionRecord>, LedgerError> {
        Ok(self
            .lock()?
            .values()
            .filter(|tx| tx.farmer_id == farmer_id)
            .cloned()
            .collect())
    }

    pub fn list_all(&self) -> Result<Vec<TransactionRecord>, LedgerError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    /// Unconditional status overwrite
    pub fn update_status(
        &self,
        id: &str,
        status: LedgerStatus,
    ) -> Result<TransactionRecord, LedgerError> {
        let mut map = self.lock()?;
        let tx = map
            .get_mut(id)
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {} not found", id)))?;

        tx.status = status;
        tx.last_modified = now_rfc3339();
        Ok(tx.clone())
    }
}
