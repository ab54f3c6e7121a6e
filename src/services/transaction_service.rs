//! Transaction service - the in-memory, last-write-wins entity family
//!
//! Unlike collections there is no version check: admins overwrite status
//! directly.

use std::sync::Arc;

use serde::Deserialize;

use crate::db::{NewTransaction, TransactionRecord, TransactionStore};
use crate::error::LedgerError;
use crate::ledger::{Identity, LedgerStatus, Role};

use super::events::{EventBus, LedgerEvent};

/// Body of a transaction status change
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionStatusRequest {
    pub status: String,
}

pub struct TransactionService {
    store: Arc<TransactionStore>,
    events: Arc<EventBus>,
}

impl TransactionService {
    pub fn new(store: Arc<TransactionStore>, events: Arc<EventBus>) -> Self {
        Self { store, events }
    }

    pub fn create(
        &self,
        identity: &Identity,
        mut input: NewTransaction,
    ) -> Result<TransactionRecord, LedgerError> {
        if identity.role == Role::Farmer {
            return Err(LedgerError::Forbidden(
                "only collectors and admins can create transactions".into(),
            ));
        }
        if input.farmer_id.trim().is_empty() || input.crop.trim().is_empty() {
            return Err(LedgerError::InvalidInput("farmerId and crop are required".into()));
        }
        if !(input.weight_kg > 0.0 && input.unit_price > 0.0) {
            return Err(LedgerError::InvalidInput("weightKg and unitPrice must be positive".into()));
        }

        input.id = None;
        input.collector_id = identity.subject_id.clone();
        input.status = None;

        let tx = self.store.create(input)?;
        self.events.emit(LedgerEvent::TransactionCreated { id: tx.id.clone() });
        Ok(tx)
    }

    pub fn get(&self, identity: &Identity, id: &str) -> Result<TransactionRecord, LedgerError> {
        let tx = self
            .store
            .get(id)?
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {} not found", id)))?;

        if identity.role == Role::Farmer && tx.farmer_id != identity.subject_id {
            return Err(LedgerError::Forbidden("not authorized to view this transaction".into()));
        }
        Ok(tx)
    }

    pub fn list(&self, identity: &Identity) -> Result<Vec<TransactionRecord>, LedgerError> {
        match identity.role {
            Role::Farmer => self.store.list_by_farmer(&identity.subject_id),
            Role::Collector | Role::Admin => self.store.list_all(),
        }
    }

    /// Admin-only, unconditional; only `verified` and `paid` are accepted
    pub fn update_status(
        &self,
        identity: &Identity,
        id: &str,
        request: &TransactionStatusRequest,
    ) -> Result<TransactionRecord, LedgerError> {
        if !identity.is_admin() {
            return Err(LedgerError::Forbidden("only admins can update transaction status".into()));
        }

        let status = match request.status.parse::<LedgerStatus>() {
            Ok(s @ (LedgerStatus::Verified | LedgerStatus::Paid)) => s,
            _ => {
                return Err(LedgerError::InvalidInput(format!(
                    "status '{}' is not valid. Valid values: verified, paid",
                    request.status
                )));
            }
        };

        let tx = self.store.update_status(id, status)?;
        self.events.emit(LedgerEvent::TransactionStatusChanged {
            id: tx.id.clone(),
            status,
        });
        Ok(tx)
    }
}
