//! Collection service - business logic for collection operations
//!
//! Creation, role-scoped reads, farmer history and wallet, admin delete, and
//! status updates routed through the [`MutationGateway`].

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::{
    now_rfc3339, Collection, Identity, LedgerStatus, MutationError, MutationGateway, RecordStore,
    Role, RoleGate,
};

use super::events::{EventBus, LedgerEvent};

/// Input for creating a collection
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCollectionInput {
    /// Client-generated id (offline capture); generated when absent
    #[serde(default)]
    pub id: Option<String>,
    pub farmer_id: String,
    /// Honoured only for admins; collectors always record as themselves
    #[serde(default)]
    pub collector_id: Option<String>,
    pub crop_type: String,
    pub weight_kg: f64,
    pub price_per_kg: f64,
}

/// Body of a status update request
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
    pub version: i64,
}

/// Farmer's collection history
#[derive(Debug, Clone, Serialize)]
pub struct FarmerHistory {
    pub farmer_id: String,
    pub collections: Vec<Collection>,
    pub count: usize,
    pub retrieved_at: String,
}

/// Totals across a farmer's collections
#[derive(Debug, Clone, Serialize)]
pub struct WalletSummary {
    /// Pending and verified, not yet paid
    pub total_pending: f64,
    pub total_paid: f64,
    pub total_overall: f64,
    pub currency: String,
    pub updated_at: String,
}

impl WalletSummary {
    pub fn from_collections(collections: &[Collection], currency: &str) -> Self {
        let mut pending = 0.0;
        let mut paid = 0.0;
        for c in collections {
            match c.status {
                LedgerStatus::Pending | LedgerStatus::Verified => pending += c.value(),
                LedgerStatus::Paid => paid += c.value(),
            }
        }

        Self {
            total_pending: pending,
            total_paid: paid,
            total_overall: pending + paid,
            currency: currency.to_string(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Collection service for business logic
pub struct CollectionService {
    store: Arc<dyn RecordStore>,
    gateway: MutationGateway,
    events: Arc<EventBus>,
    currency: String,
}

impl CollectionService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gate: RoleGate,
        events: Arc<EventBus>,
        currency: impl Into<String>,
    ) -> Self {
        let gateway = MutationGateway::new(Arc::clone(&store), gate);
        Self {
            store,
            gateway,
            events,
            currency: currency.into(),
        }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Get one collection; farmers may only read their own
    pub fn get(&self, identity: &Identity, id: &str) -> Result<Collection, LedgerError> {
        let collection = self
            .store
            .read(id)?
            .ok_or_else(|| LedgerError::NotFound(format!("collection {} not found", id)))?;

        if identity.role == Role::Farmer && collection.farmer_id != identity.subject_id {
            return Err(LedgerError::Forbidden("not authorized to view this collection".into()));
        }

        Ok(collection)
    }

    /// Farmers see their own collections, everyone else sees all
    pub fn list(&self, identity: &Identity) -> Result<Vec<Collection>, LedgerError> {
        match identity.role {
            Role::Farmer => self.store.list_by_farmer(&identity.subject_id),
            Role::Collector | Role::Admin => self.store.list_all(),
        }
    }

    pub fn history(&self, identity: &Identity) -> Result<FarmerHistory, LedgerError> {
        let farmer_id = self.require_farmer(identity)?;
        let collections = self.store.list_by_farmer(farmer_id)?;

        Ok(FarmerHistory {
            farmer_id: farmer_id.to_string(),
            count: collections.len(),
            collections,
            retrieved_at: Utc::now().to_rfc3339(),
        })
    }

    pub fn wallet(&self, identity: &Identity) -> Result<WalletSummary, LedgerError> {
        let farmer_id = self.require_farmer(identity)?;
        let collections = self.store.list_by_farmer(farmer_id)?;
        Ok(WalletSummary::from_collections(&collections, &self.currency))
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Record a new collection at version 1, status pending
    pub fn create(
        &self,
        identity: &Identity,
        input: CreateCollectionInput,
    ) -> Result<Collection, LedgerError> {
        let collector_id = match identity.role {
            Role::Collector => identity.subject_id.clone(),
            Role::Admin => input.collector_id.clone().ok_or_else(|| {
                LedgerError::InvalidInput(
                    "collector_id is required when an admin records a collection".into(),
                )
            })?,
            Role::Farmer => {
                return Err(LedgerError::Forbidden(
                    "only collectors and admins can create collections".into(),
                ));
            }
        };

        self.validate(&input)?;

        let now = now_rfc3339();
        let collection = Collection {
            id: input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            farmer_id: input.farmer_id,
            collector_id,
            crop_type: input.crop_type.trim().to_string(),
            weight_kg: input.weight_kg,
            price_per_kg: input.price_per_kg,
            status: LedgerStatus::Pending,
            version: 1,
            created_at: now.clone(),
            updated_at: now,
        };

        self.store.insert(&collection)?;

        self.events.emit(LedgerEvent::CollectionCreated {
            id: collection.id.clone(),
            farmer_id: collection.farmer_id.clone(),
            collector_id: collection.collector_id.clone(),
        });

        Ok(collection)
    }

    /// Versioned, role-checked status change
    pub fn update_status(
        &self,
        identity: &Identity,
        id: &str,
        request: &StatusUpdateRequest,
    ) -> Result<Collection, LedgerError> {
        match self.gateway.update_status(id, &request.status, request.version, identity) {
            Ok(updated) => {
                self.events.emit(LedgerEvent::CollectionStatusChanged {
                    id: updated.id.clone(),
                    status: updated.status,
                    version: updated.version,
                    changed_by: identity.to_string(),
                });
                Ok(updated)
            }
            Err(MutationError::Conflict { current }) => {
                self.events.emit(LedgerEvent::CollectionConflict {
                    id: id.to_string(),
                    expected_version: request.version,
                    current_version: current.version,
                });
                Err(LedgerError::Conflict(current))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Unconditional delete, admins only
    pub fn delete(&self, identity: &Identity, id: &str) -> Result<bool, LedgerError> {
        if !identity.is_admin() {
            return Err(LedgerError::Forbidden("only admins can delete collections".into()));
        }

        let deleted = self.store.delete(id)?;
        if deleted {
            self.events.emit(LedgerEvent::CollectionDeleted { id: id.to_string() });
        }
        Ok(deleted)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn require_farmer<'a>(&self, identity: &'a Identity) -> Result<&'a str, LedgerError> {
        if identity.role != Role::Farmer {
            return Err(LedgerError::Forbidden("this endpoint is only available to farmers".into()));
        }
        Ok(&identity.subject_id)
    }

    fn validate(&self, input: &CreateCollectionInput) -> Result<(), LedgerError> {
        if input.farmer_id.trim().is_empty() {
            return Err(LedgerError::InvalidInput("farmer_id is required".into()));
        }

        if input.crop_type.trim().is_empty() {
            return Err(LedgerError::InvalidInput("crop_type is required".into()));
        }

        if let Some(ref id) = input.id {
            if id.is_empty() || id.len() > 255 {
                return Err(LedgerError::InvalidInput("id must be 1-255 characters".into()));
            }
        }

        let amounts = [("weight_kg", input.weight_kg), ("price_per_kg", input.price_per_kg)];
        for (name, value) in amounts {
            if !value.is_finite() || value <= 0.0 {
                return Err(LedgerError::InvalidInput(format!(
                    "{} must be a positive number",
                    name
                )));
            }
        }

        Ok(())
    }
}
