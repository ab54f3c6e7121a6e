//! Service layer for harvest-ledger
//!
//! Services sit between HTTP handlers and storage. Each takes the caller's
//! [`Identity`](crate::ledger::Identity) explicitly and wraps storage with:
//! - Input validation
//! - Role checks
//! - Event emission
//!
//! ## Architecture
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer (business logic)
//!     ↓
//! Ledger core (collections) / db (actors) / TransactionStore
//!     ↓
//! SQLite Database / in-memory map
//! ```

pub mod response;
pub mod events;
pub mod collection_service;
pub mod actor_service;
pub mod transaction_service;

pub use events::{EventBus, EventListener, LedgerEvent};
pub use collection_service::CollectionService;
pub use actor_service::ActorService;
pub use transaction_service::TransactionService;

use crate::auth::TokenIssuer;
use crate::config::Config;
use crate::db::{LedgerDb, TransactionStore};
use crate::ledger::{RoleGate, SqliteRecordStore};
use std::sync::Arc;

/// Service container for dependency injection
///
/// Holds all services with the shared database. Pass this to HttpServer for
/// handler access.
pub struct Services {
    pub collections: Arc<CollectionService>,
    pub actors: Arc<ActorService>,
    pub transactions: Arc<TransactionService>,
    pub events: Arc<EventBus>,
    db: Arc<LedgerDb>,
}

impl Services {
    /// Create all services over one database and a fresh transaction store
    pub fn new(db: Arc<LedgerDb>, tokens: Arc<TokenIssuer>, config: &Config) -> Self {
        let events = Arc::new(EventBus::new());
        let store = Arc::new(SqliteRecordStore::new(Arc::clone(&db)));
        let gate = RoleGate::new(config.transition_policy());

        Self {
            collections: Arc::new(CollectionService::new(
                store,
                gate,
                events.clone(),
                config.currency.clone(),
            )),
            actors: Arc::new(ActorService::new(db.clone(), tokens, events.clone())),
            transactions: Arc::new(TransactionService::new(
                Arc::new(TransactionStore::new()),
                events.clone(),
            )),
            events,
            db,
        }
    }

    pub fn db(&self) -> &Arc<LedgerDb> {
        &self.db
    }
}
