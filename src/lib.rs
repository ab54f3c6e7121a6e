//! Harvest Ledger - produce hand-off records between farmers and collectors
//!
//! A collection moves `pending → verified → paid` and may be edited by
//! several actors at once. Every status change carries the version the
//! caller last saw; stale writes are detected and rejected, never merged.
//!
//! ## Architecture
//!
//! - **ledger**: versioned records, the role gate, the version guard and the
//!   mutation gateway composing them
//! - **db**: SQLite storage for collections and actors, plus the in-memory
//!   transaction store
//! - **auth**: bearer tokens and password hashing
//! - **services**: business logic and events over the stores
//! - **http**: hyper server exposing the services as JSON
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/harvest-ledger/
//! ├── ledger.db      # SQLite (WAL): farmers, collectors, collections
//! └── config.toml    # Configuration
//! ```

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod ledger;
pub mod services;

// Re-exports
pub use auth::TokenIssuer;
pub use config::Config;
pub use db::LedgerDb;
pub use error::LedgerError;
pub use http::HttpServer;
pub use ledger::{
    Collection, Identity, LedgerStatus, MutationError, MutationGateway, RecordStore, Role, RoleGate,
    TransitionPolicy,
};
pub use services::Services;
