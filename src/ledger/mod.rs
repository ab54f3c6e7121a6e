//! Ledger core: versioned collection records and the status mutation path
//!
//! ## Architecture
//!
//! ```text
//! MutationGateway (composition root)
//!     ├── RoleGate      (who may change what)
//!     └── VersionGuard  (compare-and-swap on `version`)
//!             ↓
//!         RecordStore   (SQLite, or in-memory for tests)
//! ```
//!
//! Concurrency lives in the store: two writers holding the same version race
//! on the conditional write, one applies and the other sees a conflict. No
//! in-process lock or cache sits on this path.

pub mod model;
pub mod identity;
pub mod store;
pub mod guard;
pub mod gate;
pub mod gateway;

pub use model::{now_rfc3339, Collection, CollectionView, LedgerStatus};
pub use identity::{Identity, Role};
pub use store::{MemoryRecordStore, RecordStore, SqliteRecordStore};
pub use guard::{GuardOutcome, VersionGuard};
pub use gate::{GateDecision, RoleGate, TransitionPolicy};
pub use gateway::{MutationError, MutationGateway};
