//! Mutation gateway: the single entry point for collection status changes
//!
//! ```text
//! update_status(id, status, expected_version, identity)
//!     ↓ parse status / version          → InvalidArgument
//!     ↓ read current record             → NotFound
//!     ↓ RoleGate::check                 → Forbidden
//!     ↓ VersionGuard::apply             → Conflict(current) | NotFound
//!     ↓
//! Applied(updated record)
//! ```
//!
//! Only the `Applied` path writes. Replaying an applied request reports
//! `Conflict`, since the record has moved past the version it names.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::LedgerError;

use super::gate::{GateDecision, RoleGate};
use super::guard::{GuardOutcome, VersionGuard};
use super::identity::Identity;
use super::model::{Collection, LedgerStatus};
use super::store::RecordStore;

/// Closed set of ways a status update can fail
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Collection not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Caller's version is stale; `current` is the stored record
    #[error("Version conflict: current version is {}", .current.version)]
    Conflict { current: Box<Collection> },

    /// Store did not respond; the whole operation is safe to retry
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Store answered with something impossible; not safe to retry blindly
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<MutationError> for LedgerError {
    fn from(err: MutationError) -> Self {
        match err {
            MutationError::InvalidArgument(msg) => LedgerError::InvalidInput(msg),
            MutationError::NotFound(id) => {
                LedgerError::NotFound(format!("collection {} not found", id))
            }
            MutationError::Forbidden(msg) => LedgerError::Forbidden(msg),
            MutationError::Conflict { current } => LedgerError::Conflict(current),
            MutationError::StorageUnavailable(msg) => LedgerError::StorageUnavailable(msg),
            MutationError::Internal(msg) => LedgerError::Internal(msg),
        }
    }
}

fn storage_error(err: LedgerError) -> MutationError {
    match err {
        LedgerError::Internal(msg) => MutationError::Internal(msg),
        other => MutationError::StorageUnavailable(other.to_string()),
    }
}

pub struct MutationGateway {
    store: Arc<dyn RecordStore>,
    gate: RoleGate,
    guard: VersionGuard,
}

impl MutationGateway {
    pub fn new(store: Arc<dyn RecordStore>, gate: RoleGate) -> Self {
        let guard = VersionGuard::new(Arc::clone(&store));
        Self { store, gate, guard }
    }

    /// Move collection `id` to `status`, provided the caller is allowed to and
    /// the record is still at `expected_version`
    pub fn update_status(
        &self,
        id: &str,
        status: &str,
        expected_version: i64,
        identity: &Identity,
    ) -> Result<Collection, MutationError> {
        let target: LedgerStatus = status.parse().map_err(MutationError::InvalidArgument)?;
        if expected_version < 1 {
            return Err(MutationError::InvalidArgument(format!(
                "version must be >= 1, got {}",
                expected_version
            )));
        }

        let current = self
            .store
            .read(id)
            .map_err(storage_error)?
            .ok_or_else(|| MutationError::NotFound(id.to_string()))?;

        if let GateDecision::Deny(reason) = self.gate.check(identity, &current, target) {
            warn!(
                id = %id,
                caller = %identity,
                target = %target,
                reason = %reason,
                "Status change denied"
            );
            return Err(MutationError::Forbidden(reason));
        }

        match self.guard.apply(&current, expected_version, target).map_err(storage_error)? {
            GuardOutcome::Applied(updated) => {
                info!(
                    id = %id,
                    caller = %identity,
                    status = %updated.status,
                    version = updated.version,
                    "Collection status updated"
                );
                Ok(updated)
            }
            GuardOutcome::Conflict(current) => {
                debug!(
                    id = %id,
                    expected_version,
                    current_version = current.version,
                    "Stale status update"
                );
                Err(MutationError::Conflict {
                    current: Box::new(current),
                })
            }
            GuardOutcome::NotFound => Err(MutationError::NotFound(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::gate::TransitionPolicy;
    use crate::ledger::model::now_rfc3339;
    use crate::ledger::store::MemoryRecordStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store whose every call fails, to exercise the unavailable path
    struct DownStore;

    impl RecordStore for DownStore {
        fn read(&self, _: &str) -> Result<Option<Collection>, LedgerError> {
            Err(LedgerError::StorageUnavailable("connection refused".into()))
        }
        fn insert(&self, _: &Collection) -> Result<(), LedgerError> {
            Err(LedgerError::StorageUnavailable("connection refused".into()))
        }
        fn conditional_write(
            &self,
            _: &str,
            _: i64,
            _: LedgerStatus,
            _: &str,
        ) -> Result<usize, LedgerError> {
            Err(LedgerError::StorageUnavailable("connection refused".into()))
        }
        fn delete(&self, _: &str) -> Result<bool, LedgerError> {
            Err(LedgerError::StorageUnavailable("connection refused".into()))
        }
        fn list_by_farmer(&self, _: &str) -> Result<Vec<Collection>, LedgerError> {
            Ok(vec![])
        }
        fn list_all(&self) -> Result<Vec<Collection>, LedgerError> {
            Ok(vec![])
        }
    }

    /// In-memory store that misbehaves after the first read or on writes
    struct FaultyStore {
        inner: MemoryRecordStore,
        reads: AtomicUsize,
        rows_written: Option<usize>,
    }

    impl FaultyStore {
        fn seeded(rows_written: Option<usize>) -> Self {
            let inner = MemoryRecordStore::new();
            inner.insert(&record()).unwrap();
            Self { inner, reads: AtomicUsize::new(0), rows_written }
        }
    }

    impl RecordStore for FaultyStore {
        fn read(&self, id: &str) -> Result<Option<Collection>, LedgerError> {
            if self.reads.fetch_add(1, Ordering::SeqCst) > 0 {
                return Err(LedgerError::StorageUnavailable("read timed out".into()));
            }
            self.inner.read(id)
        }
        fn insert(&self, c: &Collection) -> Result<(), LedgerError> {
            self.inner.insert(c)
        }
        fn conditional_write(
            &self,
            id: &str,
            v: i64,
            s: LedgerStatus,
            at: &str,
        ) -> Result<usize, LedgerError> {
            match self.rows_written {
                Some(n) => Ok(n),
                None => self.inner.conditional_write(id, v, s, at),
            }
        }
        fn delete(&self, id: &str) -> Result<bool, LedgerError> {
            self.inner.delete(id)
        }
        fn list_by_farmer(&self, farmer_id: &str) -> Result<Vec<Collection>, LedgerError> {
            self.inner.list_by_farmer(farmer_id)
        }
        fn list_all(&self) -> Result<Vec<Collection>, LedgerError> {
            self.inner.list_all()
        }
    }

    fn record() -> Collection {
        let now = now_rfc3339();
        Collection {
            id: "R1".into(),
            farmer_id: "F1".into(),
            collector_id: "C1".into(),
            crop_type: "Tea".into(),
            weight_kg: 100.0,
            price_per_kg: 0.3,
            status: LedgerStatus::Pending,
            version: 1,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    fn gateway_with(policy: TransitionPolicy) -> MutationGateway {
        let store = Arc::new(MemoryRecordStore::new());
        store.insert(&record()).unwrap();
        MutationGateway::new(store, RoleGate::new(policy))
    }

    fn gateway() -> MutationGateway {
        gateway_with(TransitionPolicy::Unrestricted)
    }

    #[test]
    fn test_scenario_verify_then_stale_then_retry() {
        let gw = gateway();

        let verified = gw.update_status("R1", "verified", 1, &Identity::collector("C1")).unwrap();
        assert_eq!(verified.version, 2);
        assert_eq!(verified.status, LedgerStatus::Verified);

        match gw.update_status("R1", "paid", 1, &Identity::admin("A1")) {
            Err(MutationError::Conflict { current }) => assert_eq!(current.version, 2),
            other => panic!("expected Conflict, got {:?}", other),
        }

        let paid = gw.update_status("R1", "paid", 2, &Identity::admin("A1")).unwrap();
        assert_eq!(paid.version, 3);
        assert_eq!(paid.status, LedgerStatus::Paid);
    }

    #[test]
    fn test_replay_reports_conflict() {
        let gw = gateway();
        gw.update_status("R1", "verified", 1, &Identity::admin("A1")).unwrap();
        assert!(matches!(
            gw.update_status("R1", "verified", 1, &Identity::admin("A1")),
            Err(MutationError::Conflict { .. })
        ));
    }

    #[test]
    fn test_invalid_status_checked_first() {
        let gw = gateway();
        // Invalid status wins even for an unknown id and a farmer caller
        assert!(matches!(
            gw.update_status("nope", "shipped", 1, &Identity::farmer("F1")),
            Err(MutationError::InvalidArgument(_))
        ));
        assert!(matches!(
            gw.update_status("R1", "verified", 0, &Identity::admin("A1")),
            Err(MutationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_not_found() {
        let gw = gateway();
        assert_eq!(
            gw.update_status("R9", "paid", 1, &Identity::admin("A1")),
            Err(MutationError::NotFound("R9".into()))
        );
    }

    #[test]
    fn test_forbidden_does_not_write() {
        let gw = gateway();
        for status in ["pending", "verified", "paid"] {
            assert!(matches!(
                gw.update_status("R1", status, 1, &Identity::collector("C2")),
                Err(MutationError::Forbidden(_))
            ));
            assert!(matches!(
                gw.update_status("R1", status, 1, &Identity::farmer("F1")),
                Err(MutationError::Forbidden(_))
            ));
        }
        // Version untouched, so version 1 still applies
        let applied = gw
            .update_status("R1", "verified", 1, &Identity::collector("C1"))
            .unwrap();
        assert_eq!(applied.version, 2);
    }

    #[test]
    fn test_forward_only_rejects_backwards() {
        let gw = gateway_with(TransitionPolicy::ForwardOnly);
        gw.update_status("R1", "paid", 1, &Identity::admin("A1")).unwrap();
        assert!(matches!(
            gw.update_status("R1", "pending", 2, &Identity::admin("A1")),
            Err(MutationError::Forbidden(_))
        ));
    }

    #[test]
    fn test_storage_unavailable() {
        let gw = MutationGateway::new(Arc::new(DownStore), RoleGate::default());
        assert!(matches!(
            gw.update_status("R1", "paid", 1, &Identity::admin("A1")),
            Err(MutationError::StorageUnavailable(_))
        ));
    }

    #[test]
    fn test_committed_write_reported_as_applied() {
        // Every read after the first fails; the applied write must not
        // surface as a retryable storage error
        let gw = MutationGateway::new(Arc::new(FaultyStore::seeded(None)), RoleGate::default());
        let updated = gw.update_status("R1", "verified", 1, &Identity::admin("A1")).unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.status, LedgerStatus::Verified);
        assert_eq!(updated.crop_type, "Tea");
    }

    #[test]
    fn test_impossible_row_count_is_internal() {
        let gw = MutationGateway::new(Arc::new(FaultyStore::seeded(Some(2))), RoleGate::default());
        let err = gw.update_status("R1", "paid", 1, &Identity::admin("A1")).unwrap_err();
        assert!(matches!(err, MutationError::Internal(_)));
        assert!(matches!(LedgerError::from(err), LedgerError::Internal(_)));
    }

    #[test]
    fn test_into_ledger_error() {
        let err: LedgerError = MutationError::Forbidden("no".into()).into();
        assert!(matches!(err, LedgerError::Forbidden(_)));
    }
}
