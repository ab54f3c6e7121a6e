//! Version guard: version-qualified status writes
//!
//! Every write names the version the caller last observed. A stale version
//! turns into a [`GuardOutcome::Conflict`] carrying the stored record, never
//! into a silent overwrite. There is no retry here; callers re-read and
//! resubmit.

use std::sync::Arc;

use tracing::debug;

use crate::error::LedgerError;

use super::model::{now_rfc3339, Collection, LedgerStatus};
use super::store::RecordStore;

/// Result of a guarded write
#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    /// Write took effect; record at `expected_version + 1`
    Applied(Collection),
    /// Stored version differed; record as currently stored
    Conflict(Collection),
    NotFound,
}

pub struct VersionGuard {
    store: Arc<dyn RecordStore>,
}

impl VersionGuard {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Apply `status` to `snapshot.id` if its version is still `expected_version`
    ///
    /// `snapshot` is the record as read before the write. Only `status`,
    /// `version` and `updated_at` change on a guarded write, so an applied
    /// write is reported from the snapshot without reading the row back.
    pub fn apply(
        &self,
        snapshot: &Collection,
        expected_version: i64,
        status: LedgerStatus,
    ) -> Result<GuardOutcome, LedgerError> {
        let id = snapshot.id.as_str();
        let updated_at = now_rfc3339();
        let changes = self.store.conditional_write(id, expected_version, status, &updated_at)?;

        match changes {
            1 => {
                let record = Collection {
                    status,
                    version: expected_version + 1,
                    updated_at,
                    ..snapshot.clone()
                };
                debug!(
                    id = %id,
                    version = record.version,
                    status = %record.status,
                    "Guarded write applied"
                );
                Ok(GuardOutcome::Applied(record))
            }
            0 => match self.store.read(id)? {
                Some(current) => {
                    debug!(
                        id = %id,
                        expected_version,
                        current_version = current.version,
                        "Guarded write rejected: version mismatch"
                    );
                    Ok(GuardOutcome::Conflict(current))
                }
                None => Ok(GuardOutcome::NotFound),
            },
            n => Err(LedgerError::Internal(format!(
                "conditional write on {} affected {} rows",
                id, n
            ))),
        }
    }
}
