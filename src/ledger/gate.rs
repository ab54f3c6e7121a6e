//! Role gate: who may change a collection's status
//!
//! - farmers never
//! - collectors only on collections they own
//! - admins on any collection
//!
//! Evaluated against the record as read just before the guarded write.

use serde::{Deserialize, Serialize};

use super::identity::{Identity, Role};
use super::model::{Collection, LedgerStatus};

/// Decision for one requested transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Deny(String),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }
}

/// Which target statuses are acceptable from a given current status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Any of the three statuses may be set from any status
    #[default]
    Unrestricted,
    /// Only strictly later lifecycle stages (pending < verified < paid)
    ForwardOnly,
}

impl TransitionPolicy {
    pub fn permits(&self, from: LedgerStatus, to: LedgerStatus) -> bool {
        match self {
            TransitionPolicy::Unrestricted => true,
            TransitionPolicy::ForwardOnly => to.rank() > from.rank(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoleGate {
    policy: TransitionPolicy,
}

impl RoleGate {
    pub fn new(policy: TransitionPolicy) -> Self {
        Self { policy }
    }

    /// Decide whether `identity` may move `record` to `target`
    pub fn check(
        &self,
        identity: &Identity,
        record: &Collection,
        target: LedgerStatus,
    ) -> GateDecision {
        match identity.role {
            Role::Farmer => {
                return GateDecision::Deny("farmers cannot change collection status".into());
            }
            Role::Collector if record.collector_id != identity.subject_id => {
                return GateDecision::Deny("not authorized to update this collection".into());
            }
            Role::Collector | Role::Admin => {}
        }

        if !self.policy.permits(record.status, target) {
            return GateDecision::Deny(format!(
                "transition {} -> {} is not permitted",
                record.status, target
            ));
        }

        GateDecision::Allow
    }
}
