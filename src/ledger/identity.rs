//! Authenticated caller identity
//!
//! Produced by the credential layer (bearer token verification) and passed
//! explicitly to every ledger operation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Actor role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Farmer,
    Collector,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Farmer => "farmer",
            Role::Collector => "collector",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "farmer" => Ok(Role::Farmer),
            "collector" => Ok(Role::Collector),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified `(subject_id, role)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub subject_id: String,
    pub role: Role,
}

impl Identity {
    pub fn new(subject_id: impl Into<String>, role: Role) -> Self {
        Self {
            subject_id: subject_id.into(),
            role,
        }
    }

    pub fn farmer(subject_id: impl Into<String>) -> Self {
        Self::new(subject_id, Role::Farmer)
    }

    pub fn collector(subject_id: impl Into<String>) -> Self {
        Self::new(subject_id, Role::Collector)
    }

    pub fn admin(subject_id: impl Into<String>) -> Self {
        Self::new(subject_id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.subject_id)
    }
}
