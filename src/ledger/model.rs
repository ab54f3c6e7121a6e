//! Collection record and lifecycle status

use std::fmt;
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status shared by collections and transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    Pending,
    Verified,
    Paid,
}

impl LedgerStatus {
    pub const ALL: [LedgerStatus; 3] = [Self::Pending, Self::Verified, Self::Paid];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Paid => "paid",
        }
    }

    /// Position in the pending → verified → paid lifecycle
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Verified => 1,
            Self::Paid => 2,
        }
    }
}

impl FromStr for LedgerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "paid" => Ok(Self::Paid),
            other => Err(format!(
                "status '{}' is not valid. Valid values: pending, verified, paid",
                other
            )),
        }
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A produce hand-off between a farmer and a collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub farmer_id: String,
    pub collector_id: String,
    pub crop_type: String,
    pub weight_kg: f64,
    pub price_per_kg: f64,
    pub status: LedgerStatus,
    /// Conflict-detection token, 1 at creation
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Collection {
    /// Derived value; never stored
    pub fn value(&self) -> f64 {
        self.weight_kg * self.price_per_kg
    }

    /// Serializable view that includes the derived value
    pub fn view(&self) -> CollectionView<'_> {
        CollectionView {
            collection: self,
            value: self.value(),
        }
    }
}

/// JSON shape returned to clients
#[derive(Debug, Serialize)]
pub struct CollectionView<'a> {
    #[serde(flatten)]
    pub collection: &'a Collection,
    pub value: f64,
}

/// Current time as an RFC 3339 UTC string
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Collection {
        Collection {
            id: "c-1".into(),
            farmer_id: "f-1".into(),
            collector_id: "k-1".into(),
            crop_type: "Tea".into(),
            weight_kg: 12.5,
            price_per_kg: 40.0,
            status: LedgerStatus::Pending,
            version: 1,
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("verified".parse::<LedgerStatus>(), Ok(LedgerStatus::Verified));
        assert!("Verified".parse::<LedgerStatus>().is_err());
        assert!("shipped".parse::<LedgerStatus>().is_err());
    }

    #[test]
    fn test_status_rank_order() {
        assert!(LedgerStatus::Pending.rank() < LedgerStatus::Verified.rank());
        assert!(LedgerStatus::Verified.rank() < LedgerStatus::Paid.rank());
    }

    #[test]
    fn test_view_includes_value() {
        let c = sample();
        let json = serde_json::to_value(c.view()).unwrap();
        assert_eq!(json["value"], 500.0);
        assert_eq!(json["status"], "pending");
        assert_eq!(json["version"], 1);
    }
}
