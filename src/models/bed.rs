use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BedStatus {
    Available,
    Occupied,
    Cleaning,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bed {
    pub bed_number: String,
    pub status: BedStatus,
    pub occupant_patient_id: Option<String>,
    pub occupied_since: Option<DateTime<Utc>>,
}

impl Bed {
    pub fn new(bed_number: &str) -> Self {
        Self {
            bed_number: bed_number.to_string(),
            status: BedStatus::Available,
            occupant_patient_id: None,
            occupied_since: None,
        }
    }

    /// Invariant: `status == Occupied` iff an occupant is linked.
    pub fn occupancy_consistent(&self) -> bool {
        (self.status == BedStatus::Occupied) == self.occupant_patient_id.is_some()
    }
}
