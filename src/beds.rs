//! Bed inventory and exclusivity rules.
//!
//! One bed holds at most one patient; release always lands on `Cleaning`
//! (housekeeping turnaround) and only `mark_available` returns a bed to
//! service. The patient-side half of the occupancy link is the caller's
//! responsibility; see [`crate::engine`] for the lock-ordering discipline.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::info;

use crate::error::{FlowError, FlowResult};
use crate::models::{Bed, BedStatus};

#[derive(Default)]
pub struct BedAllocator {
    beds: DashMap<String, Mutex<Bed>>,
}

impl BedAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a bed from unit configuration.
    pub fn add(&self, bed_number: &str) -> FlowResult<Bed> {
        if bed_number.trim().is_empty() {
            return Err(FlowError::ValidationFailed(
                "bed number cannot be empty".into(),
            ));
        }
        let bed = Bed::new(bed_number);
        match self.beds.entry(bed_number.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(FlowError::ValidationFailed(
                format!("bed {bed_number} is already configured"),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Mutex::new(bed.clone()));
                Ok(bed)
            }
        }
    }

    /// Current snapshot of one bed.
    pub fn get(&self, bed_number: &str) -> FlowResult<Bed> {
        let entry = self
            .beds
            .get(bed_number)
            .ok_or_else(|| FlowError::RecordNotFound(bed_number.to_string()))?;
        let bed = entry.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(bed.clone())
    }

    /// Dashboard snapshot of the whole inventory, ordered by bed number.
    pub fn snapshot(&self) -> Vec<Bed> {
        let mut beds: Vec<Bed> = self
            .beds
            .iter()
            .map(|entry| {
                entry
                    .value()
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone()
            })
            .collect();
        beds.sort_by(|a, b| a.bed_number.cmp(&b.bed_number));
        beds
    }

    /// Occupies an available bed. The caller validates the patient side
    /// (record exists, not already bedded) before calling in.
    pub fn assign(
        &self,
        bed_number: &str,
        patient_id: &str,
        now: DateTime<Utc>,
    ) -> FlowResult<Bed> {
        let entry = self
            .beds
            .get(bed_number)
            .ok_or_else(|| FlowError::RecordNotFound(bed_number.to_string()))?;
        let mut bed = entry.lock().unwrap_or_else(PoisonError::into_inner);

        if bed.status != BedStatus::Available {
            return Err(FlowError::BedNotAvailable(bed_number.to_string()));
        }

        bed.status = BedStatus::Occupied;
        bed.occupant_patient_id = Some(patient_id.to_string());
        bed.occupied_since = Some(now);
        debug_assert!(bed.occupancy_consistent());

        info!(bed = %bed_number, patient_id = %patient_id, "bed occupied");
        Ok(bed.clone())
    }

    /// Vacates an occupied bed into `Cleaning`. When `expected_occupant` is
    /// given, a different occupant fails the call, protecting callers that
    /// snapshot the occupant before taking their own locks.
    pub fn release(&self, bed_number: &str, expected_occupant: Option<&str>) -> FlowResult<Bed> {
        let entry = self
            .beds
            .get(bed_number)
            .ok_or_else(|| FlowError::RecordNotFound(bed_number.to_string()))?;
        let mut bed = entry.lock().unwrap_or_else(PoisonError::into_inner);

        if bed.status != BedStatus::Occupied {
            return Err(FlowError::BedNotOccupied(bed_number.to_string()));
        }
        if let Some(expected) = expected_occupant {
            if bed.occupant_patient_id.as_deref() != Some(expected) {
                return Err(FlowError::BedNotOccupied(bed_number.to_string()));
            }
        }

        bed.status = BedStatus::Cleaning;
        bed.occupant_patient_id = None;
        bed.occupied_since = None;
        debug_assert!(bed.occupancy_consistent());

        info!(bed = %bed_number, "bed released for cleaning");
        Ok(bed.clone())
    }

    /// Returns a cleaned or unblocked bed to service. Fails on an occupied
    /// bed; a bed that is already available is left as-is.
    pub fn mark_available(&self, bed_number: &str) -> FlowResult<Bed> {
        let entry = self
            .beds
            .get(bed_number)
            .ok_or_else(|| FlowError::RecordNotFound(bed_number.to_string()))?;
        let mut bed = entry.lock().unwrap_or_else(PoisonError::into_inner);

        if bed.status == BedStatus::Occupied {
            return Err(FlowError::BedNotAvailable(bed_number.to_string()));
        }

        bed.status = BedStatus::Available;
        debug_assert!(bed.occupancy_consistent());
        Ok(bed.clone())
    }

    /// Takes an unoccupied bed out of service.
    pub fn block(&self, bed_number: &str) -> FlowResult<Bed> {
        let entry = self
            .beds
            .get(bed_number)
            .ok_or_else(|| FlowError::RecordNotFound(bed_number.to_string()))?;
        let mut bed = entry.lock().unwrap_or_else(PoisonError::into_inner);

        if bed.status == BedStatus::Occupied {
            return Err(FlowError::BedNotAvailable(bed_number.to_string()));
        }

        bed.status = BedStatus::Blocked;
        debug_assert!(bed.occupancy_consistent());
        Ok(bed.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator_with(beds: &[&str]) -> BedAllocator {
        let allocator = BedAllocator::new();
        for bed in beds {
            allocator.add(bed).expect("unique bed number");
        }
        allocator
    }

    #[test]
    fn new_beds_start_available() {
        let allocator = allocator_with(&["ED-01"]);
        let bed = allocator.get("ED-01").expect("configured");
        assert_eq!(bed.status, BedStatus::Available);
        assert!(bed.occupant_patient_id.is_none());
    }

    #[test]
    fn duplicate_bed_numbers_are_rejected() {
        let allocator = allocator_with(&["ED-01"]);
        assert!(matches!(
            allocator.add("ED-01"),
            Err(FlowError::ValidationFailed(_))
        ));
    }

    #[test]
    fn assign_links_bed_and_stamps_occupied_since() {
        let allocator = allocator_with(&["ED-01"]);
        let now = Utc::now();
        let bed = allocator.assign("ED-01", "V-1", now).expect("available");
        assert_eq!(bed.status, BedStatus::Occupied);
        assert_eq!(bed.occupant_patient_id.as_deref(), Some("V-1"));
        assert_eq!(bed.occupied_since, Some(now));
    }

    #[test]
    fn assign_fails_unless_available() {
        let allocator = allocator_with(&["ED-01"]);
        allocator.assign("ED-01", "V-1", Utc::now()).expect("first");
        assert!(matches!(
            allocator.assign("ED-01", "V-2", Utc::now()),
            Err(FlowError::BedNotAvailable(_))
        ));

        allocator.release("ED-01", None).expect("occupied");
        // Cleaning is not available either.
        assert!(matches!(
            allocator.assign("ED-01", "V-2", Utc::now()),
            Err(FlowError::BedNotAvailable(_))
        ));
    }

    #[test]
    fn release_lands_on_cleaning_and_clears_occupant() {
        let allocator = allocator_with(&["ED-01"]);
        allocator.assign("ED-01", "V-1", Utc::now()).expect("available");
        let bed = allocator.release("ED-01", None).expect("occupied");
        assert_eq!(bed.status, BedStatus::Cleaning);
        assert!(bed.occupant_patient_id.is_none());
        assert!(bed.occupied_since.is_none());
    }

    #[test]
    fn release_of_an_unoccupied_bed_fails() {
        let allocator = allocator_with(&["ED-01"]);
        assert!(matches!(
            allocator.release("ED-01", None),
            Err(FlowError::BedNotOccupied(_))
        ));
    }

    #[test]
    fn release_with_a_stale_occupant_expectation_fails() {
        let allocator = allocator_with(&["ED-01"]);
        allocator.assign("ED-01", "V-1", Utc::now()).expect("available");
        assert!(matches!(
            allocator.release("ED-01", Some("V-2")),
            Err(FlowError::BedNotOccupied(_))
        ));
        // The bed is untouched by the failed call.
        assert_eq!(
            allocator.get("ED-01").expect("configured").status,
            BedStatus::Occupied
        );
    }

    #[test]
    fn mark_available_returns_cleaning_and_blocked_beds_to_service() {
        let allocator = allocator_with(&["ED-01", "ED-02"]);
        allocator.assign("ED-01", "V-1", Utc::now()).expect("available");
        allocator.release("ED-01", None).expect("occupied");
        assert_eq!(
            allocator.mark_available("ED-01").expect("cleaning").status,
            BedStatus::Available
        );

        allocator.block("ED-02").expect("unoccupied");
        assert_eq!(
            allocator.mark_available("ED-02").expect("blocked").status,
            BedStatus::Available
        );
    }

    #[test]
    fn mark_available_fails_on_an_occupied_bed() {
        let allocator = allocator_with(&["ED-01"]);
        allocator.assign("ED-01", "V-1", Utc::now()).expect("available");
        assert!(matches!(
            allocator.mark_available("ED-01"),
            Err(FlowError::BedNotAvailable(_))
        ));
    }

    #[test]
    fn block_fails_on_an_occupied_bed() {
        let allocator = allocator_with(&["ED-01"]);
        allocator.assign("ED-01", "V-1", Utc::now()).expect("available");
        assert!(matches!(
            allocator.block("ED-01"),
            Err(FlowError::BedNotAvailable(_))
        ));
    }

    #[test]
    fn unknown_bed_is_record_not_found() {
        let allocator = allocator_with(&[]);
        assert!(matches!(
            allocator.get("ED-99"),
            Err(FlowError::RecordNotFound(_))
        ));
    }

    #[test]
    fn snapshot_is_ordered_by_bed_number() {
        let allocator = allocator_with(&["ED-03", "ED-01", "ED-02"]);
        let numbers: Vec<String> = allocator
            .snapshot()
            .into_iter()
            .map(|b| b.bed_number)
            .collect();
        assert_eq!(numbers, vec!["ED-01", "ED-02", "ED-03"]);
    }
}
