//! Ordered view of the active department and wait-time derivation.
//!
//! The queue is not a stored structure: every query sorts a fresh snapshot of
//! the active records, so repeated reads with no intervening mutation return
//! the same total order. Census statistics are explicit on-demand functions
//! over a snapshot rather than values recomputed on every mutation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Patient;

/// Sorts a snapshot into queue order: acuity level, then priority rank, then
/// arrival time, then protocol number for full determinism.
pub fn ordered(mut patients: Vec<Patient>) -> Vec<Patient> {
    patients.sort_by(|a, b| {
        (
            a.acuity_level,
            a.priority_rank,
            a.arrived_at,
            a.protocol_number.as_str(),
        )
            .cmp(&(
                b.acuity_level,
                b.priority_rank,
                b.arrived_at,
                b.protocol_number.as_str(),
            ))
    });
    patients
}

/// Recomputes the derived wait for one record. Returns `None` when the
/// arrival timestamp is inconsistent with the refresh instant, so the sweep
/// can skip that record without failing the others.
pub fn refreshed_wait_minutes(patient: &Patient, now: DateTime<Utc>) -> Option<i64> {
    let minutes = (now - patient.arrived_at).num_minutes();
    (minutes >= 0).then_some(minutes)
}

/// On-demand census statistics over a queue snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub active: usize,
    /// Count per acuity level, index 0 = level 1.
    pub by_acuity: [usize; 5],
    pub average_wait_minutes: i64,
    pub longest_wait_minutes: i64,
}

pub fn stats(snapshot: &[Patient]) -> QueueStats {
    let mut by_acuity = [0usize; 5];
    let mut total_wait = 0i64;
    let mut longest_wait = 0i64;

    for patient in snapshot {
        if let Some(slot) = by_acuity.get_mut(patient.acuity_level.saturating_sub(1) as usize) {
            *slot += 1;
        }
        total_wait += patient.wait_time_minutes;
        longest_wait = longest_wait.max(patient.wait_time_minutes);
    }

    let average_wait_minutes = if snapshot.is_empty() {
        0
    } else {
        total_wait / snapshot.len() as i64
    };

    QueueStats {
        active: snapshot.len(),
        by_acuity,
        average_wait_minutes,
        longest_wait_minutes: longest_wait,
    }
}
