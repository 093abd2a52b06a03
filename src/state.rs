//! Care-pathway state machine.
//!
//! Legal edges: triage -> roomed -> provider-eval -> diagnostics ->
//! treatment -> observation -> {admitted | discharged}, plus any non-terminal
//! state -> discharged (covering the leave-before-seen short-circuit and AMA
//! or deceased outcomes, which are discharge sub-reasons).

use chrono::{DateTime, Utc};

use crate::error::{FlowError, FlowResult};
use crate::models::{Patient, PatientStatus};

/// Whether `from -> to` is a declared edge of the care pathway.
pub fn is_legal(from: PatientStatus, to: PatientStatus) -> bool {
    use PatientStatus::*;

    if from.is_terminal() {
        return false;
    }
    matches!(
        (from, to),
        (_, Discharged)
            | (Triage, Roomed)
            | (Roomed, ProviderEval)
            | (ProviderEval, Diagnostics)
            | (Diagnostics, Treatment)
            | (Treatment, Observation)
            | (Observation, Admitted)
    )
}

/// Applies a transition to the record, stamping door-to-doctor time once at
/// first provider evaluation. An illegal transition fails with
/// `IllegalStateTransition` and leaves the record unchanged.
pub fn transition(
    patient: &mut Patient,
    to: PatientStatus,
    now: DateTime<Utc>,
) -> FlowResult<()> {
    let from = patient.status;
    if !is_legal(from, to) {
        return Err(FlowError::IllegalStateTransition { from, to });
    }
    if to == PatientStatus::ProviderEval && patient.door_to_doctor_minutes.is_none() {
        patient.door_to_doctor_minutes = Some((now - patient.arrived_at).num_minutes());
    }
    patient.status = to;
    Ok(())
}
