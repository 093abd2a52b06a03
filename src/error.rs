use crate::models::PatientStatus;

/// Error kinds returned by flow operations.
///
/// Every failure is synchronous and terminal for the call: the registry is
/// left exactly as it was and the caller may resubmit with corrected input.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("no active record for id: {0}")]
    RecordNotFound(String),
    #[error("illegal state transition: {from} -> {to}")]
    IllegalStateTransition {
        from: PatientStatus,
        to: PatientStatus,
    },
    #[error("priority rank {rank} is outside the band for acuity level {level}")]
    OutOfBandPriority { level: u8, rank: u32 },
    #[error("bed {0} is not available")]
    BedNotAvailable(String),
    #[error("patient {patient_id} already occupies bed {bed_id}")]
    PatientAlreadyBedded { patient_id: String, bed_id: String },
    #[error("bed {0} is not occupied")]
    BedNotOccupied(String),
    #[error("patient {patient_id} at acuity level {acuity_level} is not eligible for fast track")]
    IneligibleForFastTrack {
        patient_id: String,
        acuity_level: u8,
    },
    #[error("invalid input: {0}")]
    ValidationFailed(String),
}

pub type FlowResult<T> = std::result::Result<T, FlowError>;
