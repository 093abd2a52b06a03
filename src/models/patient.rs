use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the patient arrived at the department.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArrivalMethod {
    WalkIn,
    Ems,
    PrivateAmbulance,
    Police,
    Transfer,
}

/// Care-pathway state. `Admitted` and `Discharged` are terminal; the legal
/// edges between the others live in [`crate::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatientStatus {
    Triage,
    Roomed,
    ProviderEval,
    Diagnostics,
    Treatment,
    Observation,
    Admitted,
    Discharged,
}

impl PatientStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PatientStatus::Admitted | PatientStatus::Discharged)
    }
}

impl std::fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PatientStatus::Triage => "triage",
            PatientStatus::Roomed => "roomed",
            PatientStatus::ProviderEval => "provider-eval",
            PatientStatus::Diagnostics => "diagnostics",
            PatientStatus::Treatment => "treatment",
            PatientStatus::Observation => "observation",
            PatientStatus::Admitted => "admitted",
            PatientStatus::Discharged => "discharged",
        };
        f.write_str(name)
    }
}

/// Why a visit ended. Against-medical-advice and deceased outcomes are
/// discharge sub-reasons, not separate pathway states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DischargeReason {
    Routine,
    LeftWithoutBeingSeen,
    AgainstMedicalAdvice,
    Deceased,
    Transferred,
}

/// One vitals snapshot. Immutable once recorded; a new snapshot replaces the
/// previous one as a whole value, so readers never see a partial update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    pub heart_rate: f32,
    pub blood_pressure_systolic: f32,
    pub blood_pressure_diastolic: f32,
    /// Degrees Fahrenheit.
    pub temperature: f32,
    pub oxygen_saturation: f32,
    pub respiratory_rate: f32,
    /// 3..=15.
    pub glasgow_coma_scale: u8,
    /// 0..=10 when assessed.
    pub pain_scale: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Visit identifier; the registry key.
    pub protocol_number: String,
    pub mrn: String,
    pub first_name: String,
    pub last_name: String,
    pub age: u8,
    pub sex: String,
    pub arrival_method: ArrivalMethod,
    pub arrived_at: DateTime<Utc>,
    /// ESI acuity, 1 (most severe) to 5. Clinician-entered at triage.
    pub acuity_level: u8,
    /// Position within the acuity band; lower is seen sooner.
    pub priority_rank: u32,
    pub chief_complaint: String,
    pub vital_signs: Option<VitalSigns>,
    pub status: PatientStatus,
    pub bed_id: Option<String>,
    /// Tiered trauma response level (1 = full team, 3 = limited).
    pub trauma_activation_level: Option<u8>,
    pub stemi_alert: bool,
    pub stroke_alert: bool,
    pub is_repeat_visit: bool,
    /// Derived from arrival time by the periodic refresh; never persisted stale.
    pub wait_time_minutes: i64,
    /// Fixed once at first provider evaluation, never recomputed.
    pub door_to_doctor_minutes: Option<i64>,
    pub discharge_reason: Option<DischargeReason>,
}
