//! Pure vitals evaluation against the department's fixed threshold table.
//!
//! Deterministic and side-effect free; consumed by the display layer and by
//! triage review. The acuity hint produced here is a prompt for the
//! clinician, never a substitute for the entered acuity level.

use serde::{Deserialize, Serialize};

use crate::models::VitalSigns;

// Clinical threshold table.
pub const HEART_RATE_RANGE: (f32, f32) = (60.0, 100.0);
pub const OXYGEN_SATURATION_FLOOR: f32 = 95.0;
pub const OXYGEN_SATURATION_CRITICAL: f32 = 90.0;
pub const TEMPERATURE_RANGE_F: (f32, f32) = (96.0, 100.4);
pub const RESPIRATORY_RATE_RANGE: (f32, f32) = (12.0, 20.0);
pub const GCS_FLOOR: u8 = 13;
pub const SEVERE_PAIN_FLOOR: u8 = 7;

/// A single abnormal-value finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VitalFlag {
    Tachycardia,
    Bradycardia,
    Hypoxia,
    Fever,
    Hypothermia,
    Tachypnea,
    Bradypnea,
    DepressedConsciousness,
    SeverePain,
}

/// Outcome of evaluating one vitals snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsAssessment {
    pub flags: Vec<VitalFlag>,
    /// Display-side severity hint, 1 (most severe) to 5.
    pub acuity_hint: u8,
}

/// Maps a snapshot to its abnormality flags and an acuity hint. Each flag is
/// computed independently against the threshold table; an absent optional
/// field is never flagged by omission.
pub fn evaluate(vitals: &VitalSigns) -> VitalsAssessment {
    let mut flags = Vec::new();

    if vitals.heart_rate > HEART_RATE_RANGE.1 {
        flags.push(VitalFlag::Tachycardia);
    } else if vitals.heart_rate < HEART_RATE_RANGE.0 {
        flags.push(VitalFlag::Bradycardia);
    }

    if vitals.oxygen_saturation < OXYGEN_SATURATION_FLOOR {
        flags.push(VitalFlag::Hypoxia);
    }

    if vitals.temperature > TEMPERATURE_RANGE_F.1 {
        flags.push(VitalFlag::Fever);
    } else if vitals.temperature < TEMPERATURE_RANGE_F.0 {
        flags.push(VitalFlag::Hypothermia);
    }

    if vitals.respiratory_rate > RESPIRATORY_RATE_RANGE.1 {
        flags.push(VitalFlag::Tachypnea);
    } else if vitals.respiratory_rate < RESPIRATORY_RATE_RANGE.0 {
        flags.push(VitalFlag::Bradypnea);
    }

    if vitals.glasgow_coma_scale < GCS_FLOOR {
        flags.push(VitalFlag::DepressedConsciousness);
    }

    if let Some(pain) = vitals.pain_scale {
        if pain >= SEVERE_PAIN_FLOOR {
            flags.push(VitalFlag::SeverePain);
        }
    }

    let acuity_hint = hint_from(&flags, vitals);

    VitalsAssessment { flags, acuity_hint }
}

/// Starts at 5, drops one level per abnormality down to 2; depressed
/// consciousness or critical hypoxia forces 1.
fn hint_from(flags: &[VitalFlag], vitals: &VitalSigns) -> u8 {
    if vitals.glasgow_coma_scale < GCS_FLOOR
        || vitals.oxygen_saturation < OXYGEN_SATURATION_CRITICAL
    {
        return 1;
    }
    5u8.saturating_sub(flags.len() as u8).max(2)
}

/// Basic plausibility checks applied before a snapshot is accepted.
pub fn validate_snapshot(vitals: &VitalSigns) -> Result<(), String> {
    if !(3..=15).contains(&vitals.glasgow_coma_scale) {
        return Err(format!(
            "glasgow coma scale must be 3-15, got {}",
            vitals.glasgow_coma_scale
        ));
    }
    if let Some(pain) = vitals.pain_scale {
        if pain > 10 {
            return Err(format!("pain scale must be 0-10, got {pain}"));
        }
    }
    let measurements = [
        ("heart rate", vitals.heart_rate),
        ("systolic blood pressure", vitals.blood_pressure_systolic),
        ("diastolic blood pressure", vitals.blood_pressure_diastolic),
        ("temperature", vitals.temperature),
        ("oxygen saturation", vitals.oxygen_saturation),
        ("respiratory rate", vitals.respiratory_rate),
    ];
    for (name, value) in measurements {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{name} is not a plausible measurement: {value}"));
        }
    }
    Ok(())
}
