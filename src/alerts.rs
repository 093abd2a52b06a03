//! Time-critical alert detection and idempotent activation.
//!
//! The dispatcher scans a record after registration, triage assignment, and
//! chief-complaint updates. An unacknowledged activation suppresses
//! re-activation of the same protocol for that patient; once acknowledged, a
//! fresh trigger opens a new activation. Each new activation is handed to the
//! notification sink exactly once.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{FlowError, FlowResult};
use crate::models::{AlertActivation, AlertKind, Patient};

/// Markers scanned case-insensitively in the chief complaint.
const STEMI_MARKERS: &[&str] = &["stemi", "st elevation", "st-elevation"];
const STROKE_MARKERS: &[&str] = &["stroke", "cva", "facial droop", "hemiparesis"];
const TRAUMA_MARKERS: &[&str] = &["trauma"];

/// Seam for the notification/paging collaborator. Called exactly once per
/// new activation.
#[cfg_attr(test, mockall::automock)]
pub trait AlertSink: Send + Sync {
    fn alert_raised(&self, activation: &AlertActivation);
}

/// Default sink: structured log only.
pub struct TracingSink;

impl AlertSink for TracingSink {
    fn alert_raised(&self, activation: &AlertActivation) {
        info!(
            patient_id = %activation.patient_id,
            kind = ?activation.kind,
            "alert activated"
        );
    }
}

pub struct AlertDispatcher {
    activations: Mutex<Vec<AlertActivation>>,
    sink: Arc<dyn AlertSink>,
}

impl AlertDispatcher {
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self {
            activations: Mutex::new(Vec::new()),
            sink,
        }
    }

    /// Trigger conditions present on the record right now.
    fn triggered_kinds(patient: &Patient) -> Vec<AlertKind> {
        let complaint = patient.chief_complaint.to_lowercase();
        let mut kinds = Vec::new();

        if STEMI_MARKERS.iter().any(|m| complaint.contains(m)) {
            kinds.push(AlertKind::Stemi);
        }
        if STROKE_MARKERS.iter().any(|m| complaint.contains(m)) {
            kinds.push(AlertKind::Stroke);
        }
        // Trauma needs both the marker and an explicitly chosen tier.
        if TRAUMA_MARKERS.iter().any(|m| complaint.contains(m)) {
            if let Some(level) = patient.trauma_activation_level {
                kinds.push(AlertKind::Trauma(level));
            }
        }

        kinds
    }

    /// Re-evaluates a record and returns the activations created by this
    /// call. A live (unacknowledged) activation of the same protocol makes
    /// re-evaluation a no-op for that protocol.
    pub fn evaluate(&self, patient: &Patient) -> Vec<AlertActivation> {
        let triggered = Self::triggered_kinds(patient);
        if triggered.is_empty() {
            return Vec::new();
        }

        let mut created = Vec::new();
        {
            let mut activations = self
                .activations
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            for kind in triggered {
                let already_live = activations.iter().any(|a| {
                    a.patient_id == patient.protocol_number
                        && a.kind.same_protocol(&kind)
                        && !a.acknowledged
                });
                if already_live {
                    continue;
                }
                let activation = AlertActivation {
                    id: Uuid::new_v4(),
                    patient_id: patient.protocol_number.clone(),
                    kind,
                    activated_at: Utc::now(),
                    acknowledged: false,
                    acknowledged_by: None,
                    acknowledged_at: None,
                };
                activations.push(activation.clone());
                created.push(activation);
            }
        }

        // Notify outside the lock; the engine serializes evaluation per
        // patient, so no duplicate can slip in between.
        for activation in &created {
            self.sink.alert_raised(activation);
        }
        created
    }

    /// Marks an activation acknowledged, which re-opens that protocol for
    /// future activation.
    pub fn acknowledge(&self, alert_id: Uuid, acknowledged_by: &str) -> FlowResult<AlertActivation> {
        let mut activations = self
            .activations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let activation = activations
            .iter_mut()
            .find(|a| a.id == alert_id)
            .ok_or_else(|| FlowError::RecordNotFound(alert_id.to_string()))?;

        activation.acknowledged = true;
        activation.acknowledged_by = Some(acknowledged_by.to_string());
        activation.acknowledged_at = Some(Utc::now());
        info!(alert_id = %alert_id, by = %acknowledged_by, "alert acknowledged");
        Ok(activation.clone())
    }

    /// Unacknowledged activations, department-wide.
    pub fn active(&self) -> Vec<AlertActivation> {
        self.activations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|a| !a.acknowledged)
            .cloned()
            .collect()
    }

    /// Every activation recorded for one patient, newest last.
    pub fn for_patient(&self, patient_id: &str) -> Vec<AlertActivation> {
        self.activations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect()
    }
}
