//! Flow façade: sequences triage, pathway state, queue, bed, and alert
//! concerns in response to external operations.
//!
//! The engine owns the in-memory authoritative registries (patients and
//! beds), each aggregate behind its own mutex. Operations that touch a
//! patient and a bed take the patient lock first, then the bed lock, so the
//! two-resource paths cannot deadlock. Every operation validates end-to-end
//! before mutating anything; a failed call leaves the registries exactly as
//! they were. Durability is the persistence collaborator's job, invoked by
//! the embedding application after each successful operation.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::alerts::{AlertDispatcher, AlertSink, TracingSink};
use crate::beds::BedAllocator;
use crate::config::EngineConfig;
use crate::error::{FlowError, FlowResult};
use crate::models::{
    AlertActivation, AlertKind, ArrivalMethod, Bed, DischargeReason, Patient, PatientStatus,
    VitalSigns,
};
use crate::queue::{self, QueueStats};
use crate::state;
use crate::triage;
use crate::vitals;

/// Fields supplied by the registration intake collaborator. The engine
/// stamps arrival time, initial status, and the default acuity.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Registration {
    #[validate(length(min = 1))]
    pub protocol_number: String,
    #[validate(length(min = 1))]
    pub mrn: String,
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    pub age: u8,
    #[validate(length(min = 1))]
    pub sex: String,
    pub arrival_method: ArrivalMethod,
    #[validate(length(min = 1))]
    pub chief_complaint: String,
}

/// The clinician's triage judgment. The engine validates the rank against
/// the level's band; it never derives either from vitals.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TriageDecision {
    pub acuity_level: u8,
    pub priority_rank: u32,
    /// Set when the clinician activates the trauma pathway (1 = full team,
    /// 3 = limited).
    pub trauma_activation_level: Option<u8>,
}

pub struct FlowEngine {
    config: EngineConfig,
    patients: DashMap<String, Arc<Mutex<Patient>>>,
    beds: BedAllocator,
    alerts: AlertDispatcher,
    /// Every MRN ever registered, including discharged visits, for
    /// repeat-visit stamping.
    known_mrns: Mutex<HashSet<String>>,
    last_wait_refresh: Mutex<Option<DateTime<Utc>>>,
}

impl FlowEngine {
    /// Engine with the default tracing-backed alert sink.
    pub fn new(config: EngineConfig) -> FlowResult<Self> {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Engine wired to a notification/paging collaborator.
    pub fn with_sink(config: EngineConfig, sink: Arc<dyn AlertSink>) -> FlowResult<Self> {
        // A misconfigured default band would fail every registration.
        triage::validate_band(config.default_acuity_level, config.default_priority_rank)?;
        if config.wait_refresh_interval_secs == 0 {
            return Err(FlowError::ValidationFailed(
                "wait refresh interval must be at least one second".into(),
            ));
        }
        Ok(Self {
            config,
            patients: DashMap::new(),
            beds: BedAllocator::new(),
            alerts: AlertDispatcher::new(sink),
            known_mrns: Mutex::new(HashSet::new()),
            last_wait_refresh: Mutex::new(None),
        })
    }

    /// Locks an active (non-terminal) record and runs `f` on it. The guard
    /// is scoped to this call, so no lock or internal type leaks.
    fn with_active_patient<T>(
        &self,
        patient_id: &str,
        f: impl FnOnce(&mut Patient) -> FlowResult<T>,
    ) -> FlowResult<T> {
        let record = self
            .patients
            .get(patient_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| FlowError::RecordNotFound(patient_id.to_string()))?;
        let mut patient = record.lock().unwrap_or_else(PoisonError::into_inner);
        if patient.status.is_terminal() {
            // Admitted records linger for reporting but accept no mutation.
            return Err(FlowError::RecordNotFound(patient_id.to_string()));
        }
        f(&mut patient)
    }

    /// Re-runs trigger detection and mirrors raised protocols onto the
    /// record's display flags. Caller holds the patient lock.
    fn scan_for_alerts(&self, patient: &mut Patient) {
        for activation in self.alerts.evaluate(patient) {
            match activation.kind {
                AlertKind::Stemi => patient.stemi_alert = true,
                AlertKind::Stroke => patient.stroke_alert = true,
                AlertKind::Trauma(_) => {}
            }
        }
    }

    /// Releases the patient's bed link, if any. Caller holds the patient
    /// lock; the allocator takes the bed lock second.
    fn vacate_bed(&self, patient: &mut Patient) {
        if let Some(bed_number) = patient.bed_id.take() {
            if let Err(err) = self
                .beds
                .release(&bed_number, Some(&patient.protocol_number))
            {
                warn!(bed = %bed_number, %err, "bed link was inconsistent at release");
            }
        }
    }

    // ===== Registration & triage =====

    #[instrument(skip(self, registration), fields(protocol = %registration.protocol_number))]
    pub fn register_patient(&self, registration: Registration) -> FlowResult<Patient> {
        registration
            .validate()
            .map_err(|e| FlowError::ValidationFailed(e.to_string()))?;

        let record = match self.patients.entry(registration.protocol_number.clone()) {
            Entry::Occupied(_) => {
                return Err(FlowError::ValidationFailed(format!(
                    "protocol number {} is already registered",
                    registration.protocol_number
                )))
            }
            Entry::Vacant(slot) => {
                let is_repeat_visit = {
                    let mut seen = self
                        .known_mrns
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    !seen.insert(registration.mrn.clone())
                };
                let patient = Patient {
                    protocol_number: registration.protocol_number.clone(),
                    mrn: registration.mrn,
                    first_name: registration.first_name,
                    last_name: registration.last_name,
                    age: registration.age,
                    sex: registration.sex,
                    arrival_method: registration.arrival_method,
                    arrived_at: Utc::now(),
                    acuity_level: self.config.default_acuity_level,
                    priority_rank: self.config.default_priority_rank,
                    chief_complaint: registration.chief_complaint,
                    vital_signs: None,
                    status: PatientStatus::Triage,
                    bed_id: None,
                    trauma_activation_level: None,
                    stemi_alert: false,
                    stroke_alert: false,
                    is_repeat_visit,
                    wait_time_minutes: 0,
                    door_to_doctor_minutes: None,
                    discharge_reason: None,
                };
                let record = Arc::new(Mutex::new(patient));
                slot.insert(record.clone());
                record
            }
        };

        let mut patient = record.lock().unwrap_or_else(PoisonError::into_inner);
        self.scan_for_alerts(&mut patient);
        info!(
            acuity = patient.acuity_level,
            repeat = patient.is_repeat_visit,
            "patient registered, pending formal triage"
        );
        Ok(patient.clone())
    }

    #[instrument(skip(self), fields(patient_id = %patient_id, level = decision.acuity_level, rank = decision.priority_rank))]
    pub fn assign_triage(
        &self,
        patient_id: &str,
        decision: TriageDecision,
    ) -> FlowResult<Patient> {
        triage::validate_band(decision.acuity_level, decision.priority_rank)?;
        if let Some(level) = decision.trauma_activation_level {
            if !(1..=3).contains(&level) {
                return Err(FlowError::ValidationFailed(format!(
                    "trauma activation level must be 1-3, got {level}"
                )));
            }
        }

        self.with_active_patient(patient_id, |patient| {
            patient.acuity_level = decision.acuity_level;
            patient.priority_rank = decision.priority_rank;
            if decision.trauma_activation_level.is_some() {
                patient.trauma_activation_level = decision.trauma_activation_level;
            }
            self.scan_for_alerts(patient);
            info!("triage assigned");
            Ok(patient.clone())
        })
    }

    #[instrument(skip(self, vitals), fields(patient_id = %patient_id))]
    pub fn update_vitals(&self, patient_id: &str, vitals: VitalSigns) -> FlowResult<Patient> {
        vitals::validate_snapshot(&vitals).map_err(FlowError::ValidationFailed)?;
        let assessment = vitals::evaluate(&vitals);

        self.with_active_patient(patient_id, move |patient| {
            // Whole-value replacement under the lock: readers see the old
            // snapshot or the new one, never a mix.
            patient.vital_signs = Some(vitals);
            debug!(
                flags = ?assessment.flags,
                hint = assessment.acuity_hint,
                "vitals snapshot replaced"
            );
            Ok(patient.clone())
        })
    }

    #[instrument(skip(self, chief_complaint), fields(patient_id = %patient_id))]
    pub fn update_chief_complaint(
        &self,
        patient_id: &str,
        chief_complaint: &str,
    ) -> FlowResult<Patient> {
        if chief_complaint.trim().is_empty() {
            return Err(FlowError::ValidationFailed(
                "chief complaint cannot be empty".into(),
            ));
        }
        self.with_active_patient(patient_id, |patient| {
            patient.chief_complaint = chief_complaint.to_string();
            self.scan_for_alerts(patient);
            Ok(patient.clone())
        })
    }

    // ===== Beds =====

    /// Registers a bed from unit configuration.
    pub fn add_bed(&self, bed_number: &str) -> FlowResult<Bed> {
        self.beds.add(bed_number)
    }

    #[instrument(skip(self), fields(patient_id = %patient_id, bed = %bed_number))]
    pub fn assign_bed(&self, patient_id: &str, bed_number: &str) -> FlowResult<Bed> {
        self.with_active_patient(patient_id, |patient| {
            if let Some(existing) = &patient.bed_id {
                return Err(FlowError::PatientAlreadyBedded {
                    patient_id: patient.protocol_number.clone(),
                    bed_id: existing.clone(),
                });
            }
            let bed = self
                .beds
                .assign(bed_number, &patient.protocol_number, Utc::now())?;
            patient.bed_id = Some(bed.bed_number.clone());
            Ok(bed)
        })
    }

    #[instrument(skip(self), fields(bed = %bed_number))]
    pub fn release_bed(&self, bed_number: &str) -> FlowResult<Bed> {
        // Snapshot the occupant first so the patient lock is taken before
        // the bed lock.
        let occupant = self.beds.get(bed_number)?.occupant_patient_id;
        match occupant {
            None => Err(FlowError::BedNotOccupied(bed_number.to_string())),
            Some(patient_id) => self.with_active_patient(&patient_id, |patient| {
                let bed = self.beds.release(bed_number, Some(&patient_id))?;
                patient.bed_id = None;
                Ok(bed)
            }),
        }
    }

    /// Housekeeping turnaround complete: a cleaned or blocked bed returns to
    /// service.
    pub fn mark_bed_available(&self, bed_number: &str) -> FlowResult<Bed> {
        self.beds.mark_available(bed_number)
    }

    /// Takes an unoccupied bed out of service.
    pub fn block_bed(&self, bed_number: &str) -> FlowResult<Bed> {
        self.beds.block(bed_number)
    }

    // ===== Disposition =====

    #[instrument(skip(self), fields(patient_id = %patient_id, to = %to))]
    pub fn transition_status(
        &self,
        patient_id: &str,
        to: PatientStatus,
    ) -> FlowResult<Patient> {
        match to {
            // Terminal targets carry bed-release side effects.
            PatientStatus::Discharged => self.discharge(patient_id, DischargeReason::Routine),
            PatientStatus::Admitted => self.transfer_or_admit(patient_id),
            _ => self.with_active_patient(patient_id, |patient| {
                state::transition(patient, to, Utc::now())?;
                info!("status updated");
                Ok(patient.clone())
            }),
        }
    }

    #[instrument(skip(self), fields(patient_id = %patient_id))]
    pub fn transfer_or_admit(&self, patient_id: &str) -> FlowResult<Patient> {
        self.with_active_patient(patient_id, |patient| {
            if !state::is_legal(patient.status, PatientStatus::Admitted) {
                return Err(FlowError::IllegalStateTransition {
                    from: patient.status,
                    to: PatientStatus::Admitted,
                });
            }
            self.vacate_bed(patient);
            state::transition(patient, PatientStatus::Admitted, Utc::now())?;
            info!("patient admitted; record retained for reporting");
            Ok(patient.clone())
        })
    }

    #[instrument(skip(self), fields(patient_id = %patient_id, reason = ?reason))]
    pub fn discharge(
        &self,
        patient_id: &str,
        reason: DischargeReason,
    ) -> FlowResult<Patient> {
        let discharged = self.with_active_patient(patient_id, |patient| {
            self.vacate_bed(patient);
            state::transition(patient, PatientStatus::Discharged, Utc::now())?;
            patient.discharge_reason = Some(reason);
            Ok(patient.clone())
        })?;
        // Discharge is the only path that removes a record from storage.
        self.patients.remove(patient_id);
        info!("patient discharged and removed from the active set");
        Ok(discharged)
    }

    /// Expedited discharge for low-acuity patients: the discharge transition
    /// and bed release as one unit.
    #[instrument(skip(self), fields(patient_id = %patient_id))]
    pub fn fast_track_discharge(&self, patient_id: &str) -> FlowResult<Patient> {
        let discharged = self.with_active_patient(patient_id, |patient| {
            if patient.acuity_level < 4 {
                return Err(FlowError::IneligibleForFastTrack {
                    patient_id: patient.protocol_number.clone(),
                    acuity_level: patient.acuity_level,
                });
            }
            self.vacate_bed(patient);
            state::transition(patient, PatientStatus::Discharged, Utc::now())?;
            patient.discharge_reason = Some(DischargeReason::Routine);
            Ok(patient.clone())
        })?;
        self.patients.remove(patient_id);
        info!("fast-track discharge complete");
        Ok(discharged)
    }

    // ===== Queue & reporting =====

    /// Current snapshot of one record.
    pub fn patient(&self, patient_id: &str) -> FlowResult<Patient> {
        let record = self
            .patients
            .get(patient_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| FlowError::RecordNotFound(patient_id.to_string()))?;
        let patient = record.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(patient.clone())
    }

    /// The authoritative ordering of all non-terminal patients, freshly
    /// computed per query so repeated reads with no intervening mutation
    /// return the same total order.
    pub fn queue(&self) -> Vec<Patient> {
        let snapshot: Vec<Patient> = self
            .patients
            .iter()
            .filter_map(|entry| {
                let patient = entry.value().lock().unwrap_or_else(PoisonError::into_inner);
                (!patient.status.is_terminal()).then(|| patient.clone())
            })
            .collect();
        queue::ordered(snapshot)
    }

    /// On-demand census statistics over the current queue.
    pub fn stats(&self) -> QueueStats {
        queue::stats(&self.queue())
    }

    /// Bed dashboard snapshot for the display collaborator.
    pub fn beds(&self) -> Vec<Bed> {
        self.beds.snapshot()
    }

    pub fn bed(&self, bed_number: &str) -> FlowResult<Bed> {
        self.beds.get(bed_number)
    }

    pub fn active_alerts(&self) -> Vec<AlertActivation> {
        self.alerts.active()
    }

    pub fn alerts_for_patient(&self, patient_id: &str) -> Vec<AlertActivation> {
        self.alerts.for_patient(patient_id)
    }

    pub fn acknowledge_alert(
        &self,
        alert_id: Uuid,
        acknowledged_by: &str,
    ) -> FlowResult<AlertActivation> {
        self.alerts.acknowledge(alert_id, acknowledged_by)
    }

    // ===== Background refresh =====

    /// One wait-time sweep over the active records. A record that cannot be
    /// refreshed is skipped and logged; it never fails the others. Returns
    /// the number of records refreshed.
    pub fn refresh_wait_times(&self, now: DateTime<Utc>) -> usize {
        let mut refreshed = 0;
        for entry in self.patients.iter() {
            let mut patient = match entry.value().lock() {
                Ok(patient) => patient,
                Err(_) => {
                    warn!(patient_id = %entry.key(), "skipping wait refresh: record lock is unhealthy");
                    continue;
                }
            };
            if patient.status.is_terminal() {
                continue;
            }
            match queue::refreshed_wait_minutes(&patient, now) {
                Some(minutes) => {
                    patient.wait_time_minutes = minutes;
                    refreshed += 1;
                }
                None => {
                    warn!(
                        patient_id = %entry.key(),
                        "skipping wait refresh: arrival timestamp is ahead of the refresh instant"
                    );
                }
            }
        }
        *self
            .last_wait_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(now);
        debug!(refreshed, "wait-time refresh sweep complete");
        refreshed
    }

    /// Instant of the most recent completed sweep; a staleness indicator for
    /// dashboards.
    pub fn last_wait_refresh(&self) -> Option<DateTime<Utc>> {
        *self
            .last_wait_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the periodic wait-time refresh task. Ticks that land while a
    /// sweep is running are delayed, not stacked; a skipped or late tick is
    /// harmless because the sweep recomputes from arrival timestamps.
    pub fn spawn_wait_refresh(self: &Arc<Self>) -> WaitRefreshHandle {
        let engine = Arc::clone(self);
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let period = Duration::from_secs(self.config.wait_refresh_interval_secs);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        engine.refresh_wait_times(Utc::now());
                    }
                    _ = stop_rx.changed() => break,
                }
            }
        });

        WaitRefreshHandle {
            stop: stop_tx,
            task,
        }
    }
}

/// Cancellation handle for the periodic refresh task.
pub struct WaitRefreshHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WaitRefreshHandle {
    /// Graceful shutdown: stop issuing ticks and let an in-flight sweep
    /// finish before returning.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}
