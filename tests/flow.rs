//! End-to-end exercises of the flow engine through its public façade, the
//! way the registration, clinical UI, and paging collaborators drive it.

use std::sync::Arc;
use std::thread;

use edflow::config::EngineConfig;
use edflow::models::{AlertKind, ArrivalMethod, BedStatus, PatientStatus, VitalSigns};
use edflow::{FlowEngine, FlowError, Registration, TriageDecision};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();
}

fn engine() -> Arc<FlowEngine> {
    init_tracing();
    Arc::new(FlowEngine::new(EngineConfig::default()).expect("default config is valid"))
}

fn registration(protocol: &str, mrn: &str, complaint: &str) -> Registration {
    Registration {
        protocol_number: protocol.into(),
        mrn: mrn.into(),
        first_name: "Casey".into(),
        last_name: "Nguyen".into(),
        age: 58,
        sex: "M".into(),
        arrival_method: ArrivalMethod::Ems,
        chief_complaint: complaint.into(),
    }
}

fn triage(level: u8, rank: u32) -> TriageDecision {
    TriageDecision {
        acuity_level: level,
        priority_rank: rank,
        trauma_activation_level: None,
    }
}

fn snapshot(heart_rate: f32, pain: Option<u8>) -> VitalSigns {
    VitalSigns {
        heart_rate,
        blood_pressure_systolic: 120.0,
        blood_pressure_diastolic: 78.0,
        temperature: 98.4,
        oxygen_saturation: 97.0,
        respiratory_rate: 15.0,
        glasgow_coma_scale: 15,
        pain_scale: pain,
    }
}

#[test]
fn stemi_arrival_front_to_back() {
    let engine = engine();
    engine.add_bed("ED-01").expect("unique bed");

    engine
        .register_patient(registration(
            "V-100",
            "MRN-100",
            "crushing chest pain, ST elevation per medic ECG",
        ))
        .expect("valid registration");

    // Clinician triages to level 1; rank 5 sits inside [1,20].
    let triaged = engine
        .assign_triage("V-100", triage(1, 5))
        .expect("in-band rank");
    assert_eq!(triaged.acuity_level, 1);
    assert_eq!(triaged.priority_rank, 5);
    assert!(triaged.stemi_alert);

    // Exactly one STEMI activation despite two scans (registration + triage).
    let activations = engine.alerts_for_patient("V-100");
    assert_eq!(activations.len(), 1);
    assert_eq!(activations[0].kind, AlertKind::Stemi);
    let targets = activations[0].kind.time_targets();
    assert_eq!((targets[0].label, targets[0].minutes), ("door-to-balloon", 90));

    engine.assign_bed("V-100", "ED-01").expect("available bed");
    engine
        .transition_status("V-100", PatientStatus::Roomed)
        .expect("triage -> roomed");
    engine
        .transition_status("V-100", PatientStatus::ProviderEval)
        .expect("roomed -> provider-eval");
    assert!(engine
        .patient("V-100")
        .expect("active")
        .door_to_doctor_minutes
        .is_some());

    // Out-of-band re-triage is rejected and changes nothing.
    assert!(matches!(
        engine.assign_triage("V-100", triage(1, 500)),
        Err(FlowError::OutOfBandPriority { .. })
    ));
    assert_eq!(engine.patient("V-100").expect("active").priority_rank, 5);
}

#[test]
fn bed_exclusivity_and_housekeeping_turnaround() {
    let engine = engine();
    engine.add_bed("ED-A").expect("unique bed");
    engine.add_bed("ED-B").expect("unique bed");

    engine
        .register_patient(registration("V-1", "M1", "abdominal pain"))
        .expect("valid registration");
    engine
        .register_patient(registration("V-2", "M2", "wrist injury"))
        .expect("valid registration");

    engine.assign_bed("V-1", "ED-A").expect("available");

    // Occupied bed refuses a second occupant.
    assert!(matches!(
        engine.assign_bed("V-2", "ED-A"),
        Err(FlowError::BedNotAvailable(_))
    ));
    let bed_b = engine.assign_bed("V-2", "ED-B").expect("available");
    assert_eq!(bed_b.status, BedStatus::Occupied);

    // Release lands on cleaning, never straight back to available.
    let released = engine.release_bed("ED-A").expect("occupied");
    assert_eq!(released.status, BedStatus::Cleaning);
    assert!(matches!(
        engine.assign_bed("V-1", "ED-A"),
        Err(FlowError::BedNotAvailable(_))
    ));

    engine.mark_bed_available("ED-A").expect("cleaning");
    engine.assign_bed("V-1", "ED-A").expect("turned around");

    // Every bed in the dashboard satisfies the occupancy invariant.
    for bed in engine.beds() {
        assert!(bed.occupancy_consistent(), "bed {} is torn", bed.bed_number);
    }
}

#[test]
fn fast_track_is_gated_on_acuity() {
    let engine = engine();
    engine.add_bed("ED-01").expect("unique bed");

    engine
        .register_patient(registration("V-9", "M9", "small laceration"))
        .expect("valid registration");
    engine.assign_bed("V-9", "ED-01").expect("available");

    // Default acuity 3: rejected, record and bed untouched.
    assert!(matches!(
        engine.fast_track_discharge("V-9"),
        Err(FlowError::IneligibleForFastTrack { .. })
    ));
    assert_eq!(
        engine.bed("ED-01").expect("configured").status,
        BedStatus::Occupied
    );

    engine
        .assign_triage("V-9", triage(4, 180))
        .expect("in-band");
    let discharged = engine
        .fast_track_discharge("V-9")
        .expect("acuity 4 is eligible");
    assert_eq!(discharged.status, PatientStatus::Discharged);

    // One unit: transition applied and bed released to cleaning.
    assert_eq!(
        engine.bed("ED-01").expect("configured").status,
        BedStatus::Cleaning
    );
    assert!(matches!(
        engine.patient("V-9"),
        Err(FlowError::RecordNotFound(_))
    ));
}

#[test]
fn queue_reads_are_idempotent_and_band_consistent() {
    let engine = engine();
    let cases = [
        ("V-1", "M1", 2, 30),
        ("V-2", "M2", 1, 4),
        ("V-3", "M3", 4, 300),
        ("V-4", "M4", 2, 30),
    ];
    for (protocol, mrn, level, rank) in cases {
        engine
            .register_patient(registration(protocol, mrn, "complaint"))
            .expect("valid registration");
        engine
            .assign_triage(protocol, triage(level, rank))
            .expect("in-band");
    }

    let first: Vec<String> = engine
        .queue()
        .into_iter()
        .map(|p| p.protocol_number)
        .collect();
    let second: Vec<String> = engine
        .queue()
        .into_iter()
        .map(|p| p.protocol_number)
        .collect();
    assert_eq!(first, second, "repeated reads must agree");
    assert_eq!(first[0], "V-2", "level 1 outranks everything");

    // Equal (level, rank) pairs fall back to arrival order: V-1 registered
    // before V-4.
    let v1_pos = first.iter().position(|p| p == "V-1").expect("queued");
    let v4_pos = first.iter().position(|p| p == "V-4").expect("queued");
    assert!(v1_pos < v4_pos);

    // Band consistency holds for every queued record.
    for patient in engine.queue() {
        edflow::triage::validate_band(patient.acuity_level, patient.priority_rank)
            .expect("every active record stays band-consistent");
    }
}

#[test]
fn vitals_reads_never_observe_a_torn_snapshot() {
    let engine = engine();
    engine
        .register_patient(registration("V-1", "M1", "palpitations"))
        .expect("valid registration");

    // Two internally consistent snapshots; every field differs between them.
    let a = VitalSigns {
        heart_rate: 111.0,
        blood_pressure_systolic: 111.0,
        blood_pressure_diastolic: 71.0,
        temperature: 99.1,
        oxygen_saturation: 96.1,
        respiratory_rate: 21.0,
        glasgow_coma_scale: 15,
        pain_scale: Some(1),
    };
    let b = VitalSigns {
        heart_rate: 52.0,
        blood_pressure_systolic: 92.0,
        blood_pressure_diastolic: 52.0,
        temperature: 97.2,
        oxygen_saturation: 99.0,
        respiratory_rate: 12.0,
        glasgow_coma_scale: 14,
        pain_scale: Some(8),
    };

    let writer = {
        let engine = Arc::clone(&engine);
        let (a, b) = (a.clone(), b.clone());
        thread::spawn(move || {
            for i in 0..500 {
                let snapshot = if i % 2 == 0 { a.clone() } else { b.clone() };
                engine
                    .update_vitals("V-1", snapshot)
                    .expect("record stays active");
            }
        })
    };

    let ticker = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for _ in 0..500 {
                engine.refresh_wait_times(chrono::Utc::now());
            }
        })
    };

    for _ in 0..500 {
        if let Some(seen) = engine.patient("V-1").expect("active").vital_signs {
            assert!(
                seen == a || seen == b,
                "observed a snapshot mixing fields from two writes: {seen:?}"
            );
        }
    }

    writer.join().expect("writer finished cleanly");
    ticker.join().expect("ticker finished cleanly");
}

#[test]
fn boundary_objects_serialize_with_stable_wire_names() {
    let engine = engine();
    let patient = engine
        .register_patient(registration("V-1", "M1", "syncope"))
        .expect("valid registration");

    let json = serde_json::to_value(&patient).expect("serializable");
    assert_eq!(json["status"], "triage");
    assert_eq!(json["arrival_method"], "ems");

    engine.add_bed("ED-01").expect("unique bed");
    engine.assign_bed("V-1", "ED-01").expect("available");
    let bed = engine.bed("ED-01").expect("configured");
    let bed_json = serde_json::to_value(&bed).expect("serializable");
    assert_eq!(bed_json["status"], "occupied");
}

#[tokio::test]
async fn background_refresh_runs_alongside_foreground_operations() {
    let config = EngineConfig {
        wait_refresh_interval_secs: 1,
        ..EngineConfig::default()
    };
    init_tracing();
    let engine = Arc::new(FlowEngine::new(config).expect("valid config"));
    let handle = engine.spawn_wait_refresh();

    engine
        .register_patient(registration("V-1", "M1", "chest tightness"))
        .expect("valid registration");
    engine
        .update_vitals("V-1", snapshot(95.0, Some(4)))
        .expect("active record");

    for _ in 0..50 {
        if engine.last_wait_refresh().is_some() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(engine.last_wait_refresh().is_some(), "task never ticked");

    // Graceful shutdown: in-flight sweep finishes, no further ticks.
    handle.stop().await;
    engine
        .discharge("V-1", edflow::models::DischargeReason::Routine)
        .expect("active record");
    assert!(engine.queue().is_empty());
}
