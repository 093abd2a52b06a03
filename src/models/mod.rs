//! Value objects exchanged across the engine boundary.
//!
//! Everything here is a serializable snapshot; no lock guards or registry
//! internals leak to collaborators.

pub mod alert;
pub mod bed;
pub mod patient;

pub use alert::{AlertActivation, AlertKind, TimeTarget};
pub use bed::{Bed, BedStatus};
pub use patient::{ArrivalMethod, DischargeReason, Patient, PatientStatus, VitalSigns};
