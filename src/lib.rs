//! Emergency department patient flow core library
//!
//! This module exports the patient flow and resource allocation engine:
//! acuity-based prioritization, the care-pathway state machine, bed
//! exclusivity, and time-critical clinical alerts. Registration intake,
//! notification paging, persistence, and display are external collaborators
//! that drive the [`engine::FlowEngine`] façade.

pub mod alerts;
pub mod beds;
pub mod engine;
pub mod error;
pub mod models;
pub mod queue;
pub mod state;
pub mod triage;
pub mod vitals;

pub use engine::{FlowEngine, Registration, TriageDecision, WaitRefreshHandle};
pub use error::{FlowError, FlowResult};

/// Engine configuration
pub mod config {
    use serde::Deserialize;

    #[derive(Debug, Clone, Deserialize)]
    #[serde(default)]
    pub struct EngineConfig {
        /// Seconds between background wait-time refreshes.
        pub wait_refresh_interval_secs: u64,
        /// Acuity level stamped at registration, pending formal triage.
        pub default_acuity_level: u8,
        /// Priority rank stamped at registration. Must sit inside the band
        /// for `default_acuity_level`; checked at engine construction.
        pub default_priority_rank: u32,
    }

    impl Default for EngineConfig {
        fn default() -> Self {
            Self {
                wait_refresh_interval_secs: 60,
                default_acuity_level: 3,
                default_priority_rank: 120,
            }
        }
    }

    /// Load configuration from file and environment
    pub fn load_config() -> Result<EngineConfig, ::config::ConfigError> {
        let settings = ::config::Config::builder()
            // Start with default settings, if a config file is present
            .add_source(::config::File::with_name("config/default").required(false))
            // Override with environment variables
            .add_source(::config::Environment::with_prefix("EDFLOW"))
            .build()?;

        settings.try_deserialize()
    }

}
