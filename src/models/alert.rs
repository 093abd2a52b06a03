use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Time-critical protocol kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    Stemi,
    Stroke,
    /// Tiered trauma activation (1 = full team, 3 = limited).
    Trauma(u8),
}

/// A display/reporting time budget attached to an alert protocol. The engine
/// surfaces these; it never enforces them as hard deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeTarget {
    pub label: &'static str,
    pub minutes: i64,
}

impl AlertKind {
    /// Protocol-specific target-time budgets for display and reporting.
    pub fn time_targets(&self) -> Vec<TimeTarget> {
        match self {
            AlertKind::Stemi => vec![TimeTarget {
                label: "door-to-balloon",
                minutes: 90,
            }],
            AlertKind::Stroke => vec![
                TimeTarget {
                    label: "door-to-ct",
                    minutes: 25,
                },
                TimeTarget {
                    label: "door-to-needle",
                    minutes: 60,
                },
            ],
            AlertKind::Trauma(_) => vec![TimeTarget {
                label: "team-response",
                minutes: 15,
            }],
        }
    }

    /// Same protocol, ignoring the trauma tier. Idempotency is per protocol:
    /// a live trauma activation suppresses re-activation at any tier.
    pub fn same_protocol(&self, other: &AlertKind) -> bool {
        matches!(
            (self, other),
            (AlertKind::Stemi, AlertKind::Stemi)
                | (AlertKind::Stroke, AlertKind::Stroke)
                | (AlertKind::Trauma(_), AlertKind::Trauma(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertActivation {
    pub id: Uuid,
    pub patient_id: String,
    pub kind: AlertKind,
    pub activated_at: DateTime<Utc>,
    pub acknowledged: bool,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}
