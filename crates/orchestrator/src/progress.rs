use schemaforge_core::Session;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Progress {
    pub percent: u8,
    /// Title of the first phase not yet completed.
    pub current_phase_label: Option<String>,
}

pub struct ProgressAggregator;

impl ProgressAggregator {
    pub fn aggregate(session: Option<&Session>) -> Progress {
        let Some(session) = session else {
            return Progress::default();
        };

        let total = session.phases.len();
        let completed = session
            .phases
            .iter()
            .filter(|p| session.completed_phases.contains(p))
            .count();

        let percent = if total == 0 {
            0
        } else {
            (100.0 * completed as f64 / total as f64).round() as u8
        };

        Progress {
            percent,
            current_phase_label: session.pending_phases().next().map(|p| p.title().to_string()),
        }
    }
}
