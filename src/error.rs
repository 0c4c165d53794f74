//! Error types for dashboard actions.

use thiserror::Error;
use vitalwatch_sdk::{SourceError, TaskError};
use vitalwatch_types::{MetricKind, MonitorKey};

use crate::config::SettingsError;
use crate::input::InputError;

/// Errors surfaced to the user by dashboard actions.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// No practitioner matches the identifier.
    #[error("no practitioner found with identifier {0}")]
    UnknownPractitioner(String),

    /// The patient is not on the loaded roster.
    #[error("patient {0} is not on the roster")]
    UnknownPatient(String),

    /// The source holds no reading of this metric for the patient.
    #[error("no {kind} readings recorded for patient {patient_id}")]
    MetricAbsentForPatient {
        kind: MetricKind,
        patient_id: String,
    },

    #[error("{0} is not tracked")]
    NotTracked(MonitorKey),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Task(#[from] TaskError),
}
