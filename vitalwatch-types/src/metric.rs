//! Metric kinds and their components.

use core::fmt;
use core::str::FromStr;

use thiserror::Error;

/// A category of biometric that can be tracked for a patient.
///
/// Each kind is identified on the measurement source by a stable
/// observation code (LOINC) and on the dashboard by a short name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MetricKind {
    /// Total cholesterol, a single scalar reading averaged across patients.
    Cholesterol,
    /// Blood pressure, a composite reading checked against thresholds.
    BloodPressure,
}

impl MetricKind {
    /// Every supported kind, in display order.
    pub const ALL: [MetricKind; 2] = [MetricKind::Cholesterol, MetricKind::BloodPressure];

    /// Observation code used when querying the measurement source.
    pub const fn code(&self) -> &'static str {
        match self {
            MetricKind::Cholesterol => "2093-3",
            MetricKind::BloodPressure => "55284-4",
        }
    }

    /// Short upper-case name used for display.
    pub const fn name(&self) -> &'static str {
        match self {
            MetricKind::Cholesterol => "CHOLESTEROL",
            MetricKind::BloodPressure => "BLOOD",
        }
    }

    /// Look up a kind from its observation code.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Components held by an observation of this kind.
    pub const fn components(&self) -> &'static [Component] {
        match self {
            MetricKind::Cholesterol => &[Component::Cholesterol],
            MetricKind::BloodPressure => &[Component::Systolic, Component::Diastolic],
        }
    }

    /// The synthetic component used by single-value kinds.
    ///
    /// Returns `None` for composite kinds.
    pub const fn scalar_component(&self) -> Option<Component> {
        match self {
            MetricKind::Cholesterol => Some(Component::Cholesterol),
            MetricKind::BloodPressure => None,
        }
    }

    /// Whether readings of this kind arrive as named sub-components.
    pub const fn is_composite(&self) -> bool {
        self.scalar_component().is_none()
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a metric kind cannot be recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown metric kind: {0}")]
pub struct UnknownMetric(pub String);

impl FromStr for MetricKind {
    type Err = UnknownMetric;

    /// Accepts the display name, the observation code, or a lowercase alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(kind) = Self::from_code(trimmed) {
            return Ok(kind);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "cholesterol" | "chol" => Ok(MetricKind::Cholesterol),
            "blood" | "blood_pressure" | "blood-pressure" | "bp" => Ok(MetricKind::BloodPressure),
            _ => Err(UnknownMetric(trimmed.to_string())),
        }
    }
}

/// A named sub-reading within a metric kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Component {
    Cholesterol,
    Systolic,
    Diastolic,
}

impl Component {
    /// Canonical component key.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Component::Cholesterol => "CHOLESTEROL",
            Component::Systolic => "SYSTOLIC",
            Component::Diastolic => "DIASTOLIC",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CHOLESTEROL" => Ok(Component::Cholesterol),
            "SYSTOLIC" => Ok(Component::Systolic),
            "DIASTOLIC" => Ok(Component::Diastolic),
            _ => Err(UnknownMetric(s.trim().to_string())),
        }
    }
}
