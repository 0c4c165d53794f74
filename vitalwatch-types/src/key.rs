//! Monitor keys - the identity of one tracked observation.

use core::fmt;
use core::str::FromStr;

use thiserror::Error;

use crate::MetricKind;

/// Identifies one patient's one metric.
///
/// Unique within a store. The textual form `code,patientId` is kept for
/// logging and for parsing user/config input.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MonitorKey {
    pub kind: MetricKind,
    pub patient_id: String,
}

impl MonitorKey {
    pub fn new(kind: MetricKind, patient_id: impl Into<String>) -> Self {
        Self {
            kind,
            patient_id: patient_id.into(),
        }
    }
}

impl fmt::Display for MonitorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.kind.code(), self.patient_id)
    }
}

/// Errors from parsing a textual monitor key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("monitor key must look like `code,patientId`: {0}")]
    Malformed(String),

    #[error("unknown observation code: {0}")]
    UnknownCode(String),

    #[error("monitor key has an empty patient id")]
    EmptyPatient,
}

impl FromStr for MonitorKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (code, patient) = s
            .split_once(',')
            .ok_or_else(|| KeyParseError::Malformed(s.to_string()))?;
        let kind = MetricKind::from_code(code.trim())
            .ok_or_else(|| KeyParseError::UnknownCode(code.trim().to_string()))?;
        let patient = patient.trim();
        if patient.is_empty() {
            return Err(KeyParseError::EmptyPatient);
        }
        Ok(MonitorKey::new(kind, patient))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_code_and_patient() {
        let key = MonitorKey::new(MetricKind::Cholesterol, "123");
        assert_eq!(key.to_string(), "2093-3,123");
    }

    #[test]
    fn parse_textual_key() {
        let key: MonitorKey = "55284-4,abc".parse().unwrap();
        assert_eq!(key.kind, MetricKind::BloodPressure);
        assert_eq!(key.patient_id, "abc");
    }

    #[test]
    fn parse_rejects_bad_keys() {
        assert_eq!(
            "2093-3".parse::<MonitorKey>(),
            Err(KeyParseError::Malformed("2093-3".to_string()))
        );
        assert_eq!(
            "1-1,123".parse::<MonitorKey>(),
            Err(KeyParseError::UnknownCode("1-1".to_string()))
        );
        assert_eq!(
            "2093-3, ".parse::<MonitorKey>(),
            Err(KeyParseError::EmptyPatient)
        );
    }

    #[test]
    fn keys_of_different_kinds_are_distinct() {
        let a = MonitorKey::new(MetricKind::Cholesterol, "1");
        let b = MonitorKey::new(MetricKind::BloodPressure, "1");
        assert_ne!(a, b);
    }
}
