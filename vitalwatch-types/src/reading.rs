//! Readings as returned by a measurement source.

/// A value and its unit, exactly as the source reported them.
///
/// The value is kept as text; conversion to a number happens when it is
/// merged into an observation, where malformed values are handled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quantity {
    pub value: String,
    pub unit: String,
}

impl Quantity {
    pub fn new(value: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            unit: unit.into(),
        }
    }
}

/// One named sub-reading of a composite measurement.
///
/// `label` is the source's human-readable component name, e.g.
/// "Systolic Blood Pressure".
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComponentReading {
    pub label: String,
    pub quantity: Quantity,
}

impl ComponentReading {
    pub fn new(label: impl Into<String>, quantity: Quantity) -> Self {
        Self {
            label: label.into(),
            quantity,
        }
    }
}

/// A single measurement taken at one point in time.
///
/// Scalar metrics fill `value`; composite metrics fill `components`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    /// Timestamp as reported, including any timezone suffix.
    pub time: String,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub value: Option<Quantity>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub components: Vec<ComponentReading>,
}

impl Reading {
    /// Create a scalar reading.
    pub fn scalar(time: impl Into<String>, quantity: Quantity) -> Self {
        Self {
            time: time.into(),
            value: Some(quantity),
            components: Vec::new(),
        }
    }

    /// Create a composite reading.
    pub fn composite(time: impl Into<String>, components: Vec<ComponentReading>) -> Self {
        Self {
            time: time.into(),
            value: None,
            components,
        }
    }
}

/// The result of a "latest measurements" query.
///
/// `total` is the number of matching measurements the source holds, which
/// can exceed `readings.len()` when the query was limited.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadingBundle {
    pub total: u64,
    pub readings: Vec<Reading>,
}

impl ReadingBundle {
    pub fn new(total: u64, readings: Vec<Reading>) -> Self {
        Self { total, readings }
    }

    /// Whether the source holds no measurement at all.
    pub fn is_empty(&self) -> bool {
        self.total == 0 && self.readings.is_empty()
    }

    /// The most recent reading (sources return newest first).
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_is_first_reading() {
        let bundle = ReadingBundle::new(
            7,
            vec![
                Reading::scalar("2021-02-01T10:00:00+10:00", Quantity::new("210", "mg/dL")),
                Reading::scalar("2021-01-01T10:00:00+10:00", Quantity::new("200", "mg/dL")),
            ],
        );
        assert!(!bundle.is_empty());
        assert_eq!(
            bundle.latest().and_then(|r| r.value.as_ref()).map(|q| q.value.as_str()),
            Some("210")
        );
    }

    #[test]
    fn empty_bundle() {
        let bundle = ReadingBundle::default();
        assert!(bundle.is_empty());
        assert!(bundle.latest().is_none());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn scalar_reading_omits_components_when_serialized() {
        let reading = Reading::scalar("t", Quantity::new("1", "u"));
        let json = serde_json::to_string(&reading).unwrap();
        assert!(!json.contains("components"));
    }
}
