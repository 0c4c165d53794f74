//! Threshold pairs for threshold-style metrics.

/// A pair of upper bounds for a two-component metric.
///
/// For blood pressure `first` is the systolic bound and `second` the
/// diastolic bound. Both bounds are strictly positive when set through the
/// dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThresholdPair {
    pub first: u32,
    pub second: u32,
}

impl ThresholdPair {
    pub const fn new(first: u32, second: u32) -> Self {
        Self { first, second }
    }

    /// Whether either value lies above its bound.
    ///
    /// Missing values never breach.
    pub fn is_breached_by(&self, first: Option<i64>, second: Option<i64>) -> bool {
        first.is_some_and(|v| v > i64::from(self.first))
            || second.is_some_and(|v| v > i64::from(self.second))
    }
}
