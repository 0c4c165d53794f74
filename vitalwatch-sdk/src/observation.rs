//! Observation entities and their change notification.
//!
//! An [`Observation`] is one patient's one metric: the latest value and unit
//! of each component plus the time of the reading. It owns a [`Notifier`]
//! holding the [`Listener`]s interested in it. Notification carries no
//! payload; listeners read the current state from the observation they are
//! handed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use vitalwatch_types::{Component, MetricKind, MonitorKey};

/// Receives "updated" signals from observations.
pub trait Listener: Send + Sync {
    /// Called after `observation` has been refreshed.
    fn on_changed(&self, observation: &Observation);
}

/// Function-based listener for simple cases.
pub struct FnListener<F: Fn(&Observation) + Send + Sync>(pub F);

impl<F: Fn(&Observation) + Send + Sync> Listener for FnListener<F> {
    fn on_changed(&self, observation: &Observation) {
        (self.0)(observation);
    }
}

/// A set of listeners attached to one observation.
///
/// Attaching the same listener handle twice has no effect. Delivery order is
/// unspecified.
#[derive(Default)]
pub struct Notifier {
    listeners: RwLock<Vec<Arc<dyn Listener>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener. Returns `false` if it was already attached.
    pub fn attach(&self, listener: Arc<dyn Listener>) -> bool {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Detach a listener. Returns `false` if it was not attached.
    pub fn detach(&self, listener: &Arc<dyn Listener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Deliver an update for `subject` to every listener.
    ///
    /// The listener list is copied first so callbacks run without the lock
    /// held and may attach further listeners.
    pub fn notify_all(&self, subject: &Observation) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_changed(subject);
        }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.len())
            .finish()
    }
}

// Compare data pointers only; vtable pointers for the same type may differ
// between codegen units.
fn same_listener(a: &Arc<dyn Listener>, b: &Arc<dyn Listener>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// A raw value that could not be turned into a number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {component} reading: {raw:?}")]
pub struct InvalidReading {
    pub component: Component,
    pub raw: String,
}

/// Point-in-time copy of an observation's measurement fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Measurement {
    pub values: BTreeMap<Component, i64>,
    pub units: BTreeMap<Component, String>,
    pub time: Option<String>,
}

/// One patient's one metric.
///
/// Identity and names are fixed at creation. Measurement fields are written
/// only by the monitor task for the observation's metric kind.
pub struct Observation {
    key: MonitorKey,
    given_name: String,
    family_name: String,
    measurement: RwLock<Measurement>,
    notifier: Notifier,
}

impl Observation {
    pub fn new(
        key: MonitorKey,
        given_name: impl Into<String>,
        family_name: impl Into<String>,
    ) -> Self {
        Self {
            key,
            given_name: given_name.into(),
            family_name: family_name.into(),
            measurement: RwLock::new(Measurement::default()),
            notifier: Notifier::new(),
        }
    }

    pub fn key(&self) -> &MonitorKey {
        &self.key
    }

    pub fn kind(&self) -> MetricKind {
        self.key.kind
    }

    pub fn patient_id(&self) -> &str {
        &self.key.patient_id
    }

    pub fn given_name(&self) -> &str {
        &self.given_name
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
            .trim()
            .to_string()
    }

    /// Parse `raw` as a real number, round it to the nearest integer (half
    /// away from zero) and store it for `component`.
    ///
    /// Malformed input leaves the previous value untouched.
    pub fn set_value(&self, component: Component, raw: &str) -> Result<i64, InvalidReading> {
        let value = parse_rounded(raw).ok_or_else(|| InvalidReading {
            component,
            raw: raw.to_string(),
        })?;
        self.measurement.write().values.insert(component, value);
        Ok(value)
    }

    pub fn set_unit(&self, component: Component, unit: impl Into<String>) {
        self.measurement.write().units.insert(component, unit.into());
    }

    /// Store the reading time, normalised by [`normalize_time`].
    pub fn set_time(&self, raw: &str) {
        self.measurement.write().time = Some(normalize_time(raw));
    }

    pub fn value(&self, component: Component) -> Option<i64> {
        self.measurement.read().values.get(&component).copied()
    }

    pub fn unit(&self, component: Component) -> Option<String> {
        self.measurement.read().units.get(&component).cloned()
    }

    pub fn time(&self) -> Option<String> {
        self.measurement.read().time.clone()
    }

    /// Copy of all measurement fields, taken under one lock.
    pub fn measurement(&self) -> Measurement {
        self.measurement.read().clone()
    }

    /// Attach a listener. Attaching the same handle twice is a no-op.
    pub fn attach(&self, listener: Arc<dyn Listener>) -> bool {
        self.notifier.attach(listener)
    }

    pub fn detach(&self, listener: &Arc<dyn Listener>) -> bool {
        self.notifier.detach(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.notifier.len()
    }

    /// Signal every attached listener that this observation changed.
    pub fn notify_all(&self) {
        self.notifier.notify_all(self);
    }
}

impl fmt::Debug for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observation")
            .field("key", &self.key)
            .field("given_name", &self.given_name)
            .field("family_name", &self.family_name)
            .field("measurement", &*self.measurement.read())
            .field("notifier", &self.notifier)
            .finish()
    }
}

fn parse_rounded(raw: &str) -> Option<i64> {
    let parsed: f64 = raw.trim().parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    let rounded = parsed.round();
    if rounded < i64::MIN as f64 || rounded > i64::MAX as f64 {
        return None;
    }
    Some(rounded as i64)
}

/// Normalise a source timestamp for display.
///
/// The date/time separator becomes a space and any timezone suffix (`Z` or
/// a `+hh:mm`/`-hh:mm` offset) is dropped:
/// `2021-01-01T10:00:00+10:00` becomes `2021-01-01 10:00:00`.
pub fn normalize_time(raw: &str) -> String {
    let raw = raw.trim();
    let Some((date, time)) = raw.split_once(['T', ' ']) else {
        return raw.to_string();
    };
    let end = time
        .find(|c: char| matches!(c, '+' | '-' | 'Z'))
        .unwrap_or(time.len());
    format!("{} {}", date, &time[..end])
}
