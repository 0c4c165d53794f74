//! Presentation contract.
//!
//! The engine pushes readings and aggregate statistics to a [`Presenter`]
//! and never reads anything back. Pushes are fire-and-forget: an
//! implementation that cannot deliver drops the update.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use vitalwatch_types::{Component, MetricKind, MonitorKey, ThresholdPair};

use crate::observation::{Listener, Observation};

/// Latest state of a single-value observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScalarReading {
    pub kind: MetricKind,
    pub patient_id: String,
    pub patient_name: String,
    pub value: Option<i64>,
    pub unit: Option<String>,
    pub time: Option<String>,
}

/// Value and unit of one component of a composite observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComponentValue {
    pub value: Option<i64>,
    pub unit: Option<String>,
}

/// Latest state of a composite observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositeReading {
    pub kind: MetricKind,
    pub patient_id: String,
    pub patient_name: String,
    pub components: BTreeMap<Component, ComponentValue>,
    pub time: Option<String>,
}

impl CompositeReading {
    pub fn value(&self, component: Component) -> Option<i64> {
        self.components.get(&component).and_then(|c| c.value)
    }
}

impl ScalarReading {
    /// Read the current state of a single-value observation.
    pub fn from_observation(observation: &Observation) -> Self {
        let measurement = observation.measurement();
        let component = observation.kind().scalar_component();
        Self {
            kind: observation.kind(),
            patient_id: observation.patient_id().to_string(),
            patient_name: observation.full_name(),
            value: component.and_then(|c| measurement.values.get(&c).copied()),
            unit: component.and_then(|c| measurement.units.get(&c).cloned()),
            time: measurement.time,
        }
    }
}

impl CompositeReading {
    /// Read the current state of a composite observation.
    pub fn from_observation(observation: &Observation) -> Self {
        let measurement = observation.measurement();
        let components = observation
            .kind()
            .components()
            .iter()
            .map(|component| {
                (
                    *component,
                    ComponentValue {
                        value: measurement.values.get(component).copied(),
                        unit: measurement.units.get(component).cloned(),
                    },
                )
            })
            .collect();
        Self {
            kind: observation.kind(),
            patient_id: observation.patient_id().to_string(),
            patient_name: observation.full_name(),
            components,
            time: measurement.time,
        }
    }
}

/// One patient's current value within a kind, as plotted on a chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub patient_id: String,
    pub patient_name: String,
    pub value: Option<i64>,
}

impl SeriesPoint {
    pub fn from_observation(observation: &Observation) -> Self {
        Self {
            patient_id: observation.patient_id().to_string(),
            patient_name: observation.full_name(),
            value: observation
                .kind()
                .scalar_component()
                .and_then(|c| observation.value(c)),
        }
    }
}

/// Receives pushed updates from the engine.
pub trait Presenter: Send + Sync {
    fn push_scalar_reading(&self, reading: &ScalarReading);

    fn push_composite_reading(&self, reading: &CompositeReading);

    /// `average` is `None` when no observation of `kind` holds a value.
    fn push_average(&self, kind: MetricKind, average: Option<i64>);

    fn push_thresholds(&self, kind: MetricKind, thresholds: ThresholdPair);

    /// Current value of every tracked observation of `kind`, in key order.
    fn push_series(&self, _kind: MetricKind, _points: &[SeriesPoint]) {}

    /// The first observation of `kind` started being tracked.
    fn on_first_monitor_added(&self, _kind: MetricKind) {}

    /// The last observation of `kind` stopped being tracked.
    fn on_last_monitor_removed(&self, _kind: MetricKind) {}

    /// `key` stopped being tracked. Called before
    /// [`on_last_monitor_removed`](Self::on_last_monitor_removed).
    fn on_monitor_removed(&self, _key: &MonitorKey) {}
}

/// Every push, as a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DashboardEvent {
    ScalarReading(ScalarReading),
    CompositeReading(CompositeReading),
    Average {
        kind: MetricKind,
        value: Option<i64>,
    },
    Thresholds {
        kind: MetricKind,
        thresholds: ThresholdPair,
    },
    Series {
        kind: MetricKind,
        points: Vec<SeriesPoint>,
    },
    FirstMonitorAdded {
        kind: MetricKind,
    },
    LastMonitorRemoved {
        kind: MetricKind,
    },
    MonitorRemoved {
        key: MonitorKey,
    },
}

/// Forwards every push as a [`DashboardEvent`] through a channel.
///
/// # Example
///
/// ```rust
/// use vitalwatch_sdk::{ChannelPresenter, DashboardEvent, Presenter};
/// use vitalwatch_types::MetricKind;
///
/// let (presenter, mut rx) = ChannelPresenter::new();
/// presenter.push_average(MetricKind::Cholesterol, Some(200));
///
/// assert_eq!(
///     rx.try_recv().unwrap(),
///     DashboardEvent::Average { kind: MetricKind::Cholesterol, value: Some(200) }
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ChannelPresenter {
    tx: mpsc::UnboundedSender<DashboardEvent>,
}

impl ChannelPresenter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DashboardEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: DashboardEvent) {
        // Receiver gone means nobody is watching
        let _ = self.tx.send(event);
    }
}

impl Presenter for ChannelPresenter {
    fn push_scalar_reading(&self, reading: &ScalarReading) {
        self.send(DashboardEvent::ScalarReading(reading.clone()));
    }

    fn push_composite_reading(&self, reading: &CompositeReading) {
        self.send(DashboardEvent::CompositeReading(reading.clone()));
    }

    fn push_average(&self, kind: MetricKind, average: Option<i64>) {
        self.send(DashboardEvent::Average {
            kind,
            value: average,
        });
    }

    fn push_thresholds(&self, kind: MetricKind, thresholds: ThresholdPair) {
        self.send(DashboardEvent::Thresholds { kind, thresholds });
    }

    fn on_first_monitor_added(&self, kind: MetricKind) {
        self.send(DashboardEvent::FirstMonitorAdded { kind });
    }

    fn push_series(&self, kind: MetricKind, points: &[SeriesPoint]) {
        self.send(DashboardEvent::Series {
            kind,
            points: points.to_vec(),
        });
    }

    fn on_last_monitor_removed(&self, kind: MetricKind) {
        self.send(DashboardEvent::LastMonitorRemoved { kind });
    }

    fn on_monitor_removed(&self, key: &MonitorKey) {
        self.send(DashboardEvent::MonitorRemoved { key: key.clone() });
    }
}

/// Logs every push at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn push_scalar_reading(&self, reading: &ScalarReading) {
        tracing::info!(
            kind = %reading.kind,
            patient = %reading.patient_id,
            value = ?reading.value,
            unit = reading.unit.as_deref().unwrap_or(""),
            time = reading.time.as_deref().unwrap_or(""),
            "reading"
        );
    }

    fn push_composite_reading(&self, reading: &CompositeReading) {
        tracing::info!(
            kind = %reading.kind,
            patient = %reading.patient_id,
            components = ?reading.components,
            time = reading.time.as_deref().unwrap_or(""),
            "reading"
        );
    }

    fn push_average(&self, kind: MetricKind, average: Option<i64>) {
        tracing::info!(kind = %kind, average = ?average, "average");
    }

    fn push_thresholds(&self, kind: MetricKind, thresholds: ThresholdPair) {
        tracing::info!(
            kind = %kind,
            first = thresholds.first,
            second = thresholds.second,
            "thresholds"
        );
    }

    fn on_first_monitor_added(&self, kind: MetricKind) {
        tracing::info!(kind = %kind, "first monitor added");
    }

    fn push_series(&self, kind: MetricKind, points: &[SeriesPoint]) {
        let values: Vec<Option<i64>> = points.iter().map(|p| p.value).collect();
        tracing::info!(kind = %kind, values = ?values, "series");
    }

    fn on_last_monitor_removed(&self, kind: MetricKind) {
        tracing::info!(kind = %kind, "last monitor removed");
    }

    fn on_monitor_removed(&self, key: &MonitorKey) {
        tracing::info!(key = %key, "monitor removed");
    }
}

/// Writes every push as one line of JSON.
pub struct JsonLinesPresenter<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn write(&self, event: DashboardEvent) {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize dashboard event");
                return;
            }
        };
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            tracing::warn!(error = %e, "failed to write dashboard event");
        }
    }
}

impl<W: Write + Send> Presenter for JsonLinesPresenter<W> {
    fn push_scalar_reading(&self, reading: &ScalarReading) {
        self.write(DashboardEvent::ScalarReading(reading.clone()));
    }

    fn push_composite_reading(&self, reading: &CompositeReading) {
        self.write(DashboardEvent::CompositeReading(reading.clone()));
    }

    fn push_average(&self, kind: MetricKind, average: Option<i64>) {
        self.write(DashboardEvent::Average {
            kind,
            value: average,
        });
    }

    fn push_thresholds(&self, kind: MetricKind, thresholds: ThresholdPair) {
        self.write(DashboardEvent::Thresholds { kind, thresholds });
    }

    fn on_first_monitor_added(&self, kind: MetricKind) {
        self.write(DashboardEvent::FirstMonitorAdded { kind });
    }

    fn push_series(&self, kind: MetricKind, points: &[SeriesPoint]) {
        self.write(DashboardEvent::Series {
            kind,
            points: points.to_vec(),
        });
    }

    fn on_last_monitor_removed(&self, kind: MetricKind) {
        self.write(DashboardEvent::LastMonitorRemoved { kind });
    }

    fn on_monitor_removed(&self, key: &MonitorKey) {
        self.write(DashboardEvent::MonitorRemoved { key: key.clone() });
    }
}

/// Listener that pushes an observation's state to a presenter whenever it
/// changes.
///
/// One monitor can be attached to many observations; it picks the scalar or
/// composite push from the observation's kind.
pub struct ReadingMonitor {
    presenter: Arc<dyn Presenter>,
}

impl ReadingMonitor {
    pub fn new(presenter: Arc<dyn Presenter>) -> Self {
        Self { presenter }
    }
}

impl Listener for ReadingMonitor {
    fn on_changed(&self, observation: &Observation) {
        if observation.kind().is_composite() {
            self.presenter
                .push_composite_reading(&CompositeReading::from_observation(observation));
        } else {
            self.presenter
                .push_scalar_reading(&ScalarReading::from_observation(observation));
        }
    }
}
