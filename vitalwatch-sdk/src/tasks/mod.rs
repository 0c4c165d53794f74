//! Per-metric monitor tasks.
//!
//! A task owns the fetch/merge/notify cycle for one metric kind and the
//! statistics derived from it. It only ever touches its own slice of the
//! store.

mod blood_pressure;
mod cholesterol;

use std::sync::Arc;

use async_trait::async_trait;
use vitalwatch_types::{MetricKind, MonitorKey, Reading};

use crate::error::TaskError;
use crate::labels::ComponentLabels;
use crate::observation::Observation;
use crate::presenter::Presenter;
use crate::source::MeasurementSource;
use crate::store::MonitorStore;

pub use blood_pressure::BloodPressureTask;
pub use cholesterol::CholesterolTask;

/// Only the newest reading is ever requested.
const LATEST_ONLY: u32 = 1;

/// Refreshes the observations of one metric kind.
#[async_trait]
pub trait MonitorTask: Send + Sync {
    fn kind(&self) -> MetricKind;

    /// Refresh every tracked observation of this kind, then recompute
    /// statistics once.
    ///
    /// A failure for one observation is logged and does not stop the rest.
    async fn update_all(&self);

    /// Refresh a single, newly tracked observation, then recompute
    /// statistics.
    async fn add_monitor(&self, key: &MonitorKey) -> Result<(), TaskError>;

    /// Recompute and push this kind's derived statistics.
    fn update_statistics(&self);
}

/// Collaborators shared by every task.
#[derive(Clone)]
pub struct TaskContext {
    pub store: Arc<MonitorStore>,
    pub source: Arc<dyn MeasurementSource>,
    pub presenter: Arc<dyn Presenter>,
    pub labels: Arc<ComponentLabels>,
}

impl TaskContext {
    pub fn new(
        store: Arc<MonitorStore>,
        source: Arc<dyn MeasurementSource>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self {
            store,
            source,
            presenter,
            labels: Arc::new(ComponentLabels::default()),
        }
    }

    pub fn with_labels(mut self, labels: ComponentLabels) -> Self {
        self.labels = Arc::new(labels);
        self
    }

    /// Fetch the newest reading for `observation`.
    pub(crate) async fn fetch_latest(&self, observation: &Observation) -> Result<Reading, TaskError> {
        let bundle = self
            .source
            .fetch_latest(observation.patient_id(), observation.kind().code(), LATEST_ONLY)
            .await?;
        bundle
            .readings
            .into_iter()
            .next()
            .ok_or_else(|| TaskError::NoReading(observation.key().clone()))
    }

    /// Look up a tracked observation of `kind`.
    pub(crate) fn tracked(&self, key: &MonitorKey) -> Result<Arc<Observation>, TaskError> {
        self.store
            .get(key)
            .ok_or_else(|| TaskError::NotTracked(key.clone()))
    }
}

/// Build one task per supported metric kind.
pub fn default_tasks(ctx: &TaskContext) -> Vec<Arc<dyn MonitorTask>> {
    vec![
        Arc::new(CholesterolTask::new(ctx.clone())),
        Arc::new(BloodPressureTask::new(ctx.clone())),
    ]
}
