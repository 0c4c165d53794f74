use async_trait::async_trait;
use tracing::{debug, warn};
use vitalwatch_types::{MetricKind, MonitorKey};

use super::{MonitorTask, TaskContext};
use crate::error::TaskError;
use crate::observation::Observation;

/// Tracks systolic and diastolic pressure against a configurable threshold
/// pair.
///
/// Breach evaluation is left to the presenter; this task only keeps values
/// fresh and re-sends the thresholds after every pass.
pub struct BloodPressureTask {
    ctx: TaskContext,
}

impl BloodPressureTask {
    pub fn new(ctx: TaskContext) -> Self {
        Self { ctx }
    }

    async fn refresh(&self, observation: &Observation) -> Result<(), TaskError> {
        let reading = self.ctx.fetch_latest(observation).await?;
        let components = MetricKind::BloodPressure.components();

        for part in &reading.components {
            let Some(component) = self.ctx.labels.resolve(&part.label) else {
                debug!(key = %observation.key(), label = %part.label, "ignoring unknown component");
                continue;
            };
            if !components.contains(&component) {
                debug!(key = %observation.key(), component = %component, "ignoring foreign component");
                continue;
            }
            match observation.set_value(component, &part.quantity.value) {
                Ok(_) => observation.set_unit(component, part.quantity.unit.as_str()),
                Err(e) => warn!(key = %observation.key(), error = %e, "dropping malformed reading"),
            }
        }

        observation.set_time(&reading.time);
        observation.notify_all();
        Ok(())
    }
}

#[async_trait]
impl MonitorTask for BloodPressureTask {
    fn kind(&self) -> MetricKind {
        MetricKind::BloodPressure
    }

    async fn update_all(&self) {
        let store = self.ctx.store.metric(MetricKind::BloodPressure);
        if store.is_empty() {
            return;
        }

        for (key, observation) in store.snapshot() {
            // Untracked since the snapshot was taken
            if !store.has(&key) {
                continue;
            }
            if let Err(e) = self.refresh(&observation).await {
                warn!(key = %key, error = %e, "failed to refresh observation");
            }
        }

        self.update_statistics();
    }

    async fn add_monitor(&self, key: &MonitorKey) -> Result<(), TaskError> {
        let observation = self.ctx.tracked(key)?;
        self.refresh(&observation).await?;
        self.update_statistics();
        Ok(())
    }

    fn update_statistics(&self) {
        if let Some(thresholds) = self.ctx.store.metric(MetricKind::BloodPressure).thresholds() {
            self.ctx
                .presenter
                .push_thresholds(MetricKind::BloodPressure, thresholds);
        }
    }
}
