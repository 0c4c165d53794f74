use async_trait::async_trait;
use tracing::{debug, warn};
use vitalwatch_types::{Component, MetricKind, MonitorKey};

use super::{MonitorTask, TaskContext};
use crate::error::TaskError;
use crate::observation::Observation;
use crate::presenter::SeriesPoint;

/// Averages total cholesterol across tracked patients and feeds the
/// per-patient chart.
pub struct CholesterolTask {
    ctx: TaskContext,
}

impl CholesterolTask {
    pub fn new(ctx: TaskContext) -> Self {
        Self { ctx }
    }

    async fn refresh(&self, observation: &Observation) -> Result<(), TaskError> {
        let reading = self.ctx.fetch_latest(observation).await?;
        let quantity = reading
            .value
            .as_ref()
            .ok_or_else(|| TaskError::NoReading(observation.key().clone()))?;

        match observation.set_value(Component::Cholesterol, &quantity.value) {
            Ok(value) => {
                observation.set_unit(Component::Cholesterol, quantity.unit.as_str());
                debug!(key = %observation.key(), value, "cholesterol refreshed");
            }
            Err(e) => warn!(key = %observation.key(), error = %e, "dropping malformed reading"),
        }
        observation.set_time(&reading.time);
        observation.notify_all();
        Ok(())
    }

}

/// Integer mean of every point that holds a value.
fn average(points: &[SeriesPoint]) -> Option<i64> {
    let values: Vec<i64> = points.iter().filter_map(|p| p.value).collect();
    if values.is_empty() {
        return None;
    }
    let sum: i128 = values.iter().map(|v| i128::from(*v)).sum();
    Some((sum / values.len() as i128) as i64)
}

#[async_trait]
impl MonitorTask for CholesterolTask {
    fn kind(&self) -> MetricKind {
        MetricKind::Cholesterol
    }

    async fn update_all(&self) {
        let store = self.ctx.store.metric(MetricKind::Cholesterol);
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
        let store = self.ctx.store.metric(MetricKind::Cholesterol);
        let points: Vec<SeriesPoint> = store
            .snapshot()
            .iter()
            .map(|(_, observation)| SeriesPoint::from_observation(observation))
            .collect();

        let average = average(&points);
        store.set_average(average);
        self.ctx.presenter.push_average(MetricKind::Cholesterol, average);
        self.ctx.presenter.push_series(MetricKind::Cholesterol, &points);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::presenter::ReadingMonitor;
    use crate::store::MonitorStore;
    use crate::testing::{cholesterol_reading, FakeSource, RecordingPresenter};
    use std::sync::Arc;

    const TIME: &str = "2021-01-01T10:00:00+10:00";

    struct Fixture {
        store: Arc<MonitorStore>,
        source: Arc<FakeSource>,
        presenter: Arc<RecordingPresenter>,
        task: CholesterolTask,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MonitorStore::new());
        let source = Arc::new(FakeSource::new());
        let presenter = Arc::new(RecordingPresenter::new());
        let ctx = TaskContext::new(store.clone(), source.clone(), presenter.clone());
        Fixture {
            store,
            source,
            presenter,
            task: CholesterolTask::new(ctx),
        }
    }

    fn track(store: &MonitorStore, patient: &str) -> Arc<Observation> {
        let obs = Arc::new(Observation::new(
            MonitorKey::new(MetricKind::Cholesterol, patient),
            "Ada",
            "Lovelace",
        ));
        store.insert_if_absent(obs.clone());
        obs
    }

    #[tokio::test]
    async fn add_monitor_fills_entity_and_average() {
        let f = fixture();
        f.source
            .set_reading("123", MetricKind::Cholesterol, cholesterol_reading("200", TIME));
        let obs = track(&f.store, "123");

        f.task.add_monitor(obs.key()).await.unwrap();

        assert_eq!(obs.value(Component::Cholesterol), Some(200));
        assert_eq!(obs.unit(Component::Cholesterol).as_deref(), Some("mg/dL"));
        assert_eq!(obs.time().as_deref(), Some("2021-01-01 10:00:00"));
        assert_eq!(f.store.metric(MetricKind::Cholesterol).average(), Some(200));
        assert_eq!(f.presenter.averages(MetricKind::Cholesterol), vec![Some(200)]);
    }

    #[tokio::test]
    async fn second_patient_recomputes_average() {
        let f = fixture();
        f.source
            .set_reading("123", MetricKind::Cholesterol, cholesterol_reading("200", TIME));
        f.source
            .set_reading("456", MetricKind::Cholesterol, cholesterol_reading("220", TIME));

        let first = track(&f.store, "123");
        f.task.add_monitor(first.key()).await.unwrap();
        let second = track(&f.store, "456");
        f.task.add_monitor(second.key()).await.unwrap();

        assert_eq!(f.store.metric(MetricKind::Cholesterol).average(), Some(210));
        assert_eq!(
            f.presenter.averages(MetricKind::Cholesterol),
            vec![Some(200), Some(210)]
        );
    }

    #[tokio::test]
    async fn average_uses_integer_division() {
        let f = fixture();
        f.source
            .set_reading("1", MetricKind::Cholesterol, cholesterol_reading("200", TIME));
        f.source
            .set_reading("2", MetricKind::Cholesterol, cholesterol_reading("205", TIME));
        track(&f.store, "1");
        track(&f.store, "2");

        f.task.update_all().await;

        assert_eq!(f.store.metric(MetricKind::Cholesterol).average(), Some(202));
    }

    #[tokio::test]
    async fn update_all_is_noop_when_empty() {
        let f = fixture();
        f.task.update_all().await;
        assert_eq!(f.source.calls(), 0);
        assert!(f.presenter.events().is_empty());
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_pass() {
        let f = fixture();
        f.source.set_error(
            "1",
            MetricKind::Cholesterol,
            SourceError::Connection("refused".into()),
        );
        f.source
            .set_reading("2", MetricKind::Cholesterol, cholesterol_reading("190", TIME));
        let broken = track(&f.store, "1");
        let healthy = track(&f.store, "2");

        f.task.update_all().await;

        assert_eq!(broken.value(Component::Cholesterol), None);
        assert_eq!(healthy.value(Component::Cholesterol), Some(190));
        assert_eq!(f.source.calls_for("1", MetricKind::Cholesterol), 1);
        assert_eq!(f.presenter.averages(MetricKind::Cholesterol), vec![Some(190)]);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_value() {
        let f = fixture();
        f.source
            .set_reading("1", MetricKind::Cholesterol, cholesterol_reading("200", TIME));
        let obs = track(&f.store, "1");
        f.task.update_all().await;

        f.source
            .set_error("1", MetricKind::Cholesterol, SourceError::Timeout);
        f.task.update_all().await;

        assert_eq!(obs.value(Component::Cholesterol), Some(200));
    }

    #[tokio::test]
    async fn malformed_value_is_dropped() {
        let f = fixture();
        f.source
            .set_reading("1", MetricKind::Cholesterol, cholesterol_reading("200", TIME));
        let obs = track(&f.store, "1");
        f.task.update_all().await;

        f.source.set_reading(
            "1",
            MetricKind::Cholesterol,
            cholesterol_reading("high", "2021-02-01T10:00:00Z"),
        );
        f.task.update_all().await;

        assert_eq!(obs.value(Component::Cholesterol), Some(200));
        assert_eq!(obs.time().as_deref(), Some("2021-02-01 10:00:00"));
    }

    #[tokio::test]
    async fn update_statistics_is_idempotent() {
        let f = fixture();
        f.source
            .set_reading("1", MetricKind::Cholesterol, cholesterol_reading("181.6", TIME));
        track(&f.store, "1");
        f.task.update_all().await;
        f.presenter.clear();

        f.task.update_statistics();
        f.task.update_statistics();

        assert_eq!(
            f.presenter.averages(MetricKind::Cholesterol),
            vec![Some(182), Some(182)]
        );
    }

    #[tokio::test]
    async fn average_is_none_without_values() {
        let f = fixture();
        track(&f.store, "1");

        f.task.update_statistics();

        assert_eq!(f.store.metric(MetricKind::Cholesterol).average(), None);
        assert_eq!(f.presenter.averages(MetricKind::Cholesterol), vec![None]);
    }

    #[tokio::test]
    async fn statistics_feed_the_chart_series() {
        let f = fixture();
        f.source
            .set_reading("1", MetricKind::Cholesterol, cholesterol_reading("200", TIME));
        f.source
            .set_reading("2", MetricKind::Cholesterol, cholesterol_reading("220", TIME));
        track(&f.store, "1");
        track(&f.store, "2");
        track(&f.store, "3");

        f.task.update_all().await;

        let series = f.presenter.series(MetricKind::Cholesterol);
        assert_eq!(series.len(), 1);
        let values: Vec<_> = series[0]
            .iter()
            .map(|p| (p.patient_id.as_str(), p.value))
            .collect();
        assert_eq!(values, vec![("1", Some(200)), ("2", Some(220)), ("3", None)]);
        assert_eq!(series[0][0].patient_name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn series_shrinks_after_removal() {
        let f = fixture();
        f.source
            .set_reading("1", MetricKind::Cholesterol, cholesterol_reading("200", TIME));
        f.source
            .set_reading("2", MetricKind::Cholesterol, cholesterol_reading("220", TIME));
        let first = track(&f.store, "1");
        track(&f.store, "2");
        f.task.update_all().await;

        f.store.remove(first.key());
        f.task.update_statistics();

        let latest = f.presenter.series(MetricKind::Cholesterol).pop().unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].patient_id, "2");
        assert_eq!(f.presenter.averages(MetricKind::Cholesterol).last(), Some(&Some(220)));
    }

    #[tokio::test]
    async fn refresh_reaches_presenter_through_listener() {
        let f = fixture();
        f.source
            .set_reading("1", MetricKind::Cholesterol, cholesterol_reading("200", TIME));
        let obs = Arc::new(Observation::new(
            MonitorKey::new(MetricKind::Cholesterol, "1"),
            "Ada",
            "Lovelace",
        ));
        obs.attach(Arc::new(ReadingMonitor::new(f.presenter.clone())));
        f.store.insert_if_absent(obs.clone());

        f.task.add_monitor(obs.key()).await.unwrap();

        let readings = f.presenter.scalar_readings();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].value, Some(200));
        assert_eq!(readings[0].time.as_deref(), Some("2021-01-01 10:00:00"));
    }

    #[tokio::test]
    async fn add_monitor_requires_tracked_key() {
        let f = fixture();
        let key = MonitorKey::new(MetricKind::Cholesterol, "missing");
        let err = f.task.add_monitor(&key).await.unwrap_err();
        assert!(matches!(err, TaskError::NotTracked(_)));
    }

    #[tokio::test]
    async fn add_monitor_reports_empty_bundle() {
        let f = fixture();
        let obs = track(&f.store, "1");
        let err = f.task.add_monitor(obs.key()).await.unwrap_err();
        assert!(matches!(err, TaskError::NoReading(_)));
    }
}
