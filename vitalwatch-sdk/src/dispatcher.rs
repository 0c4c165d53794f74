//! Routing of monitor operations to per-metric tasks.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tracing::debug;
use vitalwatch_types::{MetricKind, MonitorKey};

use crate::error::TaskError;
use crate::labels::ComponentLabels;
use crate::presenter::Presenter;
use crate::scheduler::{PeriodicJob, UpdateScheduler, DEFAULT_FREQUENCY};
use crate::source::MeasurementSource;
use crate::store::MonitorStore;
use crate::tasks::{default_tasks, MonitorTask, TaskContext};

/// One task per metric kind.
pub struct TaskSet {
    tasks: BTreeMap<MetricKind, Arc<dyn MonitorTask>>,
}

impl TaskSet {
    pub fn new(tasks: impl IntoIterator<Item = Arc<dyn MonitorTask>>) -> Self {
        Self {
            tasks: tasks.into_iter().map(|task| (task.kind(), task)).collect(),
        }
    }

    pub fn get(&self, kind: MetricKind) -> Result<&Arc<dyn MonitorTask>, TaskError> {
        self.tasks.get(&kind).ok_or(TaskError::UnknownKind(kind))
    }

    /// Run every task's full refresh, one kind after another.
    pub async fn update_all_monitors(&self) {
        for task in self.tasks.values() {
            task.update_all().await;
        }
    }
}

#[async_trait]
impl PeriodicJob for TaskSet {
    async fn run(&self) {
        debug!("scheduled update tick");
        self.update_all_monitors().await;
    }
}

/// Front door of the engine: routes requests to the task for a key's metric
/// kind and owns the periodic scheduler.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use vitalwatch_sdk::{MeasurementSource, MonitorStore, TaskDispatcher, TracingPresenter};
///
/// # async fn run(source: Arc<dyn MeasurementSource>) -> Result<(), vitalwatch_sdk::TaskError> {
/// let dispatcher = TaskDispatcher::builder()
///     .store(Arc::new(MonitorStore::new()))
///     .source(source)
///     .presenter(Arc::new(TracingPresenter))
///     .build()?;
///
/// if !dispatcher.has_scheduled_update() {
///     dispatcher.init_scheduled_updates();
/// }
/// # Ok(())
/// # }
/// ```
pub struct TaskDispatcher {
    tasks: Arc<TaskSet>,
    scheduler: UpdateScheduler,
}

impl TaskDispatcher {
    pub fn builder() -> TaskDispatcherBuilder {
        TaskDispatcherBuilder::default()
    }

    /// Refresh every tracked observation of every kind.
    pub async fn update_all_monitors(&self) {
        self.tasks.update_all_monitors().await;
    }

    /// Fill a newly tracked observation without waiting for the next tick.
    pub async fn add_monitor(&self, key: &MonitorKey) -> Result<(), TaskError> {
        self.tasks.get(key.kind)?.add_monitor(key).await
    }

    pub fn update_statistics(&self, kind: MetricKind) -> Result<(), TaskError> {
        self.tasks.get(kind)?.update_statistics();
        Ok(())
    }

    pub fn has_scheduled_update(&self) -> bool {
        self.scheduler.has_future_task()
    }

    pub fn init_scheduled_updates(&self) {
        self.scheduler.init();
    }

    pub fn cancel_scheduled_updates(&self) {
        self.scheduler.cancel_future_task();
    }

    pub fn update_frequency(&self, seconds: u64) {
        self.scheduler.update_frequency(Duration::from_secs(seconds));
    }

    pub fn frequency(&self) -> Duration {
        self.scheduler.frequency()
    }
}

/// Builder for [`TaskDispatcher`].
#[derive(Default)]
pub struct TaskDispatcherBuilder {
    store: Option<Arc<MonitorStore>>,
    source: Option<Arc<dyn MeasurementSource>>,
    presenter: Option<Arc<dyn Presenter>>,
    labels: Option<ComponentLabels>,
    frequency: Option<Duration>,
    runtime: Option<Handle>,
}

impl TaskDispatcherBuilder {
    pub fn store(mut self, store: Arc<MonitorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn source(mut self, source: Arc<dyn MeasurementSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    pub fn labels(mut self, labels: ComponentLabels) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Tick interval. Defaults to [`DEFAULT_FREQUENCY`].
    pub fn frequency(mut self, frequency: Duration) -> Self {
        self.frequency = Some(frequency);
        self
    }

    /// Runtime ticks are spawned on. Defaults to the current runtime.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build the dispatcher.
    ///
    /// A missing store defaults to an empty one. A missing source or
    /// presenter is reported as [`TaskError::NotConfigured`].
    pub fn build(self) -> Result<TaskDispatcher, TaskError> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| TaskError::NoRuntime)?,
        };
        let source = self.source.ok_or(TaskError::NotConfigured("source"))?;
        let presenter = self
            .presenter
            .ok_or(TaskError::NotConfigured("presenter"))?;

        let mut ctx = TaskContext::new(
            self.store.unwrap_or_default(),
            source,
            presenter,
        );
        if let Some(labels) = self.labels {
            ctx = ctx.with_labels(labels);
        }

        let tasks = Arc::new(TaskSet::new(default_tasks(&ctx)));
        let scheduler = UpdateScheduler::new(
            tasks.clone(),
            runtime,
            self.frequency.unwrap_or(DEFAULT_FREQUENCY),
        );

        Ok(TaskDispatcher { tasks, scheduler })
    }
}
