//! # vitalwatch-sdk
//!
//! Monitoring engine that keeps tracked patient biometrics fresh.
//!
//! The engine polls a [`MeasurementSource`] for the newest reading of every
//! tracked observation, merges it into the [`Observation`], recomputes the
//! derived statistics of each metric kind, and pushes the results to a
//! [`Presenter`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vitalwatch_sdk::{
//!     MeasurementSource, MonitorStore, Observation, ReadingMonitor, TaskDispatcher,
//!     TracingPresenter,
//! };
//! use vitalwatch_types::{MetricKind, MonitorKey};
//!
//! # async fn run(source: Arc<dyn MeasurementSource>) -> Result<(), vitalwatch_sdk::TaskError> {
//! let store = Arc::new(MonitorStore::new());
//! let presenter = Arc::new(TracingPresenter);
//!
//! let dispatcher = TaskDispatcher::builder()
//!     .store(store.clone())
//!     .source(source)
//!     .presenter(presenter.clone())
//!     .build()?;
//!
//! // Track a patient's cholesterol
//! let key = MonitorKey::new(MetricKind::Cholesterol, "123");
//! let observation = Arc::new(Observation::new(key.clone(), "Ada", "Lovelace"));
//! observation.attach(Arc::new(ReadingMonitor::new(presenter)));
//! store.insert_if_absent(observation);
//!
//! // First tick runs immediately, then every 60 seconds
//! dispatcher.init_scheduled_updates();
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! - The store may be mutated from any thread while a tick iterates it;
//!   ticks work on snapshots.
//! - Listeners must be attached before an observation is inserted into the
//!   store.
//! - At most one tick runs at a time, including across a reschedule.

mod dispatcher;
mod error;
mod labels;
mod observation;
mod presenter;
mod scheduler;
mod source;
mod store;
mod tasks;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use dispatcher::{TaskDispatcher, TaskDispatcherBuilder, TaskSet};
pub use error::{SourceError, TaskError};
pub use labels::ComponentLabels;
pub use observation::{
    normalize_time, FnListener, InvalidReading, Listener, Measurement, Notifier, Observation,
};
pub use presenter::{
    ChannelPresenter, ComponentValue, CompositeReading, DashboardEvent, JsonLinesPresenter,
    Presenter, ReadingMonitor, ScalarReading, SeriesPoint, TracingPresenter,
};
pub use scheduler::{PeriodicJob, UpdateScheduler, DEFAULT_FREQUENCY, MIN_FREQUENCY};
pub use source::{MeasurementSource, PatientDirectory};
pub use store::{MetricStore, MonitorStore};
pub use tasks::{default_tasks, BloodPressureTask, CholesterolTask, MonitorTask, TaskContext};

// Re-export types for convenience
pub use vitalwatch_types::{
    Component, EncounterPage, MetricKind, MonitorKey, PatientRecord, PractitionerRecord,
    ReadingBundle, ThresholdPair,
};
