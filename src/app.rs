//! The dashboard session: roster, tracking and user-adjustable settings.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, warn};
use vitalwatch_sdk::{
    Listener, MeasurementSource, MonitorStore, Observation, PatientDirectory, Presenter,
    ReadingMonitor, TaskDispatcher, TaskError, DEFAULT_FREQUENCY,
};
use vitalwatch_types::{
    MetricKind, MonitorKey, PatientRecord, PractitionerRecord, ThresholdPair,
};

use crate::config::Settings;
use crate::error::DashboardError;
use crate::input::{parse_frequency, parse_threshold};
use crate::roster::Roster;

/// Result of a track request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Tracked,
    AlreadyTracked,
}

/// One practitioner's monitoring session.
pub struct Dashboard {
    settings: Settings,
    store: Arc<MonitorStore>,
    dispatcher: TaskDispatcher,
    source: Arc<dyn MeasurementSource>,
    directory: Arc<dyn PatientDirectory>,
    presenter: Arc<dyn Presenter>,
    listeners: BTreeMap<MetricKind, Arc<dyn Listener>>,
    roster: RwLock<Option<Roster>>,
    /// Serialises track/untrack so first/last transitions are seen once.
    actions: tokio::sync::Mutex<()>,
}

impl Dashboard {
    /// Create a session. Must be called within a tokio runtime.
    pub fn new(
        settings: Settings,
        source: Arc<dyn MeasurementSource>,
        directory: Arc<dyn PatientDirectory>,
        presenter: Arc<dyn Presenter>,
    ) -> Result<Self, DashboardError> {
        let store = Arc::new(MonitorStore::new());
        if let Some(thresholds) = settings.thresholds.pair() {
            store
                .metric(MetricKind::BloodPressure)
                .set_thresholds(thresholds);
        }

        let dispatcher = TaskDispatcher::builder()
            .store(store.clone())
            .source(source.clone())
            .presenter(presenter.clone())
            .labels(settings.component_labels()?)
            .frequency(settings.frequency())
            .build()?;

        let listeners = MetricKind::ALL
            .into_iter()
            .map(|kind| {
                let listener: Arc<dyn Listener> = Arc::new(ReadingMonitor::new(presenter.clone()));
                (kind, listener)
            })
            .collect();

        Ok(Self {
            settings,
            store,
            dispatcher,
            source,
            directory,
            presenter,
            listeners,
            roster: RwLock::new(None),
            actions: tokio::sync::Mutex::new(()),
        })
    }

    /// Load the roster of a practitioner, replacing any previous one.
    ///
    /// Returns the number of patients found.
    pub async fn load_roster(&self, practitioner_id: &str) -> Result<usize, DashboardError> {
        let roster = Roster::load(
            self.directory.as_ref(),
            practitioner_id,
            self.settings.roster.page_limit,
        )
        .await?;
        let len = roster.len();
        *self.roster.write() = Some(roster);
        Ok(len)
    }

    pub fn practitioner(&self) -> Option<PractitionerRecord> {
        self.roster.read().as_ref().map(|r| r.practitioner.clone())
    }

    pub fn patients(&self) -> Vec<PatientRecord> {
        self.roster
            .read()
            .as_ref()
            .map(|r| r.patients().to_vec())
            .unwrap_or_default()
    }

    /// Birth date, gender and address of a roster patient.
    pub fn patient_details(&self, patient_id: &str) -> Result<PatientRecord, DashboardError> {
        self.roster
            .read()
            .as_ref()
            .and_then(|r| r.get(patient_id))
            .cloned()
            .ok_or_else(|| DashboardError::UnknownPatient(patient_id.to_string()))
    }

    /// Start monitoring one metric of a roster patient.
    pub async fn track(
        &self,
        kind: MetricKind,
        patient_id: &str,
    ) -> Result<TrackOutcome, DashboardError> {
        let patient = self.patient_details(patient_id)?;
        let key = MonitorKey::new(kind, patient_id);
        if self.store.has(&key) {
            return Ok(TrackOutcome::AlreadyTracked);
        }

        let bundle = self.source.fetch_latest(patient_id, kind.code(), 1).await?;
        if bundle.is_empty() {
            return Err(DashboardError::MetricAbsentForPatient {
                kind,
                patient_id: patient_id.to_string(),
            });
        }

        let _guard = self.actions.lock().await;
        let observation = Arc::new(Observation::new(
            key.clone(),
            patient.given_name,
            patient.family_name,
        ));
        observation.attach(self.listener(kind)?);

        let first_of_kind = self.store.metric(kind).is_empty();
        if !self.store.insert_if_absent(observation) {
            return Ok(TrackOutcome::AlreadyTracked);
        }
        info!(key = %key, "tracking");

        if first_of_kind {
            self.presenter.on_first_monitor_added(kind);
        }
        if self.dispatcher.has_scheduled_update() {
            if let Err(e) = self.dispatcher.add_monitor(&key).await {
                warn!(key = %key, error = %e, "initial refresh failed");
            }
        } else {
            self.dispatcher.init_scheduled_updates();
        }
        Ok(TrackOutcome::Tracked)
    }

    /// Stop monitoring one observation.
    pub async fn untrack(&self, key: &MonitorKey) -> Result<(), DashboardError> {
        let _guard = self.actions.lock().await;
        let observation = self
            .store
            .remove(key)
            .ok_or_else(|| DashboardError::NotTracked(key.clone()))?;
        if let Some(listener) = self.listeners.get(&key.kind) {
            observation.detach(listener);
        }
        info!(key = %key, "untracked");
        self.presenter.on_monitor_removed(key);

        if self.store.metric(key.kind).is_empty() {
            self.presenter.on_last_monitor_removed(key.kind);
        } else {
            self.dispatcher.update_statistics(key.kind)?;
        }
        if !self.store.any_tracked() && self.dispatcher.has_scheduled_update() {
            debug!("nothing tracked, stopping updates");
            self.dispatcher.cancel_scheduled_updates();
        }
        Ok(())
    }

    pub fn tracked(&self) -> Vec<MonitorKey> {
        MetricKind::ALL
            .into_iter()
            .flat_map(|kind| self.store.metric(kind).snapshot())
            .map(|(key, _)| key)
            .collect()
    }

    pub fn observation(&self, key: &MonitorKey) -> Option<Arc<Observation>> {
        self.store.get(key)
    }

    /// Change the update frequency from user text.
    ///
    /// On rejection the error carries the default frequency to show instead.
    pub fn set_frequency(&self, input: &str) -> Result<u64, DashboardError> {
        let seconds = parse_frequency(
            input,
            self.settings.scheduler.min_frequency_secs,
            DEFAULT_FREQUENCY.as_secs(),
        )?;
        self.dispatcher.update_frequency(seconds);
        info!(seconds, "update frequency changed");
        Ok(seconds)
    }

    pub fn frequency(&self) -> Duration {
        self.dispatcher.frequency()
    }

    pub fn is_updating(&self) -> bool {
        self.dispatcher.has_scheduled_update()
    }

    /// Set the blood pressure thresholds from user text.
    pub fn set_thresholds(
        &self,
        systolic: &str,
        diastolic: &str,
    ) -> Result<ThresholdPair, DashboardError> {
        let thresholds = ThresholdPair::new(parse_threshold(systolic)?, parse_threshold(diastolic)?);
        let metric = self.store.metric(MetricKind::BloodPressure);
        metric.set_thresholds(thresholds);
        info!(
            systolic = thresholds.first,
            diastolic = thresholds.second,
            "thresholds changed"
        );

        if !metric.is_empty() {
            self.dispatcher
                .update_statistics(MetricKind::BloodPressure)?;
        }
        Ok(thresholds)
    }

    pub fn thresholds(&self) -> Option<ThresholdPair> {
        self.store.metric(MetricKind::BloodPressure).thresholds()
    }

    pub fn average(&self, kind: MetricKind) -> Option<i64> {
        self.store.metric(kind).average()
    }

    /// Stop periodic updates.
    pub fn shutdown(&self) {
        self.dispatcher.cancel_scheduled_updates();
    }

    fn listener(&self, kind: MetricKind) -> Result<Arc<dyn Listener>, TaskError> {
        self.listeners
            .get(&kind)
            .cloned()
            .ok_or(TaskError::UnknownKind(kind))
    }
}
