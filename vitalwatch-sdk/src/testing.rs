//! In-memory fakes for exercising the engine without a network.
//!
//! Enabled with the `testing` feature.
//!
//! # Example
//!
//! ```rust
//! use vitalwatch_sdk::testing::{cholesterol_reading, FakeSource};
//! use vitalwatch_types::MetricKind;
//!
//! let source = FakeSource::new();
//! source.set_reading("123", MetricKind::Cholesterol, cholesterol_reading("200", "2021-01-01T10:00:00+10:00"));
//! assert_eq!(source.calls(), 0);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use vitalwatch_types::{
    ComponentReading, EncounterPage, MetricKind, MonitorKey, PatientRecord, PractitionerRecord,
    Quantity, Reading, ReadingBundle, ThresholdPair,
};

use crate::error::SourceError;
use crate::labels::ComponentLabels;
use crate::presenter::{
    CompositeReading, DashboardEvent, Presenter, ScalarReading, SeriesPoint,
};
use crate::source::{MeasurementSource, PatientDirectory};

/// A single cholesterol reading in mg/dL.
pub fn cholesterol_reading(value: &str, time: &str) -> Reading {
    Reading::scalar(time, Quantity::new(value, "mg/dL"))
}

/// A single blood pressure reading in mmHg, labelled the way the health
/// records service labels its components.
pub fn blood_pressure_reading(systolic: &str, diastolic: &str, time: &str) -> Reading {
    Reading::composite(
        time,
        vec![
            ComponentReading::new(ComponentLabels::SYSTOLIC, Quantity::new(systolic, "mmHg")),
            ComponentReading::new(ComponentLabels::DIASTOLIC, Quantity::new(diastolic, "mmHg")),
        ],
    )
}

type SourceKey = (String, MetricKind);

/// Programmable [`MeasurementSource`].
///
/// Unknown patient/metric pairs answer with an empty bundle.
#[derive(Debug, Default)]
pub struct FakeSource {
    responses: Mutex<HashMap<SourceKey, Result<ReadingBundle, SourceError>>>,
    calls: Mutex<HashMap<SourceKey, usize>>,
    total_calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every fetch for this pair with one reading.
    pub fn set_reading(&self, patient_id: &str, kind: MetricKind, reading: Reading) {
        self.set_response(patient_id, kind, Ok(ReadingBundle::new(1, vec![reading])));
    }

    /// Answer every fetch for this pair with an error.
    pub fn set_error(&self, patient_id: &str, kind: MetricKind, error: SourceError) {
        self.set_response(patient_id, kind, Err(error));
    }

    pub fn set_response(
        &self,
        patient_id: &str,
        kind: MetricKind,
        response: Result<ReadingBundle, SourceError>,
    ) {
        self.responses
            .lock()
            .insert((patient_id.to_string(), kind), response);
    }

    /// Make every fetch wait this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, patient_id: &str, kind: MetricKind) -> usize {
        self.calls
            .lock()
            .get(&(patient_id.to_string(), kind))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl MeasurementSource for FakeSource {
    async fn fetch_latest(
        &self,
        patient_id: &str,
        code: &str,
        _limit: u32,
    ) -> Result<ReadingBundle, SourceError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let kind = MetricKind::from_code(code)
            .ok_or_else(|| SourceError::NotFound(format!("code {}", code)))?;
        let key = (patient_id.to_string(), kind);

        self.total_calls.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().entry(key.clone()).or_insert(0) += 1;

        self.responses
            .lock()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Ok(ReadingBundle::default()))
    }
}

/// Programmable [`PatientDirectory`].
///
/// Encounter pages are chained in the order they are added.
#[derive(Debug, Default)]
pub struct FakeDirectory {
    practitioners: Mutex<HashMap<String, PractitionerRecord>>,
    pages: Mutex<Vec<Vec<String>>>,
    patients: Mutex<HashMap<String, PatientRecord>>,
    broken_patients: Mutex<HashSet<String>>,
    page_requests: AtomicUsize,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_practitioner(&self, identifier: &str, full_name: &str) {
        self.practitioners.lock().insert(
            identifier.to_string(),
            PractitionerRecord {
                system_id: format!("http://hl7.org/fhir/sid/us-npi|{}", identifier),
                full_name: full_name.to_string(),
            },
        );
    }

    pub fn add_page(&self, patient_ids: &[&str]) {
        self.pages
            .lock()
            .push(patient_ids.iter().map(|id| id.to_string()).collect());
    }

    pub fn add_patient(&self, patient: PatientRecord) {
        self.patients.lock().insert(patient.id.clone(), patient);
    }

    /// Make fetching this patient fail with a connection error.
    pub fn break_patient(&self, patient_id: &str) {
        self.broken_patients.lock().insert(patient_id.to_string());
    }

    /// Number of encounter pages requested so far.
    pub fn page_requests(&self) -> usize {
        self.page_requests.load(Ordering::SeqCst)
    }

    fn page(&self, index: usize) -> EncounterPage {
        let pages = self.pages.lock();
        let patient_ids = pages.get(index).cloned().unwrap_or_default();
        let next = (index + 1 < pages.len()).then(|| format!("page-{}", index + 1));
        EncounterPage { patient_ids, next }
    }
}

/// Build a patient record with placeholder demographics.
pub fn patient(id: &str, given_name: &str, family_name: &str) -> PatientRecord {
    PatientRecord {
        id: id.to_string(),
        given_name: given_name.to_string(),
        family_name: family_name.to_string(),
        gender: "female".to_string(),
        birth_date: "1970-01-01".to_string(),
        address: "Melbourne, VIC, AU".to_string(),
    }
}

#[async_trait]
impl PatientDirectory for FakeDirectory {
    async fn find_practitioner(
        &self,
        identifier: &str,
    ) -> Result<Option<PractitionerRecord>, SourceError> {
        Ok(self.practitioners.lock().get(identifier).cloned())
    }

    async fn first_encounter_page(
        &self,
        _practitioner: &PractitionerRecord,
    ) -> Result<EncounterPage, SourceError> {
        self.page_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.page(0))
    }

    async fn next_encounter_page(
        &self,
        page: &EncounterPage,
    ) -> Result<EncounterPage, SourceError> {
        self.page_requests.fetch_add(1, Ordering::SeqCst);
        let index = page
            .next
            .as_deref()
            .and_then(|link| link.strip_prefix("page-"))
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(|| SourceError::Parse("bad next link".to_string()))?;
        Ok(self.page(index))
    }

    async fn fetch_patient(&self, patient_id: &str) -> Result<PatientRecord, SourceError> {
        if self.broken_patients.lock().contains(patient_id) {
            return Err(SourceError::Connection("connection reset".to_string()));
        }
        self.patients
            .lock()
            .get(patient_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("Patient/{}", patient_id)))
    }
}

/// [`Presenter`] that records every push.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    events: Mutex<Vec<DashboardEvent>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DashboardEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Every average pushed for `kind`, oldest first.
    pub fn averages(&self, kind: MetricKind) -> Vec<Option<i64>> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                DashboardEvent::Average { kind: k, value } if *k == kind => Some(*value),
                _ => None,
            })
            .collect()
    }

    /// Every threshold pair pushed for `kind`, oldest first.
    pub fn thresholds(&self, kind: MetricKind) -> Vec<ThresholdPair> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                DashboardEvent::Thresholds {
                    kind: k,
                    thresholds,
                } if *k == kind => Some(*thresholds),
                _ => None,
            })
            .collect()
    }

    pub fn scalar_readings(&self) -> Vec<ScalarReading> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                DashboardEvent::ScalarReading(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn composite_readings(&self) -> Vec<CompositeReading> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                DashboardEvent::CompositeReading(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every series pushed for `kind`, oldest first.
    pub fn series(&self, kind: MetricKind) -> Vec<Vec<SeriesPoint>> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                DashboardEvent::Series { kind: k, points } if *k == kind => Some(points.clone()),
                _ => None,
            })
            .collect()
    }

    /// Keys reported as no longer tracked, oldest first.
    pub fn removed(&self) -> Vec<MonitorKey> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                DashboardEvent::MonitorRemoved { key } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&DashboardEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    fn record(&self, event: DashboardEvent) {
        self.events.lock().push(event);
    }
}

impl Presenter for RecordingPresenter {
    fn push_scalar_reading(&self, reading: &ScalarReading) {
        self.record(DashboardEvent::ScalarReading(reading.clone()));
    }

    fn push_composite_reading(&self, reading: &CompositeReading) {
        self.record(DashboardEvent::CompositeReading(reading.clone()));
    }

    fn push_average(&self, kind: MetricKind, average: Option<i64>) {
        self.record(DashboardEvent::Average {
            kind,
            value: average,
        });
    }

    fn push_thresholds(&self, kind: MetricKind, thresholds: ThresholdPair) {
        self.record(DashboardEvent::Thresholds { kind, thresholds });
    }

    fn on_first_monitor_added(&self, kind: MetricKind) {
        self.record(DashboardEvent::FirstMonitorAdded { kind });
    }

    fn push_series(&self, kind: MetricKind, points: &[SeriesPoint]) {
        self.record(DashboardEvent::Series {
            kind,
            points: points.to_vec(),
        });
    }

    fn on_last_monitor_removed(&self, kind: MetricKind) {
        self.record(DashboardEvent::LastMonitorRemoved { kind });
    }

    fn on_monitor_removed(&self, key: &MonitorKey) {
        self.record(DashboardEvent::MonitorRemoved { key: key.clone() });
    }
}
