//! Keyed storage for tracked observations.
//!
//! Each metric kind has its own [`MetricStore`]. Writers (the dashboard
//! adding or removing monitors) and readers (scheduled ticks iterating all
//! monitors) run concurrently; iteration always works on a snapshot so a
//! removal during a tick is never observed half-way.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use vitalwatch_types::{MetricKind, MonitorKey, ThresholdPair};

use crate::observation::Observation;

/// Observations of one metric kind, plus the kind's aggregate state.
#[derive(Debug, Default)]
pub struct MetricStore {
    entries: RwLock<BTreeMap<MonitorKey, Arc<Observation>>>,
    thresholds: RwLock<Option<ThresholdPair>>,
    average: RwLock<Option<i64>>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the observation stored under its own key.
    pub fn store(&self, observation: Arc<Observation>) -> Option<Arc<Observation>> {
        let key = observation.key().clone();
        self.entries.write().insert(key, observation)
    }

    /// Insert the observation unless its key is already present.
    ///
    /// Returns `true` if the observation was inserted.
    pub fn insert_if_absent(&self, observation: Arc<Observation>) -> bool {
        // Fast path
        if self.entries.read().contains_key(observation.key()) {
            return false;
        }

        // Slow path, re-checked under the write lock
        let mut entries = self.entries.write();
        if entries.contains_key(observation.key()) {
            return false;
        }
        entries.insert(observation.key().clone(), observation);
        true
    }

    pub fn remove(&self, key: &MonitorKey) -> Option<Arc<Observation>> {
        self.entries.write().remove(key)
    }

    pub fn has(&self, key: &MonitorKey) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn get(&self, key: &MonitorKey) -> Option<Arc<Observation>> {
        self.entries.read().get(key).cloned()
    }

    pub fn count(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Copy of the current entries in key order.
    ///
    /// Later inserts and removals do not affect the returned vector.
    pub fn snapshot(&self) -> Vec<(MonitorKey, Arc<Observation>)> {
        self.entries
            .read()
            .iter()
            .map(|(key, observation)| (key.clone(), observation.clone()))
            .collect()
    }

    pub fn set_thresholds(&self, thresholds: ThresholdPair) {
        *self.thresholds.write() = Some(thresholds);
    }

    pub fn thresholds(&self) -> Option<ThresholdPair> {
        *self.thresholds.read()
    }

    pub fn has_thresholds(&self) -> bool {
        self.thresholds.read().is_some()
    }

    pub fn set_average(&self, average: Option<i64>) {
        *self.average.write() = average;
    }

    pub fn average(&self) -> Option<i64> {
        *self.average.read()
    }
}

/// One [`MetricStore`] per metric kind.
#[derive(Debug, Default)]
pub struct MonitorStore {
    cholesterol: MetricStore,
    blood_pressure: MetricStore,
}

impl MonitorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metric(&self, kind: MetricKind) -> &MetricStore {
        match kind {
            MetricKind::Cholesterol => &self.cholesterol,
            MetricKind::BloodPressure => &self.blood_pressure,
        }
    }

    pub fn insert_if_absent(&self, observation: Arc<Observation>) -> bool {
        self.metric(observation.kind()).insert_if_absent(observation)
    }

    pub fn remove(&self, key: &MonitorKey) -> Option<Arc<Observation>> {
        self.metric(key.kind).remove(key)
    }

    pub fn has(&self, key: &MonitorKey) -> bool {
        self.metric(key.kind).has(key)
    }

    pub fn get(&self, key: &MonitorKey) -> Option<Arc<Observation>> {
        self.metric(key.kind).get(key)
    }

    /// Whether any metric kind has at least one tracked observation.
    pub fn any_tracked(&self) -> bool {
        MetricKind::ALL
            .iter()
            .any(|kind| !self.metric(*kind).is_empty())
    }

    pub fn total_count(&self) -> usize {
        MetricKind::ALL
            .iter()
            .map(|kind| self.metric(*kind).count())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn observation(kind: MetricKind, patient: &str) -> Arc<Observation> {
        Arc::new(Observation::new(
            MonitorKey::new(kind, patient),
            "Ada",
            "Lovelace",
        ))
    }

    #[test]
    fn insert_if_absent_rejects_duplicates() {
        let store = MetricStore::new();
        let first = observation(MetricKind::Cholesterol, "1");
        let second = observation(MetricKind::Cholesterol, "1");

        assert!(store.insert_if_absent(first.clone()));
        assert!(!store.insert_if_absent(second));
        assert_eq!(store.count(), 1);

        let stored = store.get(first.key()).unwrap();
        assert!(Arc::ptr_eq(&stored, &first));
    }

    #[test]
    fn store_replaces_existing() {
        let store = MetricStore::new();
        let first = observation(MetricKind::Cholesterol, "1");
        let second = observation(MetricKind::Cholesterol, "1");

        assert!(store.store(first.clone()).is_none());
        let replaced = store.store(second.clone()).unwrap();
        assert!(Arc::ptr_eq(&replaced, &first));
        assert!(Arc::ptr_eq(&store.get(first.key()).unwrap(), &second));
    }

    #[test]
    fn remove_and_has() {
        let store = MetricStore::new();
        let obs = observation(MetricKind::Cholesterol, "1");
        store.insert_if_absent(obs.clone());

        assert!(store.has(obs.key()));
        assert!(store.remove(obs.key()).is_some());
        assert!(!store.has(obs.key()));
        assert!(store.remove(obs.key()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn snapshot_is_isolated_from_later_changes() {
        let store = MetricStore::new();
        store.insert_if_absent(observation(MetricKind::Cholesterol, "1"));
        store.insert_if_absent(observation(MetricKind::Cholesterol, "2"));

        let snapshot = store.snapshot();
        store.remove(&MonitorKey::new(MetricKind::Cholesterol, "1"));
        store.insert_if_absent(observation(MetricKind::Cholesterol, "3"));

        let ids: Vec<_> = snapshot.iter().map(|(k, _)| k.patient_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn aggregate_state_defaults_to_unset() {
        let store = MetricStore::new();
        assert!(!store.has_thresholds());
        assert_eq!(store.thresholds(), None);
        assert_eq!(store.average(), None);

        store.set_thresholds(ThresholdPair::new(130, 85));
        store.set_average(Some(200));
        assert_eq!(store.thresholds(), Some(ThresholdPair::new(130, 85)));
        assert_eq!(store.average(), Some(200));

        store.set_average(None);
        assert_eq!(store.average(), None);
    }

    #[test]
    fn monitor_store_routes_by_kind() {
        let store = MonitorStore::new();
        assert!(!store.any_tracked());

        store.insert_if_absent(observation(MetricKind::Cholesterol, "1"));
        store.insert_if_absent(observation(MetricKind::BloodPressure, "1"));
        store.insert_if_absent(observation(MetricKind::BloodPressure, "2"));

        assert!(store.any_tracked());
        assert_eq!(store.metric(MetricKind::Cholesterol).count(), 1);
        assert_eq!(store.metric(MetricKind::BloodPressure).count(), 2);
        assert_eq!(store.total_count(), 3);

        let key = MonitorKey::new(MetricKind::Cholesterol, "1");
        assert!(store.has(&key));
        store.remove(&key);
        assert!(!store.has(&key));
        assert!(store.metric(MetricKind::Cholesterol).is_empty());
    }

    #[test]
    fn concurrent_inserts_keep_one_entry_per_key() {
        let store = Arc::new(MetricStore::new());

        let mut handles = vec![];
        for _ in 0..8 {
            let s = store.clone();
            handles.push(thread::spawn(move || {
                let mut inserted = 0;
                for i in 0..50 {
                    if s.insert_if_absent(observation(MetricKind::Cholesterol, &i.to_string())) {
                        inserted += 1;
                    }
                }
                inserted
            }));
        }

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 50);
        assert_eq!(store.count(), 50);
    }

    #[test]
    fn concurrent_snapshot_during_removal() {
        let store = Arc::new(MetricStore::new());
        for i in 0..100 {
            store.insert_if_absent(observation(MetricKind::BloodPressure, &i.to_string()));
        }

        let remover = {
            let s = store.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    s.remove(&MonitorKey::new(MetricKind::BloodPressure, i.to_string()));
                }
            })
        };

        for _ in 0..20 {
            let snapshot = store.snapshot();
            assert!(snapshot.len() <= 100);
        }

        remover.join().unwrap();
        assert!(store.is_empty());
    }
}
