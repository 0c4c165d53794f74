//! Mapping of source component labels to components.

use std::collections::BTreeMap;

use vitalwatch_types::Component;

/// Maps the free-text label of a reading component to a [`Component`].
///
/// Lookup tries an exact match first and then a case-insensitive one.
/// Unknown labels resolve to `None` and are skipped by the tasks.
#[derive(Debug, Clone)]
pub struct ComponentLabels {
    labels: BTreeMap<String, Component>,
}

impl ComponentLabels {
    pub const SYSTOLIC: &'static str = "Systolic Blood Pressure";
    pub const DIASTOLIC: &'static str = "Diastolic Blood Pressure";

    /// An empty mapping.
    pub fn empty() -> Self {
        Self {
            labels: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, label: impl Into<String>, component: Component) -> &mut Self {
        self.labels.insert(label.into(), component);
        self
    }

    pub fn with(mut self, label: impl Into<String>, component: Component) -> Self {
        self.insert(label, component);
        self
    }

    pub fn resolve(&self, label: &str) -> Option<Component> {
        if let Some(component) = self.labels.get(label) {
            return Some(*component);
        }
        self.labels
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(label.trim()))
            .map(|(_, component)| *component)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for ComponentLabels {
    fn default() -> Self {
        Self::empty()
            .with(Self::SYSTOLIC, Component::Systolic)
            .with(Self::DIASTOLIC, Component::Diastolic)
    }
}
