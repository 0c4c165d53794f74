//! Patient records and practitioner encounter pages.

/// Demographic details of a patient, as resolved from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatientRecord {
    pub id: String,
    pub given_name: String,
    pub family_name: String,
    pub gender: String,
    pub birth_date: String,
    /// City, state and country joined for display.
    pub address: String,
}

impl PatientRecord {
    /// Given and family name joined by a single space.
    pub fn full_name(&self) -> String {
        match (self.given_name.is_empty(), self.family_name.is_empty()) {
            (false, false) => format!("{} {}", self.given_name, self.family_name),
            (false, true) => self.given_name.clone(),
            (true, _) => self.family_name.clone(),
        }
    }
}

/// A practitioner as found by identifier lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PractitionerRecord {
    /// `system|value` identifier used to search encounters.
    pub system_id: String,
    pub full_name: String,
}

/// One page of a practitioner's encounters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncounterPage {
    /// Patient ids referenced by the encounters on this page, in order.
    /// May contain duplicates when a patient visited more than once.
    pub patient_ids: Vec<String>,
    /// Opaque link to the following page, if any.
    pub next: Option<String>,
}

impl EncounterPage {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_joins_parts() {
        let patient = PatientRecord {
            given_name: "Ada".into(),
            family_name: "Lovelace".into(),
            ..Default::default()
        };
        assert_eq!(patient.full_name(), "Ada Lovelace");

        let only_family = PatientRecord {
            family_name: "Lovelace".into(),
            ..Default::default()
        };
        assert_eq!(only_family.full_name(), "Lovelace");
    }

    #[test]
    fn page_without_next_link() {
        let page = EncounterPage::default();
        assert!(!page.has_next());
    }
}
