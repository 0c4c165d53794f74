//! A practitioner's patient roster.

use std::collections::HashSet;

use tracing::{debug, info, warn};
use vitalwatch_sdk::PatientDirectory;
use vitalwatch_types::{PatientRecord, PractitionerRecord};

use crate::error::DashboardError;

/// Patients seen by one practitioner, in the order first encountered.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub practitioner: PractitionerRecord,
    patients: Vec<PatientRecord>,
}

impl Roster {
    pub fn new(practitioner: PractitionerRecord, patients: Vec<PatientRecord>) -> Self {
        Self {
            practitioner,
            patients,
        }
    }

    /// Resolve the practitioner and load every patient referenced by their
    /// encounters.
    ///
    /// At most `page_limit` encounter pages are walked. A patient that cannot
    /// be fetched is skipped; a page that cannot be fetched ends the walk.
    ///
    /// ```rust
    /// use vitalwatch::Roster;
    /// use vitalwatch_sdk::testing::{patient, FakeDirectory};
    ///
    /// # tokio_test::block_on(async {
    /// let directory = FakeDirectory::new();
    /// directory.add_practitioner("500", "Dr. Jaime Ramos");
    /// directory.add_page(&["1", "1"]);
    /// directory.add_patient(patient("1", "Ada", "Lovelace"));
    ///
    /// let roster = Roster::load(&directory, "500", 5).await.unwrap();
    /// assert_eq!(roster.len(), 1);
    /// # });
    /// ```
    pub async fn load(
        directory: &dyn PatientDirectory,
        practitioner_id: &str,
        page_limit: usize,
    ) -> Result<Self, DashboardError> {
        let practitioner = directory
            .find_practitioner(practitioner_id)
            .await?
            .ok_or_else(|| DashboardError::UnknownPractitioner(practitioner_id.to_string()))?;
        info!(practitioner = %practitioner.full_name, "loading roster");

        let patient_ids = encounter_patients(directory, &practitioner, page_limit).await?;

        let mut patients = Vec::with_capacity(patient_ids.len());
        for id in patient_ids {
            match directory.fetch_patient(&id).await {
                Ok(patient) => patients.push(patient),
                Err(e) => warn!(patient = %id, error = %e, "skipping patient"),
            }
        }

        info!(patients = patients.len(), "roster loaded");
        Ok(Self::new(practitioner, patients))
    }

    pub fn get(&self, patient_id: &str) -> Option<&PatientRecord> {
        self.patients.iter().find(|p| p.id == patient_id)
    }

    pub fn patients(&self) -> &[PatientRecord] {
        &self.patients
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }
}

/// Unique patient ids across the first `page_limit` encounter pages.
async fn encounter_patients(
    directory: &dyn PatientDirectory,
    practitioner: &PractitionerRecord,
    page_limit: usize,
) -> Result<Vec<String>, DashboardError> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    let mut page = directory.first_encounter_page(practitioner).await?;
    let mut pages = 1;
    loop {
        for id in page.patient_ids.drain(..) {
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }
        if !page.has_next() || pages >= page_limit {
            break;
        }
        page = match directory.next_encounter_page(&page).await {
            Ok(next) => next,
            Err(e) => {
                warn!(page = pages + 1, error = %e, "stopping encounter walk");
                break;
            }
        };
        pages += 1;
    }

    debug!(pages, patients = ids.len(), "encounters walked");
    Ok(ids)
}
