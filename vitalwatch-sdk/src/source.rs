//! Contracts for the remote health-records service.
//!
//! The engine never talks HTTP itself. A [`MeasurementSource`] returns the
//! newest readings for a patient and a code; a [`PatientDirectory`] resolves
//! practitioners, their encounter pages and patient demographics.

use async_trait::async_trait;
use vitalwatch_types::{EncounterPage, PatientRecord, PractitionerRecord, ReadingBundle};

use crate::error::SourceError;

/// Fetches measurement readings.
#[async_trait]
pub trait MeasurementSource: Send + Sync {
    /// Return up to `limit` readings for `patient_id` and `code`, newest
    /// first.
    async fn fetch_latest(
        &self,
        patient_id: &str,
        code: &str,
        limit: u32,
    ) -> Result<ReadingBundle, SourceError>;
}

/// Resolves practitioners, encounters and patients.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    /// Look up a practitioner by identifier. `Ok(None)` if nobody matches.
    async fn find_practitioner(
        &self,
        identifier: &str,
    ) -> Result<Option<PractitionerRecord>, SourceError>;

    /// First page of encounters involving the practitioner.
    async fn first_encounter_page(
        &self,
        practitioner: &PractitionerRecord,
    ) -> Result<EncounterPage, SourceError>;

    /// The page following `page`. Callers check [`EncounterPage::has_next`]
    /// first.
    async fn next_encounter_page(&self, page: &EncounterPage)
        -> Result<EncounterPage, SourceError>;

    async fn fetch_patient(&self, patient_id: &str) -> Result<PatientRecord, SourceError>;
}
