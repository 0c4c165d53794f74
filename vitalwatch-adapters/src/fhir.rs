//! FHIR R4 adapter using the REST search API.
//!
//! This adapter answers the engine's queries by searching a FHIR server:
//!
//! - **Observations**: `GET /Observation?patient=..&code=..&_sort=-date&_count=..`
//! - **Practitioners**: `GET /Practitioner?identifier=<npi system>|<id>`
//! - **Encounters**: `GET /Encounter?participant.identifier=..`, following
//!   the bundle's `next` link for further pages
//! - **Patients**: `GET /Patient/<id>`
//!
//! ## Example
//!
//! ```rust,no_run
//! use vitalwatch_adapters::fhir::FhirClient;
//! use vitalwatch_sdk::PatientDirectory;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = FhirClient::builder().build()?;
//!
//!     if let Some(practitioner) = client.find_practitioner("500").await? {
//!         let page = client.first_encounter_page(&practitioner).await?;
//!         for id in &page.patient_ids {
//!             let patient = client.fetch_patient(id).await?;
//!             println!("{} ({})", patient.full_name(), patient.birth_date);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use vitalwatch_sdk::{MeasurementSource, PatientDirectory, SourceError};
use vitalwatch_types::{
    ComponentReading, EncounterPage, PatientRecord, PractitionerRecord, Quantity, Reading,
    ReadingBundle,
};

use crate::error::{source_error, AdapterError};

/// Public HAPI server the dashboard was built against.
pub const DEFAULT_ENDPOINT: &str = "https://fhir.monash.edu/hapi-fhir-jpaserver/fhir";

/// Identifier system of US National Provider Identifiers.
pub const NPI_SYSTEM: &str = "http://hl7.org/fhir/sid/us-npi";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_PAGE_SIZE: u32 = 50;

/// FHIR client implementing [`MeasurementSource`] and [`PatientDirectory`].
#[derive(Debug, Clone)]
pub struct FhirClient {
    client: Client,
    endpoint: String,
    page_size: u32,
}

impl FhirClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> FhirClientBuilder {
        FhirClientBuilder::default()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SourceError> {
        let url = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.endpoint, path)
        };
        debug!(url = %url, "FHIR request");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(source_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(path.to_string()));
        }

        if !response.status().is_success() {
            return Err(SourceError::Http(format!(
                "API returned status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))
    }
}

#[async_trait]
impl MeasurementSource for FhirClient {
    async fn fetch_latest(
        &self,
        patient_id: &str,
        code: &str,
        limit: u32,
    ) -> Result<ReadingBundle, SourceError> {
        let count = limit.to_string();
        let bundle: Bundle<ObservationResource> = self
            .get(
                "/Observation",
                &[
                    ("patient", patient_id),
                    ("code", code),
                    ("_sort", "-date"),
                    ("_count", count.as_str()),
                ],
            )
            .await?;
        Ok(reading_bundle(bundle))
    }
}

#[async_trait]
impl PatientDirectory for FhirClient {
    async fn find_practitioner(
        &self,
        identifier: &str,
    ) -> Result<Option<PractitionerRecord>, SourceError> {
        let system_id = format!("{}|{}", NPI_SYSTEM, identifier);
        let bundle: Bundle<PractitionerResource> = self
            .get("/Practitioner", &[("identifier", system_id.as_str())])
            .await?;
        Ok(practitioner_record(bundle, &system_id))
    }

    async fn first_encounter_page(
        &self,
        practitioner: &PractitionerRecord,
    ) -> Result<EncounterPage, SourceError> {
        let count = self.page_size.to_string();
        let bundle: Bundle<EncounterResource> = self
            .get(
                "/Encounter",
                &[
                    ("participant.identifier", practitioner.system_id.as_str()),
                    ("_include", "Encounter.participant.individual"),
                    ("_include", "Encounter.patient"),
                    ("_count", count.as_str()),
                ],
            )
            .await?;
        Ok(encounter_page(&self.endpoint, bundle))
    }

    async fn next_encounter_page(
        &self,
        page: &EncounterPage,
    ) -> Result<EncounterPage, SourceError> {
        let next = page
            .next
            .as_deref()
            .ok_or_else(|| SourceError::NotFound("next encounter page".to_string()))?;
        let bundle: Bundle<EncounterResource> = self.get(next, &[]).await?;
        Ok(encounter_page(&self.endpoint, bundle))
    }

    async fn fetch_patient(&self, patient_id: &str) -> Result<PatientRecord, SourceError> {
        let resource: PatientResource = self.get(&format!("/Patient/{}", patient_id), &[]).await?;
        Ok(patient_record(resource))
    }
}

/// Builder for FhirClient.
#[derive(Debug, Default)]
pub struct FhirClientBuilder {
    endpoint: Option<String>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    page_size: Option<u32>,
}

impl FhirClientBuilder {
    /// Set the server base URL (default: [`DEFAULT_ENDPOINT`]).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the connect timeout (default: 30 seconds).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the read timeout (default: 30 seconds).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the number of encounters requested per page (default: 50).
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<FhirClient, AdapterError> {
        let endpoint = self
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(AdapterError::InvalidEndpoint(endpoint));
        }

        let connect_timeout = self.connect_timeout.unwrap_or(DEFAULT_TIMEOUT);
        let read_timeout = self.read_timeout.unwrap_or(DEFAULT_TIMEOUT);

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(connect_timeout + read_timeout)
            .build()
            .map_err(|e| AdapterError::Client(e.to_string()))?;

        Ok(FhirClient {
            client,
            endpoint,
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1),
        })
    }
}

fn reading_bundle(bundle: Bundle<ObservationResource>) -> ReadingBundle {
    let readings: Vec<Reading> = bundle
        .entry
        .into_iter()
        .map(|entry| observation_reading(entry.resource))
        .collect();
    let total = bundle.total.unwrap_or(readings.len() as u64);
    ReadingBundle::new(total, readings)
}

fn observation_reading(resource: ObservationResource) -> Reading {
    Reading {
        time: resource.effective_date_time.unwrap_or_default(),
        value: resource.value_quantity.map(FhirQuantity::into_quantity),
        components: resource
            .component
            .into_iter()
            .filter_map(|component| {
                let label = component.code.text?;
                let quantity = component.value_quantity?.into_quantity();
                Some(ComponentReading::new(label, quantity))
            })
            .collect(),
    }
}

fn encounter_page(endpoint: &str, bundle: Bundle<EncounterResource>) -> EncounterPage {
    let patient_ids = bundle
        .entry
        .into_iter()
        .filter(|entry| entry.resource.resource_type == "Encounter")
        .filter_map(|entry| entry.resource.subject?.reference)
        .filter_map(|reference| patient_id(&reference))
        .collect();
    let next = bundle
        .link
        .into_iter()
        .find(|link| link.relation == "next")
        .map(|link| relative_link(endpoint, &link.url));
    EncounterPage { patient_ids, next }
}

// "Patient/123" -> "123"
fn patient_id(reference: &str) -> Option<String> {
    reference
        .split('/')
        .nth(1)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

// Paging links are absolute; requests are made relative to the endpoint.
fn relative_link(endpoint: &str, url: &str) -> String {
    url.strip_prefix(endpoint).unwrap_or(url).to_string()
}

fn practitioner_record(
    bundle: Bundle<PractitionerResource>,
    searched: &str,
) -> Option<PractitionerRecord> {
    if bundle.total == Some(0) {
        return None;
    }
    let resource = bundle.entry.into_iter().next()?.resource;
    let system_id = resource
        .identifier
        .first()
        .and_then(Identifier::system_id)
        .unwrap_or_else(|| searched.to_string());
    let full_name = resource
        .name
        .first()
        .map(HumanName::full_name_with_prefix)
        .unwrap_or_default();
    Some(PractitionerRecord {
        system_id,
        full_name,
    })
}

fn patient_record(resource: PatientResource) -> PatientRecord {
    let name = resource.name.first();
    PatientRecord {
        id: resource.id,
        given_name: name.map(HumanName::given_name).unwrap_or_default(),
        family_name: name.map(HumanName::family_name).unwrap_or_default(),
        gender: resource.gender.unwrap_or_default(),
        birth_date: resource.birth_date.unwrap_or_default(),
        address: resource
            .address
            .first()
            .map(FhirAddress::display)
            .unwrap_or_default(),
    }
}

// Generated test data suffixes names with digits ("Gonzalo160").
fn strip_digits(s: &str) -> String {
    s.chars().filter(|c| !c.is_ascii_digit()).collect()
}

/// Search result bundle.
///
/// The explicit bound stops the field defaults from requiring `R: Default`.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "R: Deserialize<'de>"))]
struct Bundle<R> {
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    link: Vec<BundleLink>,
    #[serde(default)]
    entry: Vec<BundleEntry<R>>,
}

#[derive(Debug, Deserialize)]
struct BundleLink {
    relation: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct BundleEntry<R> {
    resource: R,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationResource {
    #[serde(default)]
    effective_date_time: Option<String>,
    #[serde(default)]
    value_quantity: Option<FhirQuantity>,
    #[serde(default)]
    component: Vec<ObservationComponent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationComponent {
    #[serde(default)]
    code: CodeableConcept,
    #[serde(default)]
    value_quantity: Option<FhirQuantity>,
}

#[derive(Debug, Default, Deserialize)]
struct CodeableConcept {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FhirQuantity {
    #[serde(default)]
    value: Option<serde_json::Value>,
    #[serde(default)]
    unit: Option<String>,
}

impl FhirQuantity {
    fn into_quantity(self) -> Quantity {
        let value = match self.value {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Quantity::new(value, self.unit.unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncounterResource {
    resource_type: String,
    #[serde(default)]
    subject: Option<Reference>,
}

#[derive(Debug, Deserialize)]
struct Reference {
    #[serde(default)]
    reference: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatientResource {
    id: String,
    #[serde(default)]
    name: Vec<HumanName>,
    #[serde(default)]
    gender: Option<String>,
    #[serde(default)]
    birth_date: Option<String>,
    #[serde(default)]
    address: Vec<FhirAddress>,
}

#[derive(Debug, Deserialize)]
struct PractitionerResource {
    #[serde(default)]
    name: Vec<HumanName>,
    #[serde(default)]
    identifier: Vec<Identifier>,
}

#[derive(Debug, Default, Deserialize)]
struct HumanName {
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    given: Vec<String>,
    #[serde(default)]
    prefix: Vec<String>,
}

impl HumanName {
    fn given_name(&self) -> String {
        self.given
            .iter()
            .map(|given| strip_digits(given))
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }

    fn family_name(&self) -> String {
        self.family.as_deref().map(strip_digits).unwrap_or_default()
    }

    fn full_name_with_prefix(&self) -> String {
        [
            self.prefix.first().cloned().unwrap_or_default(),
            self.given_name(),
            self.family_name(),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[derive(Debug, Deserialize)]
struct Identifier {
    #[serde(default)]
    system: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

impl Identifier {
    fn system_id(&self) -> Option<String> {
        Some(format!("{}|{}", self.system.as_deref()?, self.value.as_deref()?))
    }
}

#[derive(Debug, Deserialize)]
struct FhirAddress {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl FhirAddress {
    fn display(&self) -> String {
        [&self.city, &self.state, &self.country]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse<T: DeserializeOwned>(value: serde_json::Value) -> T {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let client = FhirClient::builder().build().unwrap();
        assert_eq!(client.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(client.page_size, 50);
    }

    #[test]
    fn test_builder_custom() {
        let client = FhirClient::builder()
            .endpoint("http://localhost:8080/fhir/")
            .connect_timeout(Duration::from_secs(5))
            .read_timeout(Duration::from_secs(5))
            .page_size(10)
            .build()
            .unwrap();

        assert_eq!(client.endpoint(), "http://localhost:8080/fhir");
        assert_eq!(client.page_size, 10);
    }

    #[test]
    fn test_builder_rejects_relative_endpoint() {
        let err = FhirClient::builder().endpoint("fhir.local").build().unwrap_err();
        assert!(matches!(err, AdapterError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_scalar_observation() {
        let bundle: Bundle<ObservationResource> = parse(json!({
            "resourceType": "Bundle",
            "total": 12,
            "entry": [{
                "resource": {
                    "resourceType": "Observation",
                    "effectiveDateTime": "2021-01-01T10:00:00+10:00",
                    "valueQuantity": { "value": 181.6, "unit": "mg/dL" }
                }
            }]
        }));

        let readings = reading_bundle(bundle);
        assert_eq!(readings.total, 12);

        let latest = readings.latest().unwrap();
        assert_eq!(latest.time, "2021-01-01T10:00:00+10:00");
        let value = latest.value.as_ref().unwrap();
        assert_eq!(value.value, "181.6");
        assert_eq!(value.unit, "mg/dL");
    }

    #[test]
    fn test_component_observation() {
        let bundle: Bundle<ObservationResource> = parse(json!({
            "total": 1,
            "entry": [{
                "resource": {
                    "effectiveDateTime": "2020-03-04T05:06:07Z",
                    "component": [
                        {
                            "code": { "text": "Diastolic Blood Pressure" },
                            "valueQuantity": { "value": 90, "unit": "mmHg" }
                        },
                        {
                            "code": { "text": "Systolic Blood Pressure" },
                            "valueQuantity": { "value": 140, "unit": "mmHg" }
                        },
                        { "code": {} }
                    ]
                }
            }]
        }));

        let readings = reading_bundle(bundle);
        let latest = readings.latest().unwrap();
        assert!(latest.value.is_none());
        assert_eq!(latest.components.len(), 2);
        assert_eq!(latest.components[1].label, "Systolic Blood Pressure");
        assert_eq!(latest.components[1].quantity.value, "140");
        assert_eq!(latest.components[1].quantity.unit, "mmHg");
    }

    #[test]
    fn test_empty_observation_bundle() {
        let bundle: Bundle<ObservationResource> = parse(json!({ "total": 0 }));
        let readings = reading_bundle(bundle);
        assert!(readings.is_empty());
        assert!(readings.latest().is_none());
    }

    #[test]
    fn test_encounter_page() {
        let bundle: Bundle<EncounterResource> = parse(json!({
            "link": [
                { "relation": "self", "url": "https://fhir.example/fhir/Encounter?x" },
                {
                    "relation": "next",
                    "url": "https://fhir.example/fhir?_getpages=abc&_getpagesoffset=50"
                }
            ],
            "entry": [
                { "resource": { "resourceType": "Encounter", "subject": { "reference": "Patient/29163" } } },
                { "resource": { "resourceType": "Encounter", "subject": { "reference": "Patient/29163" } } },
                { "resource": { "resourceType": "Encounter", "subject": { "reference": "Patient/8" } } },
                { "resource": { "resourceType": "Patient", "id": "29163" } },
                { "resource": { "resourceType": "Practitioner", "id": "500" } }
            ]
        }));

        let page = encounter_page("https://fhir.example/fhir", bundle);
        assert_eq!(page.patient_ids, vec!["29163", "29163", "8"]);
        assert_eq!(
            page.next.as_deref(),
            Some("?_getpages=abc&_getpagesoffset=50")
        );
    }

    #[test]
    fn test_last_encounter_page() {
        let bundle: Bundle<EncounterResource> = parse(json!({ "entry": [] }));
        let page = encounter_page(DEFAULT_ENDPOINT, bundle);
        assert!(page.patient_ids.is_empty());
        assert!(!page.has_next());
    }

    #[test]
    fn test_bundles_default_missing_fields_for_every_resource() {
        fn empty<R: DeserializeOwned>() -> Bundle<R> {
            parse(json!({ "resourceType": "Bundle" }))
        }

        let observations = empty::<ObservationResource>();
        let encounters = empty::<EncounterResource>();
        let practitioners = empty::<PractitionerResource>();

        assert!(observations.entry.is_empty() && observations.total.is_none());
        assert!(encounters.link.is_empty() && encounters.entry.is_empty());
        assert!(practitioners.entry.is_empty());
    }

    #[test]
    fn test_patient_id() {
        assert_eq!(patient_id("Patient/123").as_deref(), Some("123"));
        assert_eq!(patient_id("Patient/"), None);
        assert_eq!(patient_id("123"), None);
    }

    #[test]
    fn test_patient_record() {
        let resource: PatientResource = parse(json!({
            "resourceType": "Patient",
            "id": "29163",
            "name": [{ "family": "Rutherford999", "given": ["Gonzalo160", "J."] }],
            "gender": "male",
            "birthDate": "1960-05-12",
            "address": [{ "city": "Boston", "state": "Massachusetts", "country": "US" }]
        }));

        let patient = patient_record(resource);
        assert_eq!(patient.id, "29163");
        assert_eq!(patient.given_name, "Gonzalo J.");
        assert_eq!(patient.family_name, "Rutherford");
        assert_eq!(patient.full_name(), "Gonzalo J. Rutherford");
        assert_eq!(patient.gender, "male");
        assert_eq!(patient.birth_date, "1960-05-12");
        assert_eq!(patient.address, "Boston, Massachusetts, US");
    }

    #[test]
    fn test_patient_record_with_missing_fields() {
        let resource: PatientResource = parse(json!({ "id": "1" }));
        let patient = patient_record(resource);
        assert_eq!(patient.given_name, "");
        assert_eq!(patient.address, "");
    }

    #[test]
    fn test_practitioner_record() {
        let bundle: Bundle<PractitionerResource> = parse(json!({
            "total": 1,
            "entry": [{
                "resource": {
                    "name": [{ "prefix": ["Dr."], "given": ["Jaime666"], "family": "Ramos50" }],
                    "identifier": [{ "system": NPI_SYSTEM, "value": "500" }]
                }
            }]
        }));

        let practitioner = practitioner_record(bundle, "ignored").unwrap();
        assert_eq!(practitioner.system_id, "http://hl7.org/fhir/sid/us-npi|500");
        assert_eq!(practitioner.full_name, "Dr. Jaime Ramos");
    }

    #[test]
    fn test_unknown_practitioner() {
        let bundle: Bundle<PractitionerResource> = parse(json!({ "total": 0 }));
        assert!(practitioner_record(bundle, "x|1").is_none());
    }

    #[test]
    fn test_relative_link() {
        assert_eq!(
            relative_link("https://fhir.example/fhir", "https://fhir.example/fhir?_getpages=1"),
            "?_getpages=1"
        );
        assert_eq!(
            relative_link("https://fhir.example/fhir", "https://other/fhir?_getpages=1"),
            "https://other/fhir?_getpages=1"
        );
    }
}
