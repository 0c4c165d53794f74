//! # vitalwatch-adapters
//!
//! Measurement sources and patient directories for vitalwatch.
//!
//! ## Supported Services
//!
//! - **FHIR R4** (`fhir` feature) - Reads observations, encounters, patients
//!   and practitioners through the FHIR REST search API
//!
//! ## Quick Start (FHIR)
//!
//! ```rust,no_run
//! use vitalwatch_adapters::fhir::FhirClient;
//! use vitalwatch_sdk::MeasurementSource;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = FhirClient::builder()
//!         .endpoint("https://fhir.monash.edu/hapi-fhir-jpaserver/fhir")
//!         .connect_timeout(Duration::from_secs(30))
//!         .build()?;
//!
//!     // Newest total cholesterol reading for patient 1
//!     let bundle = client.fetch_latest("1", "2093-3", 1).await?;
//!
//!     println!("{} readings on record", bundle.total);
//!     Ok(())
//! }
//! ```

pub mod error;

#[cfg(feature = "fhir")]
pub mod fhir;

pub use error::AdapterError;

// Re-export types for convenience
pub use vitalwatch_sdk::{MeasurementSource, PatientDirectory, SourceError};
