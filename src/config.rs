//! Layered configuration.
//!
//! Settings are resolved in order, later layers winning:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file (`--config`)
//! 3. Environment variables prefixed with `VITALWATCH_`, nested keys joined
//!    with `__` (e.g. `VITALWATCH_SCHEDULER__FREQUENCY_SECS=30`)
//! 4. Command-line flags
//!
//! ```toml
//! log_level = "debug"
//!
//! [source]
//! base_url = "http://localhost:8080/fhir"
//!
//! [scheduler]
//! frequency_secs = 30
//!
//! [thresholds]
//! systolic = 130
//! diastolic = 85
//!
//! [labels]
//! "Systolic blood pressure" = "SYSTOLIC"
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use vitalwatch_adapters::fhir::DEFAULT_ENDPOINT;
use vitalwatch_sdk::ComponentLabels;
use vitalwatch_types::{Component, ThresholdPair};

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Load(#[from] ConfigError),

    #[error("label {label:?} maps to unknown component {component:?}")]
    UnknownComponent { label: String, component: String },

    #[error("scheduler.frequency_secs ({frequency}) is below scheduler.min_frequency_secs ({min})")]
    FrequencyBelowMinimum { frequency: u64, min: u64 },

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl SourceSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    pub frequency_secs: u64,
    pub min_frequency_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterSettings {
    /// Maximum number of encounter pages walked per practitioner.
    pub page_limit: usize,
    pub page_size: u32,
}

/// Initial blood pressure thresholds. Applied only when both are set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThresholdSettings {
    pub systolic: Option<u32>,
    pub diastolic: Option<u32>,
}

impl ThresholdSettings {
    pub fn pair(&self) -> Option<ThresholdPair> {
        Some(ThresholdPair::new(self.systolic?, self.diastolic?))
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub source: SourceSettings,
    pub scheduler: SchedulerSettings,
    pub roster: RosterSettings,
    #[serde(default)]
    pub thresholds: ThresholdSettings,
    /// Extra component labels, label text to component key.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub log_level: String,
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub frequency_secs: Option<u64>,
    pub log_level: Option<String>,
}

impl Settings {
    /// Resolve settings from every layer.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self, SettingsError> {
        let mut builder = Config::builder()
            .set_default("source.base_url", DEFAULT_ENDPOINT)?
            .set_default("source.connect_timeout_secs", 30_i64)?
            .set_default("source.read_timeout_secs", 30_i64)?
            .set_default("scheduler.frequency_secs", 60_i64)?
            .set_default("scheduler.min_frequency_secs", 5_i64)?
            .set_default("roster.page_limit", 5_i64)?
            .set_default("roster.page_size", 50_i64)?
            .set_default("log_level", "info")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("VITALWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("source.base_url", overrides.base_url.clone())?
            .set_override_option("scheduler.frequency_secs", overrides.frequency_secs)?
            .set_override_option("log_level", overrides.log_level.clone())?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.scheduler.min_frequency_secs == 0 {
            return Err(SettingsError::NotPositive("scheduler.min_frequency_secs"));
        }
        if self.scheduler.frequency_secs < self.scheduler.min_frequency_secs {
            return Err(SettingsError::FrequencyBelowMinimum {
                frequency: self.scheduler.frequency_secs,
                min: self.scheduler.min_frequency_secs,
            });
        }
        if self.roster.page_limit == 0 {
            return Err(SettingsError::NotPositive("roster.page_limit"));
        }
        if self.thresholds.systolic == Some(0) {
            return Err(SettingsError::NotPositive("thresholds.systolic"));
        }
        if self.thresholds.diastolic == Some(0) {
            return Err(SettingsError::NotPositive("thresholds.diastolic"));
        }
        self.component_labels().map(|_| ())
    }

    /// The default label table extended with the configured labels.
    pub fn component_labels(&self) -> Result<ComponentLabels, SettingsError> {
        let mut labels = ComponentLabels::default();
        for (label, component) in &self.labels {
            let parsed: Component =
                component
                    .parse()
                    .map_err(|_| SettingsError::UnknownComponent {
                        label: label.clone(),
                        component: component.clone(),
                    })?;
            labels.insert(label.clone(), parsed);
        }
        Ok(labels)
    }

    pub fn frequency(&self) -> Duration {
        Duration::from_secs(self.scheduler.frequency_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: SourceSettings {
                base_url: DEFAULT_ENDPOINT.to_string(),
                connect_timeout_secs: 30,
                read_timeout_secs: 30,
            },
            scheduler: SchedulerSettings {
                frequency_secs: 60,
                min_frequency_secs: 5,
            },
            roster: RosterSettings {
                page_limit: 5,
                page_size: 50,
            },
            thresholds: ThresholdSettings::default(),
            labels: BTreeMap::new(),
            log_level: "info".to_string(),
        }
    }
}
