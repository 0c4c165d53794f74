//! # vitalwatch
//!
//! A terminal dashboard that keeps a practitioner's patient biometrics up to
//! date.
//!
//! A practitioner logs in with their identifier, which loads the patients
//! they have seen from the health records service. Cholesterol and blood
//! pressure can then be tracked per patient; tracked readings are refreshed
//! on a fixed frequency, the cholesterol average is recomputed after every
//! refresh, and blood pressure readings above the configured thresholds are
//! flagged.
//!
//! ```text
//!   shell ──▶ Dashboard ──▶ TaskDispatcher ──▶ UpdateScheduler
//!                │                 │
//!                ▼                 ▼
//!             Roster         MonitorTask (per metric) ──▶ MeasurementSource
//!                                  │
//!                                  ▼
//!                            Observation ──▶ ReadingMonitor ──▶ Presenter
//! ```
//!
//! - **[`app`]**: the session, tracking and user-adjustable settings
//! - **[`roster`]**: practitioner lookup and patient loading
//! - **[`config`]**: layered settings (defaults, file, environment, flags)
//! - **[`presenter`]**: plain-text output
//! - **[`shell`]**: the interactive command loop

pub mod app;
pub mod config;
pub mod error;
pub mod input;
pub mod presenter;
pub mod roster;
pub mod shell;

pub use app::{Dashboard, TrackOutcome};
pub use config::{Overrides, Settings, SettingsError};
pub use error::DashboardError;
pub use presenter::ConsolePresenter;
pub use roster::Roster;
