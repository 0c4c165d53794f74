//! # vitalwatch-types
//!
//! Core types for patient biometric monitoring. This crate defines the shared
//! vocabulary used by the monitoring engine, the data-source adapters and the
//! dashboard binary.
//!
//! ## Design Goals
//!
//! - **Typed keys**: a tracked observation is identified by a [`MonitorKey`]
//!   (metric kind + patient id), never by an ad-hoc joined string
//! - **Raw readings**: values arrive as the text the source sent, so the
//!   engine decides how malformed readings are treated
//! - **Optional serialization**: enable the `serde` feature as needed
//!
//! ## Example
//!
//! ```rust
//! use vitalwatch_types::{Component, MetricKind, MonitorKey};
//!
//! let key = MonitorKey::new(MetricKind::BloodPressure, "123");
//! assert_eq!(key.to_string(), "55284-4,123");
//! assert_eq!(
//!     MetricKind::BloodPressure.components(),
//!     &[Component::Systolic, Component::Diastolic]
//! );
//!
//! let parsed: MonitorKey = "2093-3,123".parse().unwrap();
//! assert_eq!(parsed.kind, MetricKind::Cholesterol);
//! ```

mod key;
mod metric;
mod patient;
mod reading;
mod threshold;

pub use key::*;
pub use metric::*;
pub use patient::*;
pub use reading::*;
pub use threshold::*;
