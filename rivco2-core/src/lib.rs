//! Core data model for river and lake CO2 outgassing models
//!
//! - [`values`]: the missing-value sentinel and missing-aware statistics
//! - [`reach`]: reaches, waterbody variants and per-basin reach tables
//! - [`basin`]: basin codes, the basin lookup table and the basin routing graph
//! - [`config`]: explicit run configuration
pub mod basin;
pub mod config;
pub mod reach;
pub mod values;

pub mod errors;
