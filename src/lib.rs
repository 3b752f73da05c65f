//! Riverine and lacustrine CO2 outgassing for drainage-basin networks
//!
//! This crate re-exports the data model from `rivco2-core` and the components
//! from `rivco2-components`. With the `python` feature enabled it also builds
//! the `rivco2._lib` extension module.

pub use rivco2_components::{flux, gap_fill, gas_exchange, hydraulics, model, parameters, routing};
pub use rivco2_core::{basin, config, errors, reach, values};

#[cfg(feature = "python")]
mod python;
