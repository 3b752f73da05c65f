//! Component parameters
//!
//! Each parameter struct provides defaults matching the published fits the
//! model is built on.

mod flux;
mod gas_exchange;

pub use flux::{
    FluxParameters, AREAL_FLUX_FACTOR, CARBON_MOLAR_MASS, DAYS_PER_YEAR, G_TO_TG,
    LITRES_PER_M3, M2_TO_KM2,
};
pub use gas_exchange::{GasExchangeParameters, GRAVITY, SCHMIDT_REFERENCE, SECONDS_PER_DAY};
