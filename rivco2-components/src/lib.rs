//! River and lake CO2 components
//!
//! Per-reach physics and basin-level processing for estimating CO2 outgassing
//! from river networks and the lakes and reservoirs embedded in them.
//!
//! # Module Organisation
//!
//! - `hydraulics`: width, depth, velocity, residence time and surface area
//! - `gas_exchange`: Henry's constant, Schmidt number, k600, kCO2 and benthic exchange
//! - `gap_fill`: one-hop neighbour imputation of slopes and temperatures
//! - `routing`: export records linking a basin to its downstream basins
//! - `flux`: reach fluxes, basin and network summaries
//! - `model`: basin and network runs tying the stages together
//!
//! # Parameters
//!
//! Components with tunable coefficients have an associated parameters struct in
//! the `parameters` module whose defaults match the published fits.

pub mod flux;
pub mod gap_fill;
pub mod gas_exchange;
pub mod hydraulics;
pub mod model;
pub mod parameters;
pub mod routing;
