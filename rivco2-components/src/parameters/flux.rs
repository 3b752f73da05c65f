//! Flux Aggregation Parameters
//!
//! Unit conversions and lake size classes used to turn per-reach fluxes into
//! basin totals.

use rivco2_core::values::FloatValue;
use serde::{Deserialize, Serialize};

/// Grams to teragrams.
pub const G_TO_TG: FloatValue = 1e-12;

/// Square metres to square kilometres.
pub const M2_TO_KM2: FloatValue = 1e-6;

/// Molar mass of carbon (g/mol).
pub const CARBON_MOLAR_MASS: FloatValue = 12.011;

/// Litres per cubic metre.
pub const LITRES_PER_M3: FloatValue = 1000.0;

/// Days per year.
pub const DAYS_PER_YEAR: FloatValue = 365.0;

/// Conversion from (m/day) x (ppm) x (mol L^-1 atm^-1) to g C m^-2 yr^-1.
///
/// ppm is taken as micro-atmospheres of partial pressure.
pub const AREAL_FLUX_FACTOR: FloatValue =
    1e-6 * LITRES_PER_M3 * CARBON_MOLAR_MASS * DAYS_PER_YEAR;

/// Parameters for basin flux aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluxParameters {
    /// Upper edges of the lake surface area bins; one more open-ended bin
    /// collects everything above the last edge.
    /// unit: km^2
    /// default: [0.001, 0.01, 0.1, 1.0, 10.0, 100.0]
    pub lake_bin_edges_km2: Vec<FloatValue>,
}

impl Default for FluxParameters {
    fn default() -> Self {
        Self {
            lake_bin_edges_km2: vec![0.001, 0.01, 0.1, 1.0, 10.0, 100.0],
        }
    }
}

impl FluxParameters {
    /// Number of lake area bins, including the open-ended bin
    pub fn n_lake_bins(&self) -> usize {
        self.lake_bin_edges_km2.len() + 1
    }

    /// Index of the bin containing `area_km2`.
    ///
    /// Areas equal to an edge belong to the lower bin. Missing areas fall in no bin.
    pub fn lake_bin(&self, area_km2: FloatValue) -> Option<usize> {
        if area_km2.is_nan() {
            return None;
        }
        Some(
            self.lake_bin_edges_km2
                .iter()
                .position(|edge| area_km2 <= *edge)
                .unwrap_or(self.lake_bin_edges_km2.len()),
        )
    }

    /// Label of a bin: its upper edge, or `>last` for the open-ended bin
    pub fn lake_bin_label(&self, bin: usize) -> String {
        match self.lake_bin_edges_km2.get(bin) {
            Some(edge) => format!("{}", edge),
            None => format!(
                ">{}",
                self.lake_bin_edges_km2.last().copied().unwrap_or(0.0)
            ),
        }
    }
}
