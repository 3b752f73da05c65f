//! Model configuration
//!
//! All region-specific data the model consumes (exclusion lists, correction
//! tables, calibrated coefficients) lives in a [`ModelConfig`] that is passed
//! explicitly to the basin and network entry points. A configuration can be
//! read from TOML:
//!
//! ```rust
//! use rivco2_core::config::ModelConfig;
//!
//! let config = ModelConfig::from_toml_str(r#"
//!     data_root = "/data/nhd"
//!     excluded_basins = ["0418", "0419"]
//!
//!     [calibration]
//!     benthic_multiplier_river = 1.5
//!     fitness = 4.0
//! "#).unwrap();
//!
//! assert_eq!(config.excluded_basins.len(), 2);
//! assert_eq!(config.calibration.benthic_multiplier_river, 1.5);
//! assert_eq!(config.calibration.benthic_multiplier_lake, 1.0);
//! ```

use crate::basin::BasinCode;
use crate::errors::RivCO2Result;
use crate::reach::ReachId;
use crate::values::FloatValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Minimum realistic channel slope used when no neighbour slope is usable.
pub const DEFAULT_SLOPE_FLOOR: FloatValue = 1e-5;

/// Atmospheric CO2 partial pressure (ppm) used as the equilibrium reference.
pub const DEFAULT_ATMOSPHERIC_CO2_PPM: FloatValue = 390.0;

/// Great Lakes basins, whose open-water units are excluded from basin summaries.
pub const GREAT_LAKES_BASINS: [&str; 7] = ["0418", "0419", "0420", "0421", "0422", "0423", "0424"];

/// Scalars produced by the calibration harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalibratedCoefficients {
    /// Multiplier applied to the river benthic exchange rate.
    /// default: 1.0
    pub benthic_multiplier_river: FloatValue,
    /// Multiplier applied to the lake/reservoir benthic exchange rate.
    /// default: 1.0
    pub benthic_multiplier_lake: FloatValue,
    /// Fraction of lateral inorganic carbon attributed to weathering rather
    /// than respiration. Passed to the transport solver.
    /// default: 0.0
    pub weathering_fraction: FloatValue,
    /// Fitness of the calibrated parameter set (larger is better).
    /// default: 1.0
    pub fitness: FloatValue,
}

impl Default for CalibratedCoefficients {
    fn default() -> Self {
        Self {
            benthic_multiplier_river: 1.0,
            benthic_multiplier_lake: 1.0,
            weathering_fraction: 0.0,
            fitness: 1.0,
        }
    }
}

/// Reaches with artificial shoreline-river geometry that must not contribute flux.
///
/// Only basins listed in `basins` are corrected; within them the reaches in
/// `flagged_reaches` have their flux, width and length zeroed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShorelineCorrection {
    pub basins: BTreeSet<BasinCode>,
    pub flagged_reaches: BTreeMap<BasinCode, BTreeSet<ReachId>>,
}

impl ShorelineCorrection {
    pub fn applies_to(&self, basin: &BasinCode) -> bool {
        self.basins.contains(basin)
    }

    /// Whether a reach of `basin` is flagged for correction
    pub fn is_flagged(&self, basin: &BasinCode, reach: ReachId) -> bool {
        self.applies_to(basin)
            && self
                .flagged_reaches
                .get(basin)
                .is_some_and(|ids| ids.contains(&reach))
    }
}

/// Configuration for a model run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Root directory of the external hydrography data
    pub data_root: PathBuf,
    /// Basins excluded from summary statistics
    pub excluded_basins: BTreeSet<BasinCode>,
    pub shoreline_correction: ShorelineCorrection,
    /// Basins whose hydrography carries no stream-level attribute
    pub indiana_exception_basins: BTreeSet<BasinCode>,
    /// Slope assigned when gap filling finds no usable neighbour (m/m)
    pub slope_floor: FloatValue,
    /// Atmospheric CO2 (ppm)
    pub atmospheric_co2_ppm: FloatValue,
    pub calibration: CalibratedCoefficients,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::new(),
            excluded_basins: GREAT_LAKES_BASINS
                .iter()
                .filter_map(|c| BasinCode::new(c).ok())
                .collect(),
            shoreline_correction: ShorelineCorrection::default(),
            indiana_exception_basins: BTreeSet::new(),
            slope_floor: DEFAULT_SLOPE_FLOOR,
            atmospheric_co2_ppm: DEFAULT_ATMOSPHERIC_CO2_PPM,
            calibration: CalibratedCoefficients::default(),
        }
    }
}

impl ModelConfig {
    pub fn from_toml_str(s: &str) -> RivCO2Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> RivCO2Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn is_excluded(&self, basin: &BasinCode) -> bool {
        self.excluded_basins.contains(basin)
    }

    pub fn is_indiana_exception(&self, basin: &BasinCode) -> bool {
        self.indiana_exception_basins.contains(basin)
    }

    /// Directory holding the hydrography of one basin
    pub fn basin_dir(&self, basin: &BasinCode) -> PathBuf {
        self.data_root.join(basin.region()).join(basin.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RivCO2Error;

    fn code(s: &str) -> BasinCode {
        BasinCode::new(s).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();
        assert!(config.is_excluded(&code("0418")));
        assert!(!config.is_excluded(&code("0101")));
        assert_eq!(config.slope_floor, 1e-5);
        assert_eq!(config.calibration.fitness, 1.0);
    }

    #[test]
    fn test_from_toml_with_corrections() {
        let config = ModelConfig::from_toml_str(
            r#"
            excluded_basins = []
            indiana_exception_basins = ["0512"]
            slope_floor = 2e-5

            [shoreline_correction]
            basins = ["0430"]
            flagged_reaches = { "0430" = [11, 12] }
            "#,
        )
        .unwrap();

        assert!(config.excluded_basins.is_empty());
        assert!(config.is_indiana_exception(&code("0512")));
        assert_eq!(config.slope_floor, 2e-5);
        assert!(config.shoreline_correction.is_flagged(&code("0430"), 11));
        assert!(!config.shoreline_correction.is_flagged(&code("0430"), 13));
        assert!(!config.shoreline_correction.is_flagged(&code("0431"), 11));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result = ModelConfig::from_toml_str("slope_flor = 1.0");
        assert!(matches!(result, Err(RivCO2Error::Config(_))));
    }

    #[test]
    fn test_invalid_basin_code_rejected() {
        assert!(ModelConfig::from_toml_str(r#"excluded_basins = ["41"]"#).is_err());
    }

    #[test]
    fn test_basin_dir() {
        let config = ModelConfig {
            data_root: PathBuf::from("/data"),
            ..ModelConfig::default()
        };
        assert_eq!(
            config.basin_dir(&code("0512")),
            PathBuf::from("/data/05/0512")
        );
    }
}
