//! Gas Exchange Parameters
//!
//! Empirical coefficients for CO2 solubility, gas transfer and benthic
//! exchange in rivers and lakes.
//!
//! # References
//!
//! - Henry's law constant: Plummer & Busenberg (1982) fit for CO2 solubility in water.
//! - Schmidt number: Wanninkhof (1992) freshwater polynomial, as used by Raymond et al. (2012).
//! - River k600: Ulseth et al. (2019), piecewise regression on energy dissipation.
//! - Lake k600: size-class values from Raymond et al. (2013).

use rivco2_core::reach::Waterbody;
use rivco2_core::values::FloatValue;
use serde::{Deserialize, Serialize};

/// Acceleration due to gravity (m/s^2), as used in the source regressions.
pub const GRAVITY: FloatValue = 9.8;

/// Seconds per day.
pub const SECONDS_PER_DAY: FloatValue = 86400.0;

/// Reference Schmidt number that k600 is normalised to.
pub const SCHMIDT_REFERENCE: FloatValue = 600.0;

/// Parameters for gas exchange calculations.
///
/// # Henry's law
///
/// $$\log_{10} K_H = A + B T_k + \frac{C}{T_k} + D \log_{10} T_k + \frac{E}{T_k^2}$$
///
/// # River gas transfer
///
/// With energy dissipation $eD = g v S$:
///
/// $$k_{600} = \begin{cases} e^{a_{low} + b_{low} \ln eD} & eD \le eD_{crit} \\ e^{a_{high} + b_{high} \ln eD} & eD > eD_{crit} \end{cases}$$
///
/// # Benthic exchange
///
/// With shear velocity $U_* = \sqrt{g d S}$ the benthic rate is
/// $c \, U_* \, Sc^{n} / d$ with per-waterbody coefficient $c$ and exponent $n$.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasExchangeParameters {
    /// Henry's law fit coefficients [A, B, C, D, E].
    /// unit: mol L^-1 atm^-1 (result)
    /// default: [108.3865, 0.01985076, -6919.53, -40.4515, 669365.0]
    pub henry_coefficients: [FloatValue; 5],

    /// Schmidt number polynomial coefficients in ascending powers of T (degC).
    /// default: [1911.0, -118.11, 3.453, -0.0413]
    pub schmidt_coefficients: [FloatValue; 4],

    /// Energy dissipation at which the river k600 regression switches regime.
    /// unit: m^2/s^3
    /// default: 0.02
    pub energy_threshold: FloatValue,

    /// Intercept and slope of ln(k600) against ln(eD) below the threshold.
    /// default: (3.10, 0.35)
    pub k600_low_energy: (FloatValue, FloatValue),

    /// Intercept and slope of ln(k600) against ln(eD) above the threshold.
    /// default: (6.43, 1.18)
    pub k600_high_energy: (FloatValue, FloatValue),

    /// Upper edges of the lake surface area classes.
    /// unit: km^2
    /// default: [0.1, 1.0, 10.0]
    pub lake_area_breaks_km2: [FloatValue; 3],

    /// Lake k600 for each area class, the last applying above the largest break.
    /// unit: m/day
    /// default: [0.54, 1.16, 1.32, 1.90]
    pub lake_k600_m_d: [FloatValue; 4],

    /// River benthic exchange coefficient.
    /// default: 0.3
    pub benthic_coefficient_river: FloatValue,

    /// Schmidt number exponent for river benthic exchange.
    /// default: -2/3
    pub benthic_schmidt_exponent_river: FloatValue,

    /// Lake benthic exchange coefficient.
    /// default: 1/9
    pub benthic_coefficient_lake: FloatValue,

    /// Schmidt number exponent for lake benthic exchange.
    /// default: -1/2
    pub benthic_schmidt_exponent_lake: FloatValue,
}

impl GasExchangeParameters {
    pub const STANDARD: GasExchangeParameters = GasExchangeParameters {
        henry_coefficients: [108.3865, 0.01985076, -6919.53, -40.4515, 669365.0],
        schmidt_coefficients: [1911.0, -118.11, 3.453, -0.0413],
        energy_threshold: 0.02,
        k600_low_energy: (3.10, 0.35),
        k600_high_energy: (6.43, 1.18),
        lake_area_breaks_km2: [0.1, 1.0, 10.0],
        lake_k600_m_d: [0.54, 1.16, 1.32, 1.90],
        benthic_coefficient_river: 0.3,
        benthic_schmidt_exponent_river: -2.0 / 3.0,
        benthic_coefficient_lake: 1.0 / 9.0,
        benthic_schmidt_exponent_lake: -0.5,
    };

    /// Henry's law constant for CO2 (mol L^-1 atm^-1).
    ///
    /// Defined for every temperature above absolute zero.
    pub fn henry_constant(&self, temp_c: FloatValue) -> FloatValue {
        let [a, b, c, d, e] = self.henry_coefficients;
        let t_k = temp_c + 273.15;
        let log_k = a + b * t_k + c / t_k + d * t_k.log10() + e / t_k.powi(2);
        10.0_f64.powf(log_k)
    }

    /// Schmidt number of CO2 in fresh water.
    ///
    /// No bounds checking is done; callers must supply plausible temperatures.
    pub fn schmidt_number(&self, temp_c: FloatValue) -> FloatValue {
        let [c0, c1, c2, c3] = self.schmidt_coefficients;
        c0 + c1 * temp_c + c2 * temp_c.powi(2) + c3 * temp_c.powi(3)
    }

    /// River k600 (m/day) from energy dissipation (m^2/s^3).
    ///
    /// The threshold itself belongs to the low-energy regime.
    pub fn k600_from_energy(&self, energy_dissipation: FloatValue) -> FloatValue {
        let (intercept, slope) = if energy_dissipation <= self.energy_threshold {
            self.k600_low_energy
        } else {
            self.k600_high_energy
        };
        (intercept + slope * energy_dissipation.ln()).exp()
    }

    /// Lake k600 (m/day) from surface area (km^2).
    ///
    /// Areas equal to a break belong to the smaller class.
    pub fn k600_from_lake_area(&self, area_km2: FloatValue) -> FloatValue {
        if area_km2.is_nan() {
            return FloatValue::NAN;
        }
        let class = self
            .lake_area_breaks_km2
            .iter()
            .position(|edge| area_km2 <= *edge)
            .unwrap_or(self.lake_area_breaks_km2.len());
        self.lake_k600_m_d[class]
    }

    /// Benthic exchange coefficient and Schmidt exponent for a waterbody
    pub fn benthic_terms(&self, waterbody: Waterbody) -> (FloatValue, FloatValue) {
        match waterbody {
            Waterbody::River => (
                self.benthic_coefficient_river,
                self.benthic_schmidt_exponent_river,
            ),
            Waterbody::LakeReservoir => (
                self.benthic_coefficient_lake,
                self.benthic_schmidt_exponent_lake,
            ),
        }
    }
}

impl Default for GasExchangeParameters {
    fn default() -> Self {
        Self::STANDARD
    }
}
