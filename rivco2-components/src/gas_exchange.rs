//! Gas exchange
//!
//! Solubility, air-water gas transfer and benthic exchange rate constants for a
//! reach. The free functions use [`GasExchangeParameters::STANDARD`]; the
//! [`GasExchange`] component carries its own parameters and fills the derived
//! fields of a [`Reach`] in place.
//!
//! Every function here is a pure function of scalar physical quantities, so
//! reaches can be processed in any order or in parallel.

use crate::parameters::{GasExchangeParameters, GRAVITY, SCHMIDT_REFERENCE, SECONDS_PER_DAY};
use rivco2_core::config::CalibratedCoefficients;
use rivco2_core::reach::{Reach, Waterbody};
use rivco2_core::values::FloatValue;
use serde::{Deserialize, Serialize};

/// Henry's law constant for CO2 (mol L^-1 atm^-1)
pub fn henry_constant(temp_c: FloatValue) -> FloatValue {
    GasExchangeParameters::STANDARD.henry_constant(temp_c)
}

/// Schmidt number of CO2 in fresh water
pub fn schmidt_number(temp_c: FloatValue) -> FloatValue {
    GasExchangeParameters::STANDARD.schmidt_number(temp_c)
}

/// River gas transfer velocity k600 (m/day) from velocity (m/s) and slope
pub fn k600_river(velocity: FloatValue, slope: FloatValue) -> FloatValue {
    GasExchangeParameters::STANDARD.k600_from_energy(GRAVITY * velocity * slope)
}

/// Lake gas transfer velocity k600 (m/day) from surface area (km^2)
pub fn k600_lake(area_km2: FloatValue) -> FloatValue {
    GasExchangeParameters::STANDARD.k600_from_lake_area(area_km2)
}

/// CO2 gas transfer velocity (m/day) scaled from k600 by the Schmidt number
///
/// $$k_{CO2} = \frac{k_{600}}{(600 / Sc)^{-1/2}}$$
pub fn k_co2_velocity(k600: FloatValue, schmidt: FloatValue) -> FloatValue {
    k600 / (SCHMIDT_REFERENCE / schmidt).powf(-0.5)
}

/// Volumetric CO2 outgassing rate (s^-1)
///
/// The transfer velocity is normalised by depth and converted from per day to
/// per second, so the rate is inversely proportional to depth.
pub fn k_co2(k600: FloatValue, schmidt: FloatValue, depth: FloatValue) -> FloatValue {
    k_co2_velocity(k600, schmidt) / depth / SECONDS_PER_DAY
}

/// Benthic exchange rate (s^-1)
pub fn benthic_exchange_rate(
    slope: FloatValue,
    depth: FloatValue,
    waterbody: Waterbody,
    temp_c: FloatValue,
) -> FloatValue {
    GasExchange::default().benthic_exchange_rate(slope, depth, waterbody, temp_c)
}

/// Gas exchange component
///
/// Computes Henry's constant, Schmidt number, k600, kCO2 and the benthic
/// exchange rate for each reach. Calibrated benthic multipliers scale the
/// benthic rate per waterbody.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GasExchange {
    parameters: GasExchangeParameters,
}

impl GasExchange {
    pub fn from_parameters(parameters: GasExchangeParameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &GasExchangeParameters {
        &self.parameters
    }

    /// k600 (m/day) for either waterbody
    ///
    /// Rivers use energy dissipation `g * v * S`, lakes their surface area class.
    pub fn k600(&self, reach: &Reach) -> FloatValue {
        match reach.waterbody {
            Waterbody::River => self
                .parameters
                .k600_from_energy(GRAVITY * reach.velocity_m_s * reach.slope),
            Waterbody::LakeReservoir => self
                .parameters
                .k600_from_lake_area(reach.surface_area_m2 * 1e-6),
        }
    }

    /// Benthic exchange rate (s^-1)
    ///
    /// $$U_* = \sqrt{g d S}, \qquad k_{bz} = \frac{c \, U_* \, Sc^{n}}{d}$$
    pub fn benthic_exchange_rate(
        &self,
        slope: FloatValue,
        depth: FloatValue,
        waterbody: Waterbody,
        temp_c: FloatValue,
    ) -> FloatValue {
        let shear_velocity = (GRAVITY * depth * slope).sqrt();
        let schmidt = self.parameters.schmidt_number(temp_c);
        let (coefficient, exponent) = self.parameters.benthic_terms(waterbody);
        coefficient * shear_velocity * schmidt.powf(exponent) / depth
    }

    /// Fill the gas exchange fields of a reach in place.
    ///
    /// Hydraulic geometry must already be derived. A k600 carried in from the
    /// input table is kept rather than recomputed.
    pub fn derive(&self, reach: &mut Reach, coefficients: &CalibratedCoefficients) {
        let temp_c = reach.water_temp_c;

        reach.henry = self.parameters.henry_constant(temp_c);
        reach.schmidt = self.parameters.schmidt_number(temp_c);
        if reach.k600_m_d.is_nan() {
            reach.k600_m_d = self.k600(reach);
        }
        reach.k_co2_m_d = k_co2_velocity(reach.k600_m_d, reach.schmidt);
        reach.k_co2_s = reach.k_co2_m_d / reach.depth_m / SECONDS_PER_DAY;

        let multiplier = match reach.waterbody {
            Waterbody::River => coefficients.benthic_multiplier_river,
            Waterbody::LakeReservoir => coefficients.benthic_multiplier_lake,
        };
        reach.kbz_s = multiplier
            * self.benthic_exchange_rate(reach.slope, reach.depth_m, reach.waterbody, temp_c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydraulics::derive_geometry;
    use rivco2_core::reach::AhgCoefficients;
    use rivco2_core::values::is_missing;

    #[test]
    fn test_henry_positive_and_decreasing() {
        let mut previous = FloatValue::INFINITY;
        for t in 0..=35 {
            let kh = henry_constant(t as FloatValue);
            assert!(kh > 0.0, "Henry constant must be positive at {} degC", t);
            assert!(
                kh < previous,
                "Henry constant must decrease with warming: {} degC gave {:.6} >= {:.6}",
                t,
                kh,
                previous
            );
            previous = kh;
        }
    }

    #[test]
    fn test_k600_river_regimes() {
        let low = k600_river(0.1, 0.001);
        let expected_low = (3.10 + 0.35 * (9.8 * 0.1 * 0.001_f64).ln()).exp();
        assert!((low - expected_low).abs() < 1e-9);

        let high = k600_river(1.0, 0.01);
        let expected_high = (6.43 + 1.18 * (9.8 * 0.01_f64).ln()).exp();
        assert!((high - expected_high).abs() < 1e-9);
        assert!(high > low);
    }

    #[test]
    fn test_k600_threshold_uses_low_regime() {
        let params = GasExchangeParameters::default();
        let at_threshold = params.k600_from_energy(0.02);
        let low = (3.10 + 0.35 * 0.02_f64.ln()).exp();
        let high = (6.43 + 1.18 * 0.02_f64.ln()).exp();
        assert!((at_threshold - low).abs() < 1e-12);
        assert!((at_threshold - high).abs() > 1e-3);
    }

    #[test]
    fn test_k600_lake_lower_bin_inclusive() {
        assert_eq!(k600_lake(0.1), 0.54);
        assert_eq!(k600_lake(1.0), 1.16);
        assert_eq!(k600_lake(10.0), 1.32);
        assert_eq!(k600_lake(10.01), 1.90);
    }

    #[test]
    fn test_k_co2_inverse_in_depth() {
        let sc = schmidt_number(15.0);
        let shallow = k_co2(2.0, sc, 1.0);
        let deep = k_co2(2.0, sc, 2.0);
        assert!((shallow / deep - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_k_co2_equals_k600_at_reference_schmidt() {
        let k = k_co2_velocity(3.0, 600.0);
        assert!((k - 3.0).abs() < 1e-12);
        let rate = k_co2(3.0, 600.0, 1.0);
        assert!((rate - 3.0 / 86400.0).abs() < 1e-15);
    }

    #[test]
    fn test_benthic_rate_by_waterbody() {
        let (slope, depth, temp) = (0.001, 0.5, 20.0);
        let ustar = (9.8_f64 * depth * slope).sqrt();
        let sc = schmidt_number(temp);

        let river = benthic_exchange_rate(slope, depth, Waterbody::River, temp);
        let expected_river = 0.3 * ustar * sc.powf(-2.0 / 3.0) / depth;
        assert!((river - expected_river).abs() < 1e-15);

        let lake = benthic_exchange_rate(slope, depth, Waterbody::LakeReservoir, temp);
        let expected_lake = (1.0 / 9.0) * sc.powf(-0.5) * ustar / depth;
        assert!((lake - expected_lake).abs() < 1e-15);
    }

    #[test]
    fn test_derive_river_reach() {
        let ahg = AhgCoefficients {
            a: 1.0,
            b: 0.5,
            c: -1.0,
            f: 0.3,
        };
        let mut reach = Reach::river(1, 3.0, 2.0, 0.002, ahg).with_temperature(12.0, 15.0);
        derive_geometry(&mut reach);

        let coefficients = CalibratedCoefficients {
            benthic_multiplier_river: 2.0,
            ..CalibratedCoefficients::default()
        };
        GasExchange::default().derive(&mut reach, &coefficients);

        assert!(reach.henry > 0.0);
        assert!(reach.k600_m_d > 0.0);
        assert!((reach.k_co2_s - reach.k_co2_m_d / reach.depth_m / 86400.0).abs() < 1e-18);
        let unscaled = benthic_exchange_rate(0.002, reach.depth_m, Waterbody::River, 12.0);
        assert!((reach.kbz_s - 2.0 * unscaled).abs() < 1e-15);
    }

    #[test]
    fn test_derive_keeps_precomputed_k600() {
        let mut reach = Reach::lake(2, 1.0, 2.0e6, 1.0e6).with_temperature(10.0, 10.0);
        reach.k600_m_d = 0.8;
        derive_geometry(&mut reach);
        GasExchange::default().derive(&mut reach, &CalibratedCoefficients::default());

        assert_eq!(reach.k600_m_d, 0.8);
        // Lakes without a flowline slope have no defined benthic exchange
        assert!(is_missing(reach.kbz_s));
    }
}
