//! Flux aggregation
//!
//! Turns steady-state CO2 concentrations into outgassing fluxes and rolls them
//! up into basin and network totals.
//!
//! # Flux
//!
//! The areal flux follows from the gas transfer velocity and the air-water
//! partial pressure difference:
//!
//! $$F = k_{CO2} \, K_H \, (pCO2_{w} - pCO2_{a})$$
//!
//! and is scaled by the water surface area of each reach.
//!
//! # Missing values
//!
//! Every aggregate excludes missing values. A group without a single defined
//! value produces a missing aggregate, never a zero.

use crate::hydraulics::surface_area;
use crate::parameters::{FluxParameters, AREAL_FLUX_FACTOR, G_TO_TG, M2_TO_KM2};
use log::{debug, warn};
use rivco2_core::basin::BasinCode;
use rivco2_core::config::{ModelConfig, ShorelineCorrection};
use rivco2_core::reach::{Reach, ReachTable, Waterbody};
use rivco2_core::values::{count_defined, nan_median, nan_sum, FloatValue, MISSING};
use serde::{Deserialize, Serialize};

/// Areal CO2 flux (g C m^-2 yr^-1)
///
/// Positive values are outgassing from the water to the atmosphere.
pub fn flux_per_area(
    co2_ppm: FloatValue,
    atmospheric_co2_ppm: FloatValue,
    henry: FloatValue,
    k_co2_m_d: FloatValue,
) -> FloatValue {
    k_co2_m_d * (co2_ppm - atmospheric_co2_ppm) * henry * AREAL_FLUX_FACTOR
}

/// Reach CO2 flux (g C yr^-1)
///
/// Rivers scale the areal flux by channel width and length, lakes by their
/// surface area.
pub fn reach_flux(reach: &Reach) -> FloatValue {
    match reach.waterbody {
        Waterbody::River => reach.flux_g_m2_yr * reach.width_m * reach.length_km * 1000.0,
        Waterbody::LakeReservoir => reach.flux_g_m2_yr * reach.surface_area_m2,
    }
}

/// Zero flux, width and length of reaches flagged as artificial shoreline rivers.
///
/// Returns the number of corrected reaches.
pub fn apply_shoreline_correction(
    basin: &BasinCode,
    table: &mut ReachTable,
    correction: &ShorelineCorrection,
) -> usize {
    if !correction.applies_to(basin) {
        return 0;
    }
    let mut corrected = 0;
    for reach in table.iter_mut() {
        if correction.is_flagged(basin, reach.id) {
            reach.flux_g_m2_yr = 0.0;
            reach.width_m = 0.0;
            reach.length_km = 0.0;
            reach.surface_area_m2 = surface_area(
                reach.waterbody,
                reach.width_m,
                reach.length_km,
                reach.lake_area_m2,
            );
            corrected += 1;
        }
    }
    debug!("Corrected {} shoreline reaches in basin {}", corrected, basin);
    corrected
}

/// Totals for one waterbody variant of a basin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterbodySummary {
    pub waterbody: Waterbody,
    pub flux_tg_yr: FloatValue,
    pub area_km2: FloatValue,
    /// Reaches with a defined flux, i.e. those contributing to `flux_tg_yr`
    pub n_reaches: Option<usize>,
    /// All reaches of this waterbody, including those without a defined flux
    pub n_total_reaches: Option<usize>,
    /// Totals over reaches that do not cross an international boundary
    pub domestic_flux_tg_yr: FloatValue,
    pub domestic_area_km2: FloatValue,
    pub n_domestic_reaches: Option<usize>,
    pub median_k600_m_d: FloatValue,
    pub median_k_co2_s: FloatValue,
}

impl WaterbodySummary {
    fn missing(waterbody: Waterbody) -> Self {
        Self {
            waterbody,
            flux_tg_yr: MISSING,
            area_km2: MISSING,
            n_reaches: None,
            n_total_reaches: None,
            domestic_flux_tg_yr: MISSING,
            domestic_area_km2: MISSING,
            n_domestic_reaches: None,
            median_k600_m_d: MISSING,
            median_k_co2_s: MISSING,
        }
    }

    fn from_reaches(waterbody: Waterbody, table: &ReachTable) -> Self {
        let all: Vec<&Reach> = table.of_waterbody(waterbody).collect();
        let domestic: Vec<&Reach> = all.iter().copied().filter(|r| !r.international).collect();

        let fluxes = |reaches: &[&Reach]| {
            reaches
                .iter()
                .map(|r| r.flux_g_yr)
                .collect::<Vec<_>>()
        };
        let flux = |reaches: &[&Reach]| nan_sum(&fluxes(reaches)) * G_TO_TG;
        let area = |reaches: &[&Reach]| {
            nan_sum(&reaches.iter().map(|r| r.surface_area_m2).collect::<Vec<_>>()) * M2_TO_KM2
        };

        Self {
            waterbody,
            flux_tg_yr: flux(&all),
            area_km2: area(&all),
            n_reaches: Some(count_defined(&fluxes(&all))),
            n_total_reaches: Some(all.len()),
            domestic_flux_tg_yr: flux(&domestic),
            domestic_area_km2: area(&domestic),
            n_domestic_reaches: Some(count_defined(&fluxes(&domestic))),
            median_k600_m_d: nan_median(&all.iter().map(|r| r.k600_m_d).collect::<Vec<_>>()),
            median_k_co2_s: nan_median(&all.iter().map(|r| r.k_co2_s).collect::<Vec<_>>()),
        }
    }
}

/// Basin-level flux and area totals, one row per basin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasinSummary {
    pub basin: BasinCode,
    pub river: WaterbodySummary,
    pub lake: WaterbodySummary,
}

impl BasinSummary {
    /// All-missing row for an excluded basin
    pub fn missing(basin: BasinCode) -> Self {
        Self {
            basin,
            river: WaterbodySummary::missing(Waterbody::River),
            lake: WaterbodySummary::missing(Waterbody::LakeReservoir),
        }
    }

    pub fn waterbody(&self, waterbody: Waterbody) -> &WaterbodySummary {
        match waterbody {
            Waterbody::River => &self.river,
            Waterbody::LakeReservoir => &self.lake,
        }
    }

    /// Total basin flux (Tg C/yr) over both waterbody variants
    pub fn total_flux_tg_yr(&self) -> FloatValue {
        nan_sum(&[self.river.flux_tg_yr, self.lake.flux_tg_yr])
    }

    /// Total water surface area (km^2)
    pub fn total_area_km2(&self) -> FloatValue {
        nan_sum(&[self.river.area_km2, self.lake.area_km2])
    }

    pub fn is_missing(&self) -> bool {
        self.river.n_reaches.is_none() && self.lake.n_reaches.is_none()
    }
}

/// Lake statistics for one surface area bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LakeBinSummary {
    pub basin: BasinCode,
    pub bin: usize,
    /// Upper edge of the bin in km^2, or `>edge` for the open-ended bin
    pub label: String,
    pub n_reaches: usize,
    pub area_km2: FloatValue,
    pub flux_tg_yr: FloatValue,
}

/// Flux uncertainty implied by the calibration fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyEstimate {
    pub basin: BasinCode,
    pub fitness: FloatValue,
    /// Calibration cost term `(1/F)/2` (ppm)
    pub cost: FloatValue,
    pub median_k_co2_m_d: FloatValue,
    pub median_henry: FloatValue,
    pub total_area_km2: FloatValue,
    /// Standard-error-like flux uncertainty (Tg C/yr)
    pub sigma_tg_yr: FloatValue,
}

/// Continent or network scale rollup of basin results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub n_basins: usize,
    pub n_excluded: usize,
    pub river_flux_tg_yr: FloatValue,
    pub lake_flux_tg_yr: FloatValue,
    pub total_flux_tg_yr: FloatValue,
    pub total_area_km2: FloatValue,
    /// Basin uncertainties combined in quadrature (Tg C/yr)
    pub sigma_tg_yr: FloatValue,
}

/// Flux aggregation component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FluxAggregator {
    parameters: FluxParameters,
}

impl FluxAggregator {
    pub fn from_parameters(parameters: FluxParameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &FluxParameters {
        &self.parameters
    }

    /// Compute areal and reach fluxes in place.
    ///
    /// The shoreline correction is applied between the two steps so flagged
    /// reaches contribute neither flux nor area.
    pub fn derive_fluxes(&self, basin: &BasinCode, table: &mut ReachTable, config: &ModelConfig) {
        for reach in table.iter_mut() {
            reach.flux_g_m2_yr = flux_per_area(
                reach.co2_ppm,
                config.atmospheric_co2_ppm,
                reach.henry,
                reach.k_co2_m_d,
            );
        }

        apply_shoreline_correction(basin, table, &config.shoreline_correction);

        for reach in table.iter_mut() {
            reach.flux_g_yr = reach_flux(reach);
        }
    }

    /// Flux and area totals by waterbody, over all and domestic-only reaches
    pub fn basin_summary(
        &self,
        basin: &BasinCode,
        table: &ReachTable,
        config: &ModelConfig,
    ) -> BasinSummary {
        if config.is_excluded(basin) {
            warn!("Basin {} is excluded from summaries", basin);
            return BasinSummary::missing(basin.clone());
        }
        BasinSummary {
            basin: basin.clone(),
            river: WaterbodySummary::from_reaches(Waterbody::River, table),
            lake: WaterbodySummary::from_reaches(Waterbody::LakeReservoir, table),
        }
    }

    /// Lake statistics per surface area bin, one row per non-empty bin
    pub fn basin_lake_bin_summary(
        &self,
        basin: &BasinCode,
        table: &ReachTable,
        config: &ModelConfig,
    ) -> Vec<LakeBinSummary> {
        if config.is_excluded(basin) {
            return Vec::new();
        }

        let n_bins = self.parameters.n_lake_bins();
        let mut counts = vec![0usize; n_bins];
        let mut areas: Vec<Vec<FloatValue>> = vec![Vec::new(); n_bins];
        let mut fluxes: Vec<Vec<FloatValue>> = vec![Vec::new(); n_bins];

        for reach in table.of_waterbody(Waterbody::LakeReservoir) {
            let area_km2 = reach.surface_area_m2 * M2_TO_KM2;
            if let Some(bin) = self.parameters.lake_bin(area_km2) {
                counts[bin] += 1;
                areas[bin].push(area_km2);
                fluxes[bin].push(reach.flux_g_m2_yr * reach.surface_area_m2 * G_TO_TG);
            }
        }

        (0..n_bins)
            .filter(|bin| counts[*bin] > 0)
            .map(|bin| LakeBinSummary {
                basin: basin.clone(),
                bin,
                label: self.parameters.lake_bin_label(bin),
                n_reaches: counts[bin],
                area_km2: nan_sum(&areas[bin]),
                flux_tg_yr: nan_sum(&fluxes[bin]),
            })
            .collect()
    }

    /// Propagate the calibration fitness into a basin flux uncertainty
    ///
    /// $$\sigma = \tilde{k}_{CO2} \cdot \frac{1}{2F} \cdot \tilde{K}_H \cdot A$$
    ///
    /// with medians over the basin's reaches, converted to Tg C/yr.
    pub fn calibration_uncertainty(
        &self,
        basin: &BasinCode,
        table: &ReachTable,
        config: &ModelConfig,
    ) -> UncertaintyEstimate {
        let fitness = config.calibration.fitness;
        let cost = if fitness > 0.0 {
            (1.0 / fitness) / 2.0
        } else {
            MISSING
        };
        let median_k_co2_m_d = nan_median(&table.column(|r| r.k_co2_m_d));
        let median_henry = nan_median(&table.column(|r| r.henry));
        let total_area_m2 = nan_sum(&table.column(|r| r.surface_area_m2));

        let sigma_tg_yr = if config.is_excluded(basin) {
            MISSING
        } else {
            median_k_co2_m_d
                * cost
                * median_henry
                * AREAL_FLUX_FACTOR
                * total_area_m2
                * G_TO_TG
        };

        UncertaintyEstimate {
            basin: basin.clone(),
            fitness,
            cost,
            median_k_co2_m_d,
            median_henry,
            total_area_km2: total_area_m2 * M2_TO_KM2,
            sigma_tg_yr,
        }
    }

    /// Roll basin results up to network totals
    pub fn network_summary(
        &self,
        summaries: &[BasinSummary],
        uncertainties: &[UncertaintyEstimate],
    ) -> NetworkSummary {
        let river: Vec<FloatValue> = summaries.iter().map(|s| s.river.flux_tg_yr).collect();
        let lake: Vec<FloatValue> = summaries.iter().map(|s| s.lake.flux_tg_yr).collect();
        let total: Vec<FloatValue> = summaries.iter().map(|s| s.total_flux_tg_yr()).collect();
        let area: Vec<FloatValue> = summaries.iter().map(|s| s.total_area_km2()).collect();
        let variance: Vec<FloatValue> = uncertainties
            .iter()
            .map(|u| u.sigma_tg_yr.powi(2))
            .collect();

        NetworkSummary {
            n_basins: summaries.len(),
            n_excluded: summaries.iter().filter(|s| s.is_missing()).count(),
            river_flux_tg_yr: nan_sum(&river),
            lake_flux_tg_yr: nan_sum(&lake),
            total_flux_tg_yr: nan_sum(&total),
            total_area_km2: nan_sum(&area),
            sigma_tg_yr: nan_sum(&variance).sqrt(),
        }
    }
}
