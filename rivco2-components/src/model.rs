//! Basin and network runs
//!
//! A [`BasinModel`] takes the reach table of one basin through every stage of
//! the pipeline:
//!
//! 1. gap filling of flagged slopes and temperatures
//! 2. hydraulic geometry
//! 3. gas exchange
//! 4. steady-state CO2 from a [`TransportSolver`]
//! 5. fluxes and basin summaries
//! 6. export records for the downstream basins
//!
//! A [`NetworkModel`] runs basins in topological order of the basin graph and
//! hands each basin the export records addressed to it.

use crate::flux::{
    BasinSummary, FluxAggregator, LakeBinSummary, NetworkSummary, UncertaintyEstimate,
};
use crate::gap_fill::{GapFillReport, GapFiller};
use crate::gas_exchange::GasExchange;
use crate::hydraulics::derive_geometry;
use crate::routing::{
    imports_for, merge_composite_exports, BasinRouter, ExportRecord, HydrographySource,
};
use log::{debug, info, warn};
use rivco2_core::basin::{BasinCode, BasinGraph, BasinLookup};
use rivco2_core::config::{CalibratedCoefficients, ModelConfig};
use rivco2_core::errors::{RivCO2Error, RivCO2Result};
use rivco2_core::reach::ReachTable;
use rivco2_core::values::FloatValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Steady-state transport solver
///
/// Given a basin whose hydraulic and gas exchange properties have been
/// derived, returns the dissolved CO2 (ppm) of every reach, in table order.
/// `imports` are the export records of upstream basins addressed to this one.
pub trait TransportSolver {
    fn solve(
        &self,
        basin: &BasinCode,
        table: &ReachTable,
        imports: &[&ExportRecord],
        coefficients: &CalibratedCoefficients,
    ) -> RivCO2Result<Vec<FloatValue>>;
}

/// Solver that holds every reach at the same concentration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantConcentration {
    pub co2_ppm: FloatValue,
}

impl TransportSolver for ConstantConcentration {
    fn solve(
        &self,
        _basin: &BasinCode,
        table: &ReachTable,
        _imports: &[&ExportRecord],
        _coefficients: &CalibratedCoefficients,
    ) -> RivCO2Result<Vec<FloatValue>> {
        Ok(vec![self.co2_ppm; table.len()])
    }
}

/// Reach table of a basin together with its data quality flags
#[derive(Debug, Clone, PartialEq)]
pub struct BasinInput {
    pub basin: BasinCode,
    pub table: ReachTable,
    pub invalid_slope: Vec<bool>,
    pub invalid_temperature: Vec<bool>,
}

impl BasinInput {
    /// Input with no reach flagged for repair
    pub fn new(basin: BasinCode, table: ReachTable) -> Self {
        let n = table.len();
        Self {
            basin,
            table,
            invalid_slope: vec![false; n],
            invalid_temperature: vec![false; n],
        }
    }

    pub fn with_invalid_slopes(mut self, invalid_slope: Vec<bool>) -> Self {
        self.invalid_slope = invalid_slope;
        self
    }

    pub fn with_invalid_temperatures(mut self, invalid_temperature: Vec<bool>) -> Self {
        self.invalid_temperature = invalid_temperature;
        self
    }
}

/// Everything produced by a basin run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasinOutput {
    pub basin: BasinCode,
    /// Reach table with every derived field filled
    pub table: ReachTable,
    pub summary: BasinSummary,
    pub lake_bins: Vec<LakeBinSummary>,
    pub uncertainty: UncertaintyEstimate,
    pub exports: Vec<ExportRecord>,
    #[serde(skip)]
    pub gap_fill: GapFillReport,
}

/// Runs the full pipeline for one basin
pub struct BasinModel<'a, S: HydrographySource, T: TransportSolver> {
    config: &'a ModelConfig,
    router: BasinRouter<'a, S>,
    solver: &'a T,
    gap_filler: GapFiller,
    gas_exchange: GasExchange,
    aggregator: FluxAggregator,
}

impl<'a, S: HydrographySource, T: TransportSolver> BasinModel<'a, S, T> {
    pub fn new(
        config: &'a ModelConfig,
        lookup: &'a BasinLookup,
        hydrography: &'a S,
        solver: &'a T,
    ) -> Self {
        Self {
            config,
            router: BasinRouter::new(lookup, hydrography, config),
            solver,
            gap_filler: GapFiller::new(config.slope_floor),
            gas_exchange: GasExchange::default(),
            aggregator: FluxAggregator::default(),
        }
    }

    pub fn with_gas_exchange(mut self, gas_exchange: GasExchange) -> Self {
        self.gas_exchange = gas_exchange;
        self
    }

    pub fn with_aggregator(mut self, aggregator: FluxAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn config(&self) -> &ModelConfig {
        self.config
    }

    pub fn run(&self, input: BasinInput, imports: &[&ExportRecord]) -> RivCO2Result<BasinOutput> {
        let BasinInput {
            basin,
            mut table,
            invalid_slope,
            invalid_temperature,
        } = input;
        debug!("Running basin {} with {} reaches", basin, table.len());

        let gap_fill = self
            .gap_filler
            .repair_table(&mut table, &invalid_slope, &invalid_temperature)?;
        if gap_fill.slopes_floored > 0 {
            warn!(
                "{} slopes in basin {} fell back to the slope floor",
                gap_fill.slopes_floored, basin
            );
        }

        table.iter_mut().for_each(|reach| {
            derive_geometry(reach);
            self.gas_exchange.derive(reach, &self.config.calibration);
        });

        let co2 = self
            .solver
            .solve(&basin, &table, imports, &self.config.calibration)?;
        if co2.len() != table.len() {
            return Err(RivCO2Error::SolverOutput {
                basin: basin.to_string(),
                expected: table.len(),
                actual: co2.len(),
            });
        }
        table
            .iter_mut()
            .zip(co2)
            .for_each(|(reach, value)| reach.co2_ppm = value);

        self.aggregator
            .derive_fluxes(&basin, &mut table, self.config);
        let summary = self.aggregator.basin_summary(&basin, &table, self.config);
        let lake_bins = self
            .aggregator
            .basin_lake_bin_summary(&basin, &table, self.config);
        let uncertainty = self
            .aggregator
            .calibration_uncertainty(&basin, &table, self.config);

        let exports = self.router.route(&basin, &table)?;
        debug!("Basin {} produced {} export records", basin, exports.len());

        Ok(BasinOutput {
            basin,
            table,
            summary,
            lake_bins,
            uncertainty,
            exports,
            gap_fill,
        })
    }
}

/// Results of a network run, in execution order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkOutput {
    pub basins: Vec<BasinOutput>,
    pub summary: NetworkSummary,
}

impl NetworkOutput {
    pub fn get(&self, basin: &BasinCode) -> Option<&BasinOutput> {
        self.basins.iter().find(|b| &b.basin == basin)
    }

    /// Every export record of the run
    pub fn exports(&self) -> Vec<ExportRecord> {
        self.basins
            .iter()
            .flat_map(|b| b.exports.iter().cloned())
            .collect()
    }

    /// Export records with lettered basin parts merged into their parent code
    pub fn merged_exports(&self) -> Vec<ExportRecord> {
        merge_composite_exports(self.exports())
    }
}

/// Runs every basin of a network in upstream-to-downstream order
pub struct NetworkModel<'a, S: HydrographySource, T: TransportSolver> {
    lookup: &'a BasinLookup,
    basin_model: BasinModel<'a, S, T>,
}

impl<'a, S: HydrographySource, T: TransportSolver> NetworkModel<'a, S, T> {
    pub fn new(
        config: &'a ModelConfig,
        lookup: &'a BasinLookup,
        hydrography: &'a S,
        solver: &'a T,
    ) -> Self {
        Self {
            lookup,
            basin_model: BasinModel::new(config, lookup, hydrography, solver),
        }
    }

    pub fn from_basin_model(lookup: &'a BasinLookup, basin_model: BasinModel<'a, S, T>) -> Self {
        Self {
            lookup,
            basin_model,
        }
    }

    /// Run every basin with an input.
    ///
    /// Basins of the graph without an input (for example sinks outside the
    /// modelled domain) are skipped. An input for a basin missing from the
    /// lookup is an error.
    pub fn run(&self, inputs: impl IntoIterator<Item = BasinInput>) -> RivCO2Result<NetworkOutput> {
        let graph = BasinGraph::from_lookup(self.lookup)?;
        let mut pending: HashMap<BasinCode, BasinInput> = HashMap::new();
        for input in inputs {
            if !graph.contains(&input.basin) {
                return Err(RivCO2Error::UnknownBasin(input.basin.to_string()));
            }
            pending.insert(input.basin.clone(), input);
        }
        info!(
            "Running {} of {} basins in the network",
            pending.len(),
            graph.len()
        );

        let mut exports: Vec<ExportRecord> = Vec::new();
        let mut basins = Vec::with_capacity(pending.len());
        for basin in graph.topological_order() {
            let Some(input) = pending.remove(basin) else {
                debug!("No input for basin {}, skipping", basin);
                continue;
            };

            let imports: Vec<ExportRecord> = imports_for(basin, &exports)
                .into_iter()
                .cloned()
                .collect();
            let import_refs: Vec<&ExportRecord> = imports.iter().collect();

            let output = self.basin_model.run(input, &import_refs)?;
            exports.extend(output.exports.iter().cloned());
            basins.push(output);
        }

        let summaries: Vec<BasinSummary> = basins.iter().map(|b| b.summary.clone()).collect();
        let uncertainties: Vec<UncertaintyEstimate> =
            basins.iter().map(|b| b.uncertainty.clone()).collect();
        let summary = self
            .basin_model
            .aggregator
            .network_summary(&summaries, &uncertainties);
        info!(
            "Network run finished: {} basins, total flux {:.4} Tg C/yr",
            summary.n_basins, summary.total_flux_tg_yr
        );

        Ok(NetworkOutput { basins, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Divergence, HydrographyReach, InMemoryHydrography};
    use is_close::is_close;
    use rivco2_core::reach::{AhgCoefficients, Reach};
    use rivco2_core::values::is_missing;
    use std::cell::RefCell;

    fn code(s: &str) -> BasinCode {
        BasinCode::new(s).unwrap()
    }

    fn ahg() -> AhgCoefficients {
        AhgCoefficients {
            a: 1.0,
            b: 0.5,
            c: -1.0,
            f: 0.3,
        }
    }

    fn river(id: u64, from_node: u64, to_node: u64, q: FloatValue) -> Reach {
        Reach::river(id, q, 1.5, 0.002, ahg())
            .with_nodes(from_node, to_node)
            .with_temperature(15.0, 18.0)
    }

    fn flowline(id: u64, from_node: u64) -> HydrographyReach {
        HydrographyReach {
            id,
            from_node,
            to_node: from_node + 1,
            q_m3_s: 10.0,
            hydro_seq: Some(id),
            divergence: Divergence::None,
            stream_level: Some(1),
        }
    }

    /// 0101 drains into 0102 through node 3, 0102 is terminal
    fn network() -> (BasinLookup, InMemoryHydrography) {
        let lookup = BasinLookup::from_rows([
            (code("0101"), Some(code("0102"))),
            (code("0102"), None),
        ]);
        let mut hydrography = InMemoryHydrography::new();
        hydrography.insert(code("0102"), vec![flowline(20, 3), flowline(21, 4)]);
        (lookup, hydrography)
    }

    fn inputs() -> Vec<BasinInput> {
        vec![
            BasinInput::new(
                code("0102"),
                vec![river(20, 3, 4, 6.0), river(21, 4, 5, 7.0)].into(),
            ),
            BasinInput::new(
                code("0101"),
                vec![river(10, 1, 2, 2.0), river(11, 2, 3, 5.0)].into(),
            ),
        ]
    }

    /// Records how many imports each basin received
    struct RecordingSolver {
        calls: RefCell<Vec<(BasinCode, usize)>>,
    }

    impl TransportSolver for RecordingSolver {
        fn solve(
            &self,
            basin: &BasinCode,
            table: &ReachTable,
            imports: &[&ExportRecord],
            _coefficients: &CalibratedCoefficients,
        ) -> RivCO2Result<Vec<FloatValue>> {
            self.calls.borrow_mut().push((basin.clone(), imports.len()));
            Ok(vec![1000.0; table.len()])
        }
    }

    struct ShortSolver;

    impl TransportSolver for ShortSolver {
        fn solve(
            &self,
            _basin: &BasinCode,
            _table: &ReachTable,
            _imports: &[&ExportRecord],
            _coefficients: &CalibratedCoefficients,
        ) -> RivCO2Result<Vec<FloatValue>> {
            Ok(vec![500.0])
        }
    }

    #[test]
    fn test_basin_run_fills_every_stage() {
        let (lookup, hydrography) = network();
        let config = ModelConfig::default();
        let solver = ConstantConcentration { co2_ppm: 1500.0 };
        let model = BasinModel::new(&config, &lookup, &hydrography, &solver);

        let input = inputs().remove(1).with_invalid_slopes(vec![true, false]);
        let output = model.run(input, &[]).unwrap();

        let reaches = output.table.reaches();
        assert_eq!(output.gap_fill.slopes_repaired, 1);
        // Only neighbour of reach 10 is reach 11
        assert_eq!(reaches[0].slope, 0.002);
        for reach in reaches {
            assert!(reach.width_m > 0.0);
            assert!(reach.k600_m_d > 0.0);
            assert_eq!(reach.co2_ppm, 1500.0);
            assert!(reach.flux_g_yr > 0.0);
        }

        assert_eq!(output.summary.river.n_reaches, Some(2));
        let expected: FloatValue = reaches.iter().map(|r| r.flux_g_yr).sum::<FloatValue>() * 1e-12;
        assert!(is_close!(output.summary.river.flux_tg_yr, expected));
        assert!(output.lake_bins.is_empty());

        assert_eq!(output.exports.len(), 1);
        assert_eq!(output.exports[0].exporting_reach, Some(11));
        assert_eq!(output.exports[0].exported_q_m3_s, 5.0);
    }

    #[test]
    fn test_solver_output_length_checked() {
        let (lookup, hydrography) = network();
        let config = ModelConfig::default();
        let model = BasinModel::new(&config, &lookup, &hydrography, &ShortSolver);

        let result = model.run(inputs().remove(0), &[]);
        assert!(matches!(
            result,
            Err(RivCO2Error::SolverOutput {
                expected: 2,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_network_runs_upstream_first_and_passes_imports() {
        let (lookup, hydrography) = network();
        let config = ModelConfig::default();
        let solver = RecordingSolver {
            calls: RefCell::new(Vec::new()),
        };
        let model = NetworkModel::new(&config, &lookup, &hydrography, &solver);

        let output = model.run(inputs()).unwrap();

        assert_eq!(
            solver.calls.borrow().as_slice(),
            &[(code("0101"), 0), (code("0102"), 1)]
        );
        assert_eq!(output.basins.len(), 2);
        assert!(output.get(&code("0102")).unwrap().exports[0].is_terminal());
        assert_eq!(output.summary.n_basins, 2);
        assert_eq!(output.summary.n_excluded, 0);
        assert!(output.summary.total_flux_tg_yr > 0.0);
        assert_eq!(output.merged_exports().len(), 2);
    }

    #[test]
    fn test_network_rejects_unknown_basin() {
        let (lookup, hydrography) = network();
        let config = ModelConfig::default();
        let solver = ConstantConcentration { co2_ppm: 800.0 };
        let model = NetworkModel::new(&config, &lookup, &hydrography, &solver);

        let stray = BasinInput::new(code("0901"), vec![river(1, 1, 2, 1.0)].into());
        assert!(matches!(
            model.run(vec![stray]),
            Err(RivCO2Error::UnknownBasin(_))
        ));
    }

    #[test]
    fn test_network_rejects_cycle() {
        let lookup = BasinLookup::from_rows([
            (code("0101"), Some(code("0102"))),
            (code("0102"), Some(code("0101"))),
        ]);
        let hydrography = InMemoryHydrography::new();
        let config = ModelConfig::default();
        let solver = ConstantConcentration { co2_ppm: 800.0 };
        let model = NetworkModel::new(&config, &lookup, &hydrography, &solver);

        assert!(matches!(
            model.run(Vec::new()),
            Err(RivCO2Error::CyclicBasinGraph(_))
        ));
    }

    #[test]
    fn test_excluded_basin_still_routes() {
        let lookup = BasinLookup::from_rows([(code("0418"), None)]);
        let hydrography = InMemoryHydrography::new();
        let config = ModelConfig::default();
        let solver = ConstantConcentration { co2_ppm: 800.0 };
        let model = BasinModel::new(&config, &lookup, &hydrography, &solver);

        let output = model
            .run(
                BasinInput::new(code("0418"), vec![river(1, 1, 2, 1.0)].into()),
                &[],
            )
            .unwrap();
        assert!(output.summary.is_missing());
        assert!(is_missing(output.uncertainty.sigma_tg_yr));
        assert!(output.table.reaches()[0].flux_g_yr > 0.0);
        assert!(output.exports[0].is_terminal());
    }
}
