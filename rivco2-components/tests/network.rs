//! End-to-end tests for basin and network runs.
//!
//! These tests drive the full pipeline through the public API:
//! - export records only for flowing boundary reaches
//! - discharge handed to downstream basins matches the boundary reaches
//! - network totals match the basin totals they are built from

use approx::assert_relative_eq;
use rivco2_components::model::{BasinInput, ConstantConcentration, NetworkModel};
use rivco2_components::routing::{
    boundary_reaches, BasinRouter, Divergence, HydrographyReach, InMemoryHydrography,
};
use rivco2_core::basin::{BasinCode, BasinLookup};
use rivco2_core::config::ModelConfig;
use rivco2_core::reach::{AhgCoefficients, Reach, ReachTable};
use rivco2_core::values::{is_missing, FloatValue};

fn code(s: &str) -> BasinCode {
    BasinCode::new(s).unwrap()
}

fn river(id: u64, from_node: u64, to_node: u64, q: FloatValue) -> Reach {
    let ahg = AhgCoefficients {
        a: 0.0,
        b: 0.5,
        c: -1.0,
        f: 0.3,
    };
    Reach::river(id, q, 2.0, 0.001, ahg)
        .with_nodes(from_node, to_node)
        .with_temperature(20.0, 22.0)
}

fn flowline(id: u64, from_node: u64) -> HydrographyReach {
    HydrographyReach {
        id,
        from_node,
        to_node: from_node + 100,
        q_m3_s: 5.0,
        hydro_seq: Some(id),
        divergence: Divergence::None,
        stream_level: Some(1),
    }
}

fn config() -> ModelConfig {
    ModelConfig::from_toml_str(
        r#"
        atmospheric_co2_ppm = 390.0

        [calibration]
        fitness = 2.0
        "#,
    )
    .unwrap()
}

/// Reaches 1 -> 2 -> 3 with Q = 1 and 2, plus a dry reach ending at node 3.
/// Node 3 is where the downstream basin begins.
fn three_reach_basin() -> ReachTable {
    vec![
        river(1, 1, 2, 1.0),
        river(2, 2, 3, 2.0),
        river(3, 5, 3, 0.0),
    ]
    .into()
}

fn two_basin_network() -> (BasinLookup, InMemoryHydrography) {
    let lookup = BasinLookup::from_rows([
        (code("0101"), Some(code("0102"))),
        (code("0102"), None),
    ]);
    let mut hydrography = InMemoryHydrography::new();
    hydrography.insert(code("0102"), vec![flowline(20, 3)]);
    (lookup, hydrography)
}

mod end_to_end {
    use super::*;

    /// A basin with one flowing and one dry reach at the shared boundary node
    /// exports exactly once, and the dry reach has no residence time.
    #[test]
    fn test_three_reach_basin() {
        let (lookup, hydrography) = two_basin_network();
        let config = config();
        let solver = ConstantConcentration { co2_ppm: 2000.0 };
        let model = NetworkModel::new(&config, &lookup, &hydrography, &solver);

        let output = model
            .run([BasinInput::new(code("0101"), three_reach_basin())])
            .unwrap();
        assert_eq!(output.basins.len(), 1);

        let basin = output.get(&code("0101")).unwrap();
        let reaches = basin.table.reaches();
        assert_relative_eq!(reaches[0].width_m, 1.0, epsilon = 1e-12);
        assert_relative_eq!(reaches[1].width_m, 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_eq!(reaches[2].width_m, 0.0);

        assert!(!is_missing(reaches[0].residence_time_s));
        assert!(!is_missing(reaches[1].residence_time_s));
        assert!(is_missing(reaches[2].residence_time_s));

        assert_eq!(basin.exports.len(), 1);
        let export = &basin.exports[0];
        assert_eq!(export.exporting_reach, Some(2));
        assert_eq!(export.downstream_basin, Some(code("0102")));
        assert_eq!(export.exported_to_node, Some(3));
        assert_eq!(export.exported_q_m3_s, 2.0);
        assert_eq!(export.exported_co2_ppm, 2000.0);
    }

    /// The dry reach has no flux and is left out of the totals rather than
    /// poisoning them.
    #[test]
    fn test_dry_reach_excluded_from_totals() {
        let (lookup, hydrography) = two_basin_network();
        let config = config();
        let solver = ConstantConcentration { co2_ppm: 2000.0 };
        let model = NetworkModel::new(&config, &lookup, &hydrography, &solver);

        let output = model
            .run([BasinInput::new(code("0101"), three_reach_basin())])
            .unwrap();
        let basin = &output.basins[0];
        let reaches = basin.table.reaches();

        assert!(is_missing(reaches[2].flux_g_yr));
        let expected = (reaches[0].flux_g_yr + reaches[1].flux_g_yr) * 1e-12;
        assert_relative_eq!(basin.summary.river.flux_tg_yr, expected, max_relative = 1e-12);
        assert_eq!(basin.summary.river.n_reaches, Some(2));
        assert_eq!(basin.summary.river.n_total_reaches, Some(3));
        assert!(basin.summary.river.flux_tg_yr > 0.0);
    }
}

mod routing {
    use super::*;

    /// Discharge in export records equals the discharge of the boundary reaches.
    #[test]
    fn test_export_discharge_round_trip() {
        let (lookup, mut hydrography) = two_basin_network();
        hydrography.insert(code("0102"), vec![flowline(20, 3), flowline(21, 7)]);
        let config = config();

        let mut table: ReachTable = vec![
            river(1, 1, 2, 1.0),
            river(2, 2, 3, 2.0),
            river(3, 5, 3, 0.0),
            river(4, 6, 7, 4.5),
            river(5, 8, 3, 0.25),
        ]
        .into();
        table.iter_mut().for_each(|r| r.co2_ppm = 1000.0);

        let router = BasinRouter::new(&lookup, &hydrography, &config);
        let records = router.route(&code("0101"), &table).unwrap();
        let inflow = router.inflow_nodes(&code("0102")).unwrap();
        let boundary = boundary_reaches(&table, &inflow);

        assert_eq!(records.len(), boundary.len());
        assert_eq!(records.len(), 3);
        let exported: FloatValue = records.iter().map(|r| r.exported_q_m3_s).sum();
        let boundary_q: FloatValue = boundary
            .iter()
            .map(|i| table.reaches()[*i].q_m3_s)
            .sum();
        assert_eq!(exported, boundary_q);
        assert_eq!(exported, 6.75);
    }

    /// Exports into lettered basin parts are reported under the parent code.
    #[test]
    fn test_composite_basin_exports_merge() {
        let lookup = BasinLookup::from_rows([
            (code("1709"), Some(code("1710a"))),
            (code("1709"), Some(code("1710b"))),
            (code("1710a"), None),
            (code("1710b"), None),
        ]);
        let mut hydrography = InMemoryHydrography::new();
        hydrography.insert(code("1710a"), vec![flowline(30, 3)]);
        hydrography.insert(code("1710b"), vec![flowline(31, 3)]);
        let config = config();
        let solver = ConstantConcentration { co2_ppm: 900.0 };
        let model = NetworkModel::new(&config, &lookup, &hydrography, &solver);

        let output = model
            .run([BasinInput::new(code("1709"), three_reach_basin())])
            .unwrap();
        assert_eq!(output.exports().len(), 2);

        let merged = output.merged_exports();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source_basin, code("1709"));
        assert_eq!(merged[0].downstream_basin, Some(code("1710")));
        assert_eq!(merged[0].exported_q_m3_s, 2.0);
        assert_relative_eq!(merged[0].exported_co2_ppm, 900.0, epsilon = 1e-9);
    }
}

mod network {
    use super::*;

    #[test]
    fn test_network_totals_match_basins() {
        let (lookup, mut hydrography) = two_basin_network();
        hydrography.insert(code("0102"), vec![flowline(20, 3)]);
        let config = config();
        let solver = ConstantConcentration { co2_ppm: 1200.0 };
        let model = NetworkModel::new(&config, &lookup, &hydrography, &solver);

        let output = model
            .run([
                BasinInput::new(code("0101"), three_reach_basin()),
                BasinInput::new(
                    code("0102"),
                    vec![river(20, 3, 103, 8.0), river(21, 103, 104, 9.0)].into(),
                ),
            ])
            .unwrap();

        let basin_total: FloatValue = output
            .basins
            .iter()
            .map(|b| b.summary.total_flux_tg_yr())
            .sum();
        assert_relative_eq!(
            output.summary.total_flux_tg_yr,
            basin_total,
            max_relative = 1e-12
        );

        let sigma_sq: FloatValue = output
            .basins
            .iter()
            .map(|b| b.uncertainty.sigma_tg_yr.powi(2))
            .sum();
        assert_relative_eq!(output.summary.sigma_tg_yr, sigma_sq.sqrt(), max_relative = 1e-12);
        assert_eq!(output.basins[0].basin, code("0101"));
        assert!(output.basins[1].exports[0].is_terminal());
    }

    #[test]
    fn test_excluded_basin_counted_but_not_summed() {
        let lookup = BasinLookup::from_rows([(code("0101"), None), (code("0418"), None)]);
        let hydrography = InMemoryHydrography::new();
        let config = ModelConfig::default();
        let solver = ConstantConcentration { co2_ppm: 1200.0 };
        let model = NetworkModel::new(&config, &lookup, &hydrography, &solver);

        let output = model
            .run([
                BasinInput::new(code("0101"), three_reach_basin()),
                BasinInput::new(code("0418"), three_reach_basin()),
            ])
            .unwrap();

        assert_eq!(output.summary.n_basins, 2);
        assert_eq!(output.summary.n_excluded, 1);
        let included = output.get(&code("0101")).unwrap().summary.total_flux_tg_yr();
        assert_relative_eq!(output.summary.total_flux_tg_yr, included, max_relative = 1e-12);
    }
}
