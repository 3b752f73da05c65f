use numpy::{PyArray1, PyReadonlyArray1};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::wrap_pymodule;

use rivco2_components::flux::FluxAggregator;
use rivco2_components::gas_exchange::{self, GasExchange};
use rivco2_components::hydraulics::derive_geometry;
use rivco2_components::{flux, gap_fill::GapFiller};
use rivco2_core::basin::BasinCode;
use rivco2_core::config::ModelConfig;
use rivco2_core::errors::RivCO2Error;
use rivco2_core::reach::{Reach, ReachTable, Waterbody};
use rivco2_core::values::FloatValue;

fn value_error(e: RivCO2Error) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn depythonize_config(config: Option<Bound<'_, PyAny>>) -> PyResult<ModelConfig> {
    match config {
        Some(config) => pythonize::depythonize_bound(config)
            .map_err(|e| PyValueError::new_err(format!("{}", e))),
        None => Ok(ModelConfig::default()),
    }
}

fn depythonize_reaches(reaches: Bound<'_, PyAny>) -> PyResult<ReachTable> {
    let reaches: Vec<Reach> =
        pythonize::depythonize_bound(reaches).map_err(|e| PyValueError::new_err(format!("{}", e)))?;
    Ok(reaches.into())
}

fn pythonize_value<T: serde::Serialize>(py: Python<'_>, value: &T) -> PyResult<PyObject> {
    pythonize::pythonize(py, value).map_err(|e| PyValueError::new_err(format!("{}", e)))
}

/// Henry's law constant for CO2 (mol L^-1 atm^-1) at a water temperature (degC)
#[pyfunction]
fn henry_constant(temp_c: FloatValue) -> FloatValue {
    gas_exchange::henry_constant(temp_c)
}

/// Henry's law constants for an array of water temperatures (degC)
#[pyfunction]
fn henry_constants<'py>(
    py: Python<'py>,
    temp_c: PyReadonlyArray1<'py, FloatValue>,
) -> Bound<'py, PyArray1<FloatValue>> {
    let values: Vec<FloatValue> = temp_c
        .as_array()
        .iter()
        .map(|t| gas_exchange::henry_constant(*t))
        .collect();
    PyArray1::from_vec_bound(py, values)
}

#[pyfunction]
fn schmidt_number(temp_c: FloatValue) -> FloatValue {
    gas_exchange::schmidt_number(temp_c)
}

#[pyfunction]
fn k600_river(velocity: FloatValue, slope: FloatValue) -> FloatValue {
    gas_exchange::k600_river(velocity, slope)
}

#[pyfunction]
fn k600_lake(area_km2: FloatValue) -> FloatValue {
    gas_exchange::k600_lake(area_km2)
}

#[pyfunction]
fn k_co2(k600: FloatValue, schmidt: FloatValue, depth: FloatValue) -> FloatValue {
    gas_exchange::k_co2(k600, schmidt, depth)
}

/// Benthic exchange rate (s^-1). `waterbody` is "River" or "Lake/Reservoir".
#[pyfunction]
fn benthic_exchange_rate(
    slope: FloatValue,
    depth: FloatValue,
    waterbody: &str,
    temp_c: FloatValue,
) -> PyResult<FloatValue> {
    let waterbody: Waterbody = waterbody.parse().map_err(value_error)?;
    Ok(gas_exchange::benthic_exchange_rate(
        slope, depth, waterbody, temp_c,
    ))
}

#[pyfunction]
fn flux_per_area(
    co2_ppm: FloatValue,
    atmospheric_co2_ppm: FloatValue,
    henry: FloatValue,
    k_co2_m_d: FloatValue,
) -> FloatValue {
    flux::flux_per_area(co2_ppm, atmospheric_co2_ppm, henry, k_co2_m_d)
}

#[pymodule]
pub fn physics(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(henry_constant, m)?)?;
    m.add_function(wrap_pyfunction!(henry_constants, m)?)?;
    m.add_function(wrap_pyfunction!(schmidt_number, m)?)?;
    m.add_function(wrap_pyfunction!(k600_river, m)?)?;
    m.add_function(wrap_pyfunction!(k600_lake, m)?)?;
    m.add_function(wrap_pyfunction!(k_co2, m)?)?;
    m.add_function(wrap_pyfunction!(benthic_exchange_rate, m)?)?;
    m.add_function(wrap_pyfunction!(flux_per_area, m)?)?;
    Ok(())
}

/// Gap fill and derive hydraulic and gas exchange properties of a basin.
///
/// `reaches` is a list of reach dicts. Returns the reaches with their derived
/// fields filled, ready for an external transport solver.
#[pyfunction]
#[pyo3(signature = (reaches, invalid_slope, invalid_temperature, config=None))]
fn derive_reaches(
    py: Python<'_>,
    reaches: Bound<'_, PyAny>,
    invalid_slope: Vec<bool>,
    invalid_temperature: Vec<bool>,
    config: Option<Bound<'_, PyAny>>,
) -> PyResult<PyObject> {
    let config = depythonize_config(config)?;
    let mut table = depythonize_reaches(reaches)?;

    GapFiller::new(config.slope_floor)
        .repair_table(&mut table, &invalid_slope, &invalid_temperature)
        .map_err(value_error)?;
    let gas_exchange = GasExchange::default();
    table.iter_mut().for_each(|reach| {
        derive_geometry(reach);
        gas_exchange.derive(reach, &config.calibration);
    });

    pythonize_value(py, &table.reaches())
}

/// Fluxes and summaries of a basin whose reaches carry solved CO2 concentrations.
///
/// Returns a dict with the updated reaches, the basin summary, the lake bin
/// summary and the calibration uncertainty.
#[pyfunction]
#[pyo3(signature = (basin, reaches, config=None))]
fn summarise_basin(
    py: Python<'_>,
    basin: &str,
    reaches: Bound<'_, PyAny>,
    config: Option<Bound<'_, PyAny>>,
) -> PyResult<PyObject> {
    #[derive(serde::Serialize)]
    struct Summaries<'a> {
        reaches: &'a [Reach],
        summary: flux::BasinSummary,
        lake_bins: Vec<flux::LakeBinSummary>,
        uncertainty: flux::UncertaintyEstimate,
    }

    let basin = BasinCode::new(basin).map_err(value_error)?;
    let config = depythonize_config(config)?;
    let mut table = depythonize_reaches(reaches)?;

    let aggregator = FluxAggregator::default();
    aggregator.derive_fluxes(&basin, &mut table, &config);
    let summaries = Summaries {
        summary: aggregator.basin_summary(&basin, &table, &config),
        lake_bins: aggregator.basin_lake_bin_summary(&basin, &table, &config),
        uncertainty: aggregator.calibration_uncertainty(&basin, &table, &config),
        reaches: table.reaches(),
    };

    pythonize_value(py, &summaries)
}

#[pymodule]
pub fn basin(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(derive_reaches, m)?)?;
    m.add_function(wrap_pyfunction!(summarise_basin, m)?)?;
    Ok(())
}

#[pymodule]
#[pyo3(name = "_lib")]
fn rivco2(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_wrapped(wrap_pymodule!(physics))?;
    m.add_wrapped(wrap_pymodule!(basin))?;

    set_path(m, "rivco2._lib.physics", "physics")?;
    set_path(m, "rivco2._lib.basin", "basin")?;

    Ok(())
}

fn set_path(m: &Bound<'_, PyModule>, path: &str, module: &str) -> PyResult<()> {
    let code = format!(
        "\
import sys
sys.modules['{path}'] = {module}
    "
    );
    m.py().run_bound(&code, None, Some(&m.dict()))
}
