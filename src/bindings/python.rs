//! Python facade. Every call takes its full snapshot as JSON and returns
//! JSON, so no engine state lives on the Python side.
use super::payload::{CalibrationPayload, CalibrationReport, GraphPayload};
use crate::analysis::{self, topology};
use crate::calibration;
use crate::compute::propagation;
use crate::config::EngineConfig;
use crate::display::trace;
use crate::store::IndicatorId;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;

fn parse<T: DeserializeOwned>(json: &str) -> PyResult<T> {
    serde_json::from_str(json).map_err(|e| PyValueError::new_err(format!("Invalid payload: {}", e)))
}

fn dump<T: Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyValueError::new_err(e.to_string()))
}

fn config(json: Option<&str>) -> PyResult<EngineConfig> {
    match json {
        Some(j) => EngineConfig::from_json(j).map_err(|e| PyValueError::new_err(e.to_string())),
        None => Ok(EngineConfig::default()),
    }
}

#[pyfunction]
#[pyo3(signature = (graph_json, indicator_id, new_value, config_json=None))]
fn simulate(graph_json: &str, indicator_id: &str, new_value: f64, config_json: Option<&str>) -> PyResult<String> {
    let cfg = config(config_json)?;
    let graph = parse::<GraphPayload>(graph_json)?.into_graph();
    let result = propagation::simulate(&graph, &IndicatorId::from(indicator_id), new_value, &cfg.simulation)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    dump(&result)
}

#[pyfunction]
#[pyo3(signature = (graph_json, indicator_id, new_value, config_json=None))]
fn explain_simulation(graph_json: &str, indicator_id: &str, new_value: f64, config_json: Option<&str>) -> PyResult<String> {
    let cfg = config(config_json)?;
    let graph = parse::<GraphPayload>(graph_json)?.into_graph();
    trace::explain_simulation(&graph, &IndicatorId::from(indicator_id), new_value, &cfg.simulation)
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

#[pyfunction]
#[pyo3(signature = (graph_json, indicator_id, top_n=None))]
fn top_drivers(graph_json: &str, indicator_id: &str, top_n: Option<usize>) -> PyResult<String> {
    let graph = parse::<GraphPayload>(graph_json)?.into_graph();
    let n = top_n.unwrap_or(EngineConfig::default().ranking.top_n);
    dump(&analysis::top_drivers(&graph, &IndicatorId::from(indicator_id), n))
}

#[pyfunction]
fn net_score(graph_json: &str, indicator_id: &str) -> PyResult<Option<f64>> {
    let graph = parse::<GraphPayload>(graph_json)?.into_graph();
    Ok(analysis::net_score(&graph, &IndicatorId::from(indicator_id)))
}

#[pyfunction]
#[pyo3(signature = (graph_json, root_id, max_depth=None))]
fn subtree(graph_json: &str, root_id: &str, max_depth: Option<usize>) -> PyResult<Option<String>> {
    let graph = parse::<GraphPayload>(graph_json)?.into_graph();
    let depth = max_depth.unwrap_or(EngineConfig::default().hierarchy.max_depth);
    analysis::subtree(&graph, &IndicatorId::from(root_id), depth)
        .map(|tree| dump(&tree))
        .transpose()
}

#[pyfunction]
fn diagnose(graph_json: &str) -> PyResult<String> {
    let graph = parse::<GraphPayload>(graph_json)?.into_graph();
    dump(&topology::diagnose(&graph))
}

#[pyfunction]
#[pyo3(signature = (payload_json, config_json=None))]
fn calibrate(payload_json: &str, config_json: Option<&str>) -> PyResult<String> {
    let cfg = config(config_json)?;
    let payload: CalibrationPayload = parse(payload_json)?;
    let outcome = calibration::calibrate(
        &payload.indicators,
        &payload.historical_trends,
        &payload.relationships,
        &cfg.calibration,
    );
    dump(&CalibrationReport::from(outcome))
}

/// Adds every facade function to the `_core` module.
pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(simulate, m)?)?;
    m.add_function(wrap_pyfunction!(explain_simulation, m)?)?;
    m.add_function(wrap_pyfunction!(top_drivers, m)?)?;
    m.add_function(wrap_pyfunction!(net_score, m)?)?;
    m.add_function(wrap_pyfunction!(subtree, m)?)?;
    m.add_function(wrap_pyfunction!(diagnose, m)?)?;
    m.add_function(wrap_pyfunction!(calibrate, m)?)?;
    Ok(())
}
