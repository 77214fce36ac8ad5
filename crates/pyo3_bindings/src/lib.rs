//! PyO3 bindings for the Le Mans results dashboard core.
//!
//! Exposes the Rust normalizer and aggregates to the Python presentation shell:
//! - Cached loading of the results CSV
//! - Canonical records and filter domain
//! - Key metrics, hour/car summary and full dashboard snapshots

use pyo3::create_exception;
use pyo3::exceptions::{PyException, PyValueError};
use pyo3::prelude::*;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use lemans_analytics::metrics::display_metric;
use lemans_analytics::{
    aggregate_by_hour_car, filter, Dashboard, DriverFilter, FilterSpec,
    HourCarSummary as RustHourCarSummary, KeyMetrics as RustKeyMetrics,
};
use lemans_core::{
    Config as RustConfig, Error as RustError, PitSignalPolicy, RaceRecord as RustRaceRecord,
};
use lemans_ingestion::{Normalizer, TableCache};

create_exception!(lemans_dashboard, LoadError, PyException);

fn to_py_err(err: RustError) -> PyErr {
    if err.is_load_error() {
        LoadError::new_err(err.to_string())
    } else {
        PyValueError::new_err(err.to_string())
    }
}

fn parse_policy(name: &str) -> PyResult<PitSignalPolicy> {
    match name {
        "event_count" => Ok(PitSignalPolicy::EventCount),
        "binary_threshold" => Ok(PitSignalPolicy::BinaryThreshold),
        other => Err(PyValueError::new_err(format!(
            "unknown pit signal policy {other:?}, expected \"event_count\" or \"binary_threshold\""
        ))),
    }
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// One normalized race record.
#[pyclass]
#[derive(Clone)]
pub struct RaceRecord {
    #[pyo3(get)]
    pub car_number: String,
    #[pyo3(get)]
    pub team: Option<String>,
    #[pyo3(get)]
    pub drivers: Option<String>,
    #[pyo3(get)]
    pub category: Option<String>,
    #[pyo3(get)]
    pub tyres: String,
    #[pyo3(get)]
    pub best_lap_kph: f64,
    #[pyo3(get)]
    pub total_time_seconds: Option<f64>,
    #[pyo3(get)]
    pub hour: Option<u8>,
    #[pyo3(get)]
    pub lap_record_seconds: Option<f64>,
    #[pyo3(get)]
    pub pitstops: u32,
    #[pyo3(get)]
    pub laps: u32,
    #[pyo3(get)]
    pub pit_signal: u32,
    #[pyo3(get)]
    pub one_hot: Vec<bool>,
}

#[pymethods]
impl RaceRecord {
    fn __repr__(&self) -> String {
        format!(
            "RaceRecord(car_number={:?}, hour={:?}, laps={}, pit_signal={})",
            self.car_number, self.hour, self.laps, self.pit_signal
        )
    }
}

impl From<&RustRaceRecord> for RaceRecord {
    fn from(r: &RustRaceRecord) -> Self {
        RaceRecord {
            car_number: r.car_number.clone(),
            team: r.team.clone(),
            drivers: r.drivers.clone(),
            category: r.category.clone(),
            tyres: r.tyres.clone(),
            best_lap_kph: r.best_lap_kph,
            total_time_seconds: r.total_time_seconds,
            hour: r.hour,
            lap_record_seconds: r.lap_record_seconds,
            pitstops: r.pitstops,
            laps: r.laps,
            pit_signal: r.pit_signal,
            one_hot: r.one_hot.clone(),
        }
    }
}

/// Headline metrics; `None` means no data.
#[pyclass]
#[derive(Clone)]
pub struct KeyMetrics {
    #[pyo3(get)]
    pub avg_total_time: Option<f64>,
    #[pyo3(get)]
    pub avg_best_lap: Option<f64>,
    #[pyo3(get)]
    pub avg_pit_signal: Option<f64>,
    #[pyo3(get)]
    pub records: usize,
}

#[pymethods]
impl KeyMetrics {
    /// Display strings for (total time, best lap, pit signal); "no data" when undefined.
    fn formatted(&self) -> (String, String, String) {
        (
            display_metric(self.avg_total_time, 0),
            display_metric(self.avg_best_lap, 3),
            display_metric(self.avg_pit_signal, 2),
        )
    }

    fn __repr__(&self) -> String {
        let (total, best, pit) = self.formatted();
        format!(
            "KeyMetrics(avg_total_time={total}, avg_best_lap={best}, avg_pit_signal={pit}, records={})",
            self.records
        )
    }
}

impl From<RustKeyMetrics> for KeyMetrics {
    fn from(m: RustKeyMetrics) -> Self {
        KeyMetrics {
            avg_total_time: m.avg_total_time,
            avg_best_lap: m.avg_best_lap,
            avg_pit_signal: m.avg_pit_signal,
            records: m.records,
        }
    }
}

/// One row of the hour/car aggregate table.
#[pyclass]
#[derive(Clone)]
pub struct HourCarSummary {
    #[pyo3(get)]
    pub hour: u8,
    #[pyo3(get)]
    pub car_number: String,
    #[pyo3(get)]
    pub team: String,
    #[pyo3(get)]
    pub drivers: String,
    #[pyo3(get)]
    pub total_laps: u32,
    #[pyo3(get)]
    pub avg_lap_record: Option<f64>,
    #[pyo3(get)]
    pub avg_speed: f64,
    #[pyo3(get)]
    pub pit_events: Option<u64>,
}

impl From<RustHourCarSummary> for HourCarSummary {
    fn from(s: RustHourCarSummary) -> Self {
        HourCarSummary {
            hour: s.hour,
            car_number: s.car_number,
            team: s.team,
            drivers: s.drivers,
            total_laps: s.total_laps,
            avg_lap_record: s.avg_lap_record,
            avg_speed: s.avg_speed,
            pit_events: s.pit_events,
        }
    }
}

// ============================================================================
// Python-exposed Engine Classes
// ============================================================================

/// Cache of canonical tables keyed by source content.
#[pyclass]
pub struct PyTableCache {
    inner: TableCache,
    config: RustConfig,
}

#[pymethods]
impl PyTableCache {
    #[new]
    #[pyo3(signature = (include_category_one_hot=true, pit_signal_policy="event_count", speed_histogram_bins=30))]
    fn new(
        include_category_one_hot: bool,
        pit_signal_policy: &str,
        speed_histogram_bins: usize,
    ) -> PyResult<Self> {
        let mut config = RustConfig::default();
        config.normalizer.include_category_one_hot = include_category_one_hot;
        config.normalizer.pit_signal_policy = parse_policy(pit_signal_policy)?;
        config.dashboard.speed_histogram_bins = speed_histogram_bins;
        config.validate().map_err(to_py_err)?;
        Ok(PyTableCache {
            inner: TableCache::new(),
            config,
        })
    }

    /// Create from a JSON configuration document.
    #[staticmethod]
    fn from_config_json(text: &str) -> PyResult<Self> {
        Ok(PyTableCache {
            inner: TableCache::new(),
            config: RustConfig::from_json_str(text).map_err(to_py_err)?,
        })
    }

    /// Create from a JSON configuration file.
    #[staticmethod]
    fn from_config_file(path: PathBuf) -> PyResult<Self> {
        Ok(PyTableCache {
            inner: TableCache::new(),
            config: RustConfig::from_json_file(path).map_err(to_py_err)?,
        })
    }

    /// Load a results file, reusing the cached table when its content is unchanged.
    fn load(&mut self, path: PathBuf) -> PyResult<PyDashboard> {
        let normalizer = Normalizer::from_config(&self.config);
        let table = self.inner.load_path(&path, &normalizer).map_err(to_py_err)?;
        Ok(PyDashboard {
            inner: Dashboard::new(table, &self.config),
        })
    }

    /// Get cache statistics as (entries, hits, misses).
    fn stats(&self) -> (usize, u64, u64) {
        (self.inner.len(), self.inner.hits(), self.inner.misses())
    }

    /// Drop all cached tables.
    fn clear(&mut self) {
        self.inner.clear();
    }
}

/// Dashboard over one canonical table.
#[pyclass]
pub struct PyDashboard {
    inner: Dashboard,
}

impl PyDashboard {
    fn spec(
        &self,
        teams: Option<Vec<String>>,
        categories: Option<Vec<String>>,
        driver: Option<String>,
        hours: Option<(u8, u8)>,
        laps: Option<(u32, u32)>,
        use_default: bool,
    ) -> FilterSpec {
        let selection = FilterSpec {
            teams: teams.map(|t| t.into_iter().collect::<BTreeSet<_>>()),
            categories: categories.map(|c| c.into_iter().collect::<BTreeSet<_>>()),
            driver: driver.map_or(DriverFilter::All, DriverFilter::Only),
            hours,
            laps,
        };
        self.inner.resolve_filter(selection, use_default)
    }
}

#[pymethods]
impl PyDashboard {
    /// Number of canonical records.
    fn __len__(&self) -> usize {
        self.inner.table().len()
    }

    /// All canonical records in source order.
    fn records(&self) -> Vec<RaceRecord> {
        self.inner.table().records().iter().map(RaceRecord::from).collect()
    }

    /// One-hot column names in encoding order.
    fn one_hot_columns(&self) -> Vec<String> {
        self.inner
            .table()
            .one_hot_columns()
            .iter()
            .map(|c| c.name())
            .collect()
    }

    #[getter]
    fn teams(&self) -> Vec<String> {
        self.inner.options().teams.clone()
    }

    #[getter]
    fn drivers(&self) -> Vec<String> {
        self.inner.options().drivers.clone()
    }

    #[getter]
    fn categories(&self) -> Vec<String> {
        self.inner.options().categories.clone()
    }

    #[getter]
    fn hour_bounds(&self) -> Option<(u8, u8)> {
        self.inner.options().hour_bounds
    }

    #[getter]
    fn lap_bounds(&self) -> Option<(u32, u32)> {
        self.inner.options().lap_bounds
    }

    /// Default selection (every team over the full hour and lap ranges) as JSON.
    #[getter]
    fn default_filter_json(&self) -> PyResult<String> {
        serde_json::to_string(&self.inner.default_filter())
            .map_err(|e| to_py_err(RustError::from(e)))
    }

    /// Presentation name of the pit signal column.
    #[getter]
    fn pit_signal_column(&self) -> &'static str {
        self.inner.table().pit_signal_policy().column_name()
    }

    /// One-hot flag of a record by column name, `None` for an unknown row or column.
    fn one_hot_flag(&self, row: usize, column: &str) -> Option<bool> {
        self.inner.table().one_hot_flag(row, column)
    }

    /// Key metrics for a filter.
    ///
    /// Open dimensions are unconstrained, or take the default selection with `use_default`.
    #[pyo3(signature = (teams=None, categories=None, driver=None, hours=None, laps=None, use_default=false))]
    fn metrics(
        &self,
        teams: Option<Vec<String>>,
        categories: Option<Vec<String>>,
        driver: Option<String>,
        hours: Option<(u8, u8)>,
        laps: Option<(u32, u32)>,
        use_default: bool,
    ) -> KeyMetrics {
        let spec = self.spec(teams, categories, driver, hours, laps, use_default);
        RustKeyMetrics::compute(&filter(self.inner.table(), &spec)).into()
    }

    /// Hour/car aggregate table for a filter.
    #[pyo3(signature = (teams=None, categories=None, driver=None, hours=None, laps=None, use_default=false))]
    fn hour_car_summary(
        &self,
        teams: Option<Vec<String>>,
        categories: Option<Vec<String>>,
        driver: Option<String>,
        hours: Option<(u8, u8)>,
        laps: Option<(u32, u32)>,
        use_default: bool,
    ) -> Vec<HourCarSummary> {
        let spec = self.spec(teams, categories, driver, hours, laps, use_default);
        aggregate_by_hour_car(&filter(self.inner.table(), &spec))
            .into_iter()
            .map(|s| s.into())
            .collect()
    }

    /// Full snapshot as JSON.
    #[pyo3(signature = (teams=None, categories=None, driver=None, hours=None, laps=None, use_default=false))]
    fn snapshot_json(
        &self,
        teams: Option<Vec<String>>,
        categories: Option<Vec<String>>,
        driver: Option<String>,
        hours: Option<(u8, u8)>,
        laps: Option<(u32, u32)>,
        use_default: bool,
    ) -> PyResult<String> {
        let spec = self.spec(teams, categories, driver, hours, laps, use_default);
        self.inner.snapshot(&spec).to_json().map_err(to_py_err)
    }
}

/// Normalize a results file without caching.
#[pyfunction]
#[pyo3(signature = (path, config_json=None))]
fn normalize_file(path: PathBuf, config_json: Option<&str>) -> PyResult<PyDashboard> {
    let config = match config_json {
        Some(text) => RustConfig::from_json_str(text).map_err(to_py_err)?,
        None => RustConfig::default(),
    };
    let table = Normalizer::from_config(&config)
        .normalize_path(&path)
        .map_err(to_py_err)?;
    Ok(PyDashboard {
        inner: Dashboard::new(Arc::new(table), &config),
    })
}

/// Install a fmt subscriber. `RUST_LOG` overrides `level`. Returns false if one was already set.
#[pyfunction]
#[pyo3(signature = (level="info"))]
fn init_logging(level: &str) -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

// ============================================================================
// Module Definition
// ============================================================================

/// Le Mans dashboard core - Rust normalization and aggregates for Python.
#[pymodule]
fn lemans_dashboard(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Types
    m.add_class::<RaceRecord>()?;
    m.add_class::<KeyMetrics>()?;
    m.add_class::<HourCarSummary>()?;

    // Engine classes
    m.add_class::<PyTableCache>()?;
    m.add_class::<PyDashboard>()?;

    m.add_function(wrap_pyfunction!(normalize_file, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;

    m.add("LoadError", m.py().get_type_bound::<LoadError>())?;

    Ok(())
}
