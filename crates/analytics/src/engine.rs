//! Dashboard engine.
//!
//! Combines filtering and every aggregate into one snapshot the presentation
//! layer renders.

use crate::aggregate::{aggregate_by_hour_car, pit_summary, HourCarSummary, PitSummary};
use crate::filter::{filter, FilterSpec};
use crate::metrics::KeyMetrics;
use crate::options::FilterOptions;
use crate::speed::{speed_by_hour_team, speed_distribution, HourTeamSpeed, SpeedBin};
use lemans_core::config::DashboardConfig;
use lemans_core::{CanonicalTable, Config, RaceRecord, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Everything the dashboard shows for one filter selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    /// The filter the snapshot was built for.
    pub filter: FilterSpec,
    /// Presentation name of the pit signal column.
    pub pit_signal_column: &'static str,
    pub metrics: KeyMetrics,
    pub hour_car_summary: Vec<HourCarSummary>,
    pub pit_summary: PitSummary,
    pub speed_distribution: Vec<SpeedBin>,
    pub speed_by_hour_team: Vec<HourTeamSpeed>,
    /// Selected rows, in source order.
    pub records: Vec<RaceRecord>,
}

impl DashboardSnapshot {
    /// Serialize the snapshot as JSON for the presentation layer.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Dashboard over one canonical table.
pub struct Dashboard {
    table: Arc<CanonicalTable>,
    options: FilterOptions,
    config: DashboardConfig,
}

impl Dashboard {
    /// Create a dashboard from configuration.
    pub fn new(table: Arc<CanonicalTable>, config: &Config) -> Self {
        let options = FilterOptions::from_table(&table);
        Self {
            table,
            options,
            config: config.dashboard.clone(),
        }
    }

    /// The underlying table.
    pub fn table(&self) -> &Arc<CanonicalTable> {
        &self.table
    }

    /// Filter domain of the table.
    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    /// Filter selecting everything over the full ranges.
    pub fn default_filter(&self) -> FilterSpec {
        self.options.default_spec()
    }

    /// Selection to apply for a caller's filter.
    ///
    /// With `use_default`, dimensions the caller leaves open take the default
    /// selection; otherwise they stay unconstrained.
    pub fn resolve_filter(&self, selection: FilterSpec, use_default: bool) -> FilterSpec {
        if use_default {
            selection.or_from(&self.default_filter())
        } else {
            selection
        }
    }

    /// Build the snapshot for a filter.
    pub fn snapshot(&self, spec: &FilterSpec) -> DashboardSnapshot {
        let view = filter(&self.table, spec);
        debug!(selected = view.len(), total = self.table.len(), "building snapshot");

        DashboardSnapshot {
            filter: spec.clone(),
            pit_signal_column: self.table.pit_signal_policy().column_name(),
            metrics: KeyMetrics::compute(&view),
            hour_car_summary: aggregate_by_hour_car(&view),
            pit_summary: pit_summary(&view),
            speed_distribution: speed_distribution(&view, self.config.speed_histogram_bins),
            speed_by_hour_team: speed_by_hour_team(&view),
            records: view.iter().cloned().collect(),
        }
    }
}
