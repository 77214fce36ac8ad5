//! Filter domain offered to the operator.

use crate::filter::{DriverFilter, FilterSpec};
use lemans_core::{CanonicalTable, RaceRecord};
use serde::Serialize;
use std::collections::BTreeSet;

/// Distinct values and bounds of the filterable dimensions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    /// Sorted distinct teams.
    pub teams: Vec<String>,
    /// Sorted distinct driver line-ups.
    pub drivers: Vec<String>,
    /// Sorted distinct categories.
    pub categories: Vec<String>,
    /// Minimum and maximum defined hour.
    pub hour_bounds: Option<(u8, u8)>,
    /// Minimum and maximum lap count.
    pub lap_bounds: Option<(u32, u32)>,
}

fn bounds<T: Copy + Ord>(values: impl Iterator<Item = T>) -> Option<(T, T)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

impl FilterOptions {
    /// Collect the filter domain of a table.
    pub fn from_table(table: &CanonicalTable) -> Self {
        let records = table.records();
        let distinct = |f: fn(&RaceRecord) -> Option<&String>| -> Vec<String> {
            records
                .iter()
                .filter_map(f)
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        };

        Self {
            teams: distinct(|r| r.team.as_ref()),
            drivers: distinct(|r| r.drivers.as_ref()),
            categories: distinct(|r| r.category.as_ref()),
            hour_bounds: bounds(records.iter().filter_map(|r| r.hour)),
            lap_bounds: bounds(records.iter().map(|r| r.laps)),
        }
    }

    /// Everything selected over the full ranges.
    ///
    /// The hour range is always constrained when any hour is defined, so rows
    /// with an undefined hour are left out of the default view.
    pub fn default_spec(&self) -> FilterSpec {
        FilterSpec {
            teams: Some(self.teams.iter().cloned().collect()),
            categories: None,
            driver: DriverFilter::All,
            hours: self.hour_bounds,
            laps: self.lap_bounds,
        }
    }
}
