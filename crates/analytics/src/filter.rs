//! Row filtering by predicate conjunction.

use lemans_core::{CanonicalTable, PitSignalPolicy, RaceRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Driver selection: every line-up or exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverFilter {
    #[default]
    All,
    Only(String),
}

/// Conjunction of row predicates. `None` leaves a dimension unconstrained.
///
/// A record whose value for a constrained dimension is missing never matches.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Allowed teams.
    pub teams: Option<BTreeSet<String>>,
    /// Allowed categories.
    pub categories: Option<BTreeSet<String>>,
    /// Driver selection.
    pub driver: DriverFilter,
    /// Inclusive hour range.
    pub hours: Option<(u8, u8)>,
    /// Inclusive lap range.
    pub laps: Option<(u32, u32)>,
}

fn member(set: &Option<BTreeSet<String>>, value: Option<&String>) -> bool {
    match set {
        None => true,
        Some(set) => value.map_or(false, |v| set.contains(v)),
    }
}

impl FilterSpec {
    /// Filter with no constraints.
    pub fn all() -> Self {
        Self::default()
    }

    /// Fill the dimensions this filter leaves open from `base`.
    ///
    /// When `base` spans the full domain of a table (see
    /// [`FilterOptions::default_spec`](crate::FilterOptions::default_spec)),
    /// the result never selects a row that `base` rejects.
    pub fn or_from(self, base: &FilterSpec) -> FilterSpec {
        FilterSpec {
            teams: self.teams.or_else(|| base.teams.clone()),
            categories: self.categories.or_else(|| base.categories.clone()),
            driver: match self.driver {
                DriverFilter::All => base.driver.clone(),
                only => only,
            },
            hours: self.hours.or(base.hours),
            laps: self.laps.or(base.laps),
        }
    }

    /// Whether a record satisfies every predicate.
    pub fn matches(&self, record: &RaceRecord) -> bool {
        if !member(&self.teams, record.team.as_ref()) {
            return false;
        }
        if !member(&self.categories, record.category.as_ref()) {
            return false;
        }
        if let DriverFilter::Only(driver) = &self.driver {
            if record.drivers.as_ref() != Some(driver) {
                return false;
            }
        }
        if let Some((min, max)) = self.hours {
            match record.hour {
                Some(h) if (min..=max).contains(&h) => {}
                _ => return false,
            }
        }
        if let Some((min, max)) = self.laps {
            if !(min..=max).contains(&record.laps) {
                return false;
            }
        }
        true
    }
}

/// A row subset of a canonical table, in source order.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    rows: Vec<&'a RaceRecord>,
    pit_signal_policy: PitSignalPolicy,
}

impl<'a> FilteredView<'a> {
    /// Every row of a table.
    pub fn full(table: &'a CanonicalTable) -> Self {
        Self {
            rows: table.records().iter().collect(),
            pit_signal_policy: table.pit_signal_policy(),
        }
    }

    /// Selected rows.
    pub fn rows(&self) -> &[&'a RaceRecord] {
        &self.rows
    }

    /// Number of selected rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no row was selected.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Pit policy of the underlying table.
    pub fn pit_signal_policy(&self) -> PitSignalPolicy {
        self.pit_signal_policy
    }

    /// Iterate over selected rows.
    pub fn iter(&self) -> impl Iterator<Item = &'a RaceRecord> + '_ {
        self.rows.iter().copied()
    }
}

/// Select the rows of `table` that satisfy `spec`.
pub fn filter<'a>(table: &'a CanonicalTable, spec: &FilterSpec) -> FilteredView<'a> {
    FilteredView {
        rows: table.records().iter().filter(|r| spec.matches(r)).collect(),
        pit_signal_policy: table.pit_signal_policy(),
    }
}
