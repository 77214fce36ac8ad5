//! Speed distribution and hour/team speed heatmap.

use crate::aggregate::Mean;
use crate::filter::FilteredView;
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::collections::BTreeMap;

/// One equal-width bin of the speed distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedBin {
    /// Inclusive lower edge (km/h).
    pub lower: f64,
    /// Upper edge (km/h); exclusive except for the last bin.
    pub upper: f64,
    pub count: usize,
}

/// Equal-width histogram of best-lap speeds.
pub struct SpeedHistogram {
    min: f64,
    width: f64,
    bins: usize,
}

impl SpeedHistogram {
    /// Histogram spanning the speeds of a view. `None` for an empty view.
    pub fn for_view(view: &FilteredView<'_>, bins: usize) -> Option<Self> {
        let bins = bins.max(1);
        let (min, max) = view.iter().map(|r| r.best_lap_kph).fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
        })?;
        Some(Self {
            min,
            width: (max - min) / bins as f64,
            bins,
        })
    }

    fn index(&self, speed: f64) -> usize {
        if self.width <= 0.0 {
            return 0;
        }
        (((speed - self.min) / self.width).floor() as usize).min(self.bins - 1)
    }

    /// Get the bin key (lower edge) for a speed.
    fn bin_key(&self, speed: f64) -> OrderedFloat<f64> {
        self.edge(self.index(speed))
    }

    fn edge(&self, idx: usize) -> OrderedFloat<f64> {
        OrderedFloat(self.min + idx as f64 * self.width)
    }

    /// Count the speeds of a view into bins. Every bin is reported, empty ones included.
    pub fn count(&self, view: &FilteredView<'_>) -> Vec<SpeedBin> {
        let bins = if self.width > 0.0 { self.bins } else { 1 };
        let mut counts: BTreeMap<OrderedFloat<f64>, usize> =
            (0..bins).map(|i| (self.edge(i), 0)).collect();

        for r in view.iter() {
            *counts.entry(self.bin_key(r.best_lap_kph)).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(lower, count)| SpeedBin {
                lower: lower.0,
                upper: lower.0 + self.width,
                count,
            })
            .collect()
    }
}

/// Speed distribution of a view with `bins` equal-width bins.
pub fn speed_distribution(view: &FilteredView<'_>, bins: usize) -> Vec<SpeedBin> {
    SpeedHistogram::for_view(view, bins)
        .map(|h| h.count(view))
        .unwrap_or_default()
}

/// Mean best-lap speed of one team in one hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourTeamSpeed {
    pub hour: u8,
    pub team: String,
    pub avg_speed: f64,
}

/// Mean speed per `(hour, team)`, ordered by key.
pub fn speed_by_hour_team(view: &FilteredView<'_>) -> Vec<HourTeamSpeed> {
    let mut cells: BTreeMap<(u8, &str), Mean> = BTreeMap::new();
    for r in view.iter() {
        if let (Some(hour), Some(team)) = (r.hour, r.team.as_deref()) {
            cells.entry((hour, team)).or_default().add(r.best_lap_kph);
        }
    }

    cells
        .into_iter()
        .filter_map(|((hour, team), mean)| {
            Some(HourTeamSpeed {
                hour,
                team: team.to_string(),
                avg_speed: mean.value()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tests::{record, table};
    use crate::filter::{filter, FilterSpec};
    use approx::assert_relative_eq;
    use lemans_core::{CanonicalTable, PitSignalPolicy};

    fn speeds(values: &[f64]) -> CanonicalTable {
        table(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| {
                    let mut r = record(&i.to_string(), "Toyota", "Buemi", Some((i % 3) as u8), 1);
                    r.best_lap_kph = v;
                    r
                })
                .collect(),
            PitSignalPolicy::EventCount,
        )
    }

    #[test]
    fn test_distribution_counts() {
        let table = speeds(&[200.0, 205.0, 210.0, 219.0, 220.0]);
        let bins = speed_distribution(&filter(&table, &FilterSpec::all()), 4);

        assert_eq!(bins.len(), 4);
        let counts: Vec<usize> = bins.iter().map(|b| b.count).collect();
        // Width 5: [200,205) [205,210) [210,215) [215,220]
        assert_eq!(counts, vec![1, 1, 1, 2]);
        assert_relative_eq!(bins[0].lower, 200.0);
        assert_relative_eq!(bins[3].upper, 220.0);
        assert_eq!(counts.iter().sum::<usize>(), 5);
    }

    #[test]
    fn test_distribution_single_value() {
        let table = speeds(&[230.0, 230.0]);
        let bins = speed_distribution(&filter(&table, &FilterSpec::all()), 30);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].count, 2);
    }

    #[test]
    fn test_distribution_empty() {
        let table = speeds(&[]);
        assert!(speed_distribution(&filter(&table, &FilterSpec::all()), 30).is_empty());
    }

    #[test]
    fn test_speed_by_hour_team() {
        let table = speeds(&[200.0, 210.0, 220.0, 230.0]);
        let cells = speed_by_hour_team(&filter(&table, &FilterSpec::all()));
        // Hours cycle 0,1,2,0.
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0].hour, 0);
        assert_relative_eq!(cells[0].avg_speed, 215.0);
        assert_relative_eq!(cells[2].avg_speed, 220.0);
    }
}
