//! Grouped reductions over a filtered view.

use crate::filter::FilteredView;
use lemans_core::PitSignalPolicy;
use serde::Serialize;
use std::collections::BTreeMap;

/// Running mean that skips undefined values.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Mean {
    sum: f64,
    count: u64,
}

impl Mean {
    pub(crate) fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub(crate) fn add_opt(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.add(v);
        }
    }

    /// `None` when no value was added.
    pub(crate) fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// One row of the hour/car aggregate table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourCarSummary {
    pub hour: u8,
    pub car_number: String,
    pub team: String,
    pub drivers: String,
    /// Maximum lap count in the group.
    pub total_laps: u32,
    /// Mean of defined best-lap times.
    pub avg_lap_record: Option<f64>,
    /// Mean best-lap speed.
    pub avg_speed: f64,
    /// Sum of pit events; only reported under [`PitSignalPolicy::EventCount`].
    pub pit_events: Option<u64>,
}

#[derive(Default)]
struct GroupAcc {
    total_laps: u32,
    lap_record: Mean,
    speed: Mean,
    pit_events: u64,
}

/// Group by `(hour, car, team, drivers)`, ordered by key.
///
/// Rows with an undefined hour or a missing team or driver line-up are left out.
pub fn aggregate_by_hour_car(view: &FilteredView<'_>) -> Vec<HourCarSummary> {
    let mut groups: BTreeMap<(u8, &str, &str, &str), GroupAcc> = BTreeMap::new();

    for r in view.iter() {
        let (Some(hour), Some(team), Some(drivers)) = (r.hour, r.team.as_deref(), r.drivers.as_deref())
        else {
            continue;
        };
        let acc = groups
            .entry((hour, r.car_number.as_str(), team, drivers))
            .or_default();
        acc.total_laps = acc.total_laps.max(r.laps);
        acc.lap_record.add_opt(r.lap_record_seconds);
        acc.speed.add(r.best_lap_kph);
        acc.pit_events += u64::from(r.pit_signal);
    }

    let report_pits = view.pit_signal_policy() == PitSignalPolicy::EventCount;
    groups
        .into_iter()
        .map(|((hour, car, team, drivers), acc)| HourCarSummary {
            hour,
            car_number: car.to_string(),
            team: team.to_string(),
            drivers: drivers.to_string(),
            total_laps: acc.total_laps,
            avg_lap_record: acc.lap_record.value(),
            // Every group holds at least one row.
            avg_speed: acc.speed.value().unwrap_or_default(),
            pit_events: report_pits.then_some(acc.pit_events),
        })
        .collect()
}

/// Pit activity per hour, shaped by the table's pit policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "policy", content = "rows", rename_all = "snake_case")]
pub enum PitSummary {
    /// Sum of pit events per hour.
    EventCount(Vec<HourPitEvents>),
    /// Whether any record of a team pitted in the hour.
    BinaryThreshold(Vec<HourTeamPitFlag>),
}

impl PitSummary {
    /// Whether the summary has no rows.
    pub fn is_empty(&self) -> bool {
        match self {
            PitSummary::EventCount(rows) => rows.is_empty(),
            PitSummary::BinaryThreshold(rows) => rows.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourPitEvents {
    pub hour: u8,
    pub pit_events: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourTeamPitFlag {
    pub hour: u8,
    pub team: String,
    pub pitted: u32,
}

/// Per-hour pit summary. Rows with an undefined hour (or missing team, for the
/// binary policy) are left out.
pub fn pit_summary(view: &FilteredView<'_>) -> PitSummary {
    match view.pit_signal_policy() {
        PitSignalPolicy::EventCount => {
            let mut by_hour: BTreeMap<u8, u64> = BTreeMap::new();
            for r in view.iter() {
                if let Some(hour) = r.hour {
                    *by_hour.entry(hour).or_insert(0) += u64::from(r.pit_signal);
                }
            }
            PitSummary::EventCount(
                by_hour
                    .into_iter()
                    .map(|(hour, pit_events)| HourPitEvents { hour, pit_events })
                    .collect(),
            )
        }
        PitSignalPolicy::BinaryThreshold => {
            let mut by_hour_team: BTreeMap<(u8, &str), u32> = BTreeMap::new();
            for r in view.iter() {
                if let (Some(hour), Some(team)) = (r.hour, r.team.as_deref()) {
                    let flag = by_hour_team.entry((hour, team)).or_insert(0);
                    *flag = (*flag).max(r.pit_signal);
                }
            }
            PitSummary::BinaryThreshold(
                by_hour_team
                    .into_iter()
                    .map(|((hour, team), pitted)| HourTeamPitFlag {
                        hour,
                        team: team.to_string(),
                        pitted,
                    })
                    .collect(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tests::{record, table};
    use crate::filter::{filter, FilterSpec};
    use approx::assert_relative_eq;
    use lemans_core::RaceRecord;

    fn with(mut r: RaceRecord, kph: f64, lap: Option<f64>, pit: u32) -> RaceRecord {
        r.best_lap_kph = kph;
        r.lap_record_seconds = lap;
        r.pit_signal = pit;
        r
    }

    fn sample(policy: PitSignalPolicy) -> lemans_core::CanonicalTable {
        table(
            vec![
                with(record("7", "Toyota", "Buemi", Some(1), 10), 230.0, Some(210.0), 0),
                with(record("7", "Toyota", "Buemi", Some(1), 12), 232.0, None, 1),
                with(record("50", "Ferrari", "Fuoco", Some(1), 11), 240.0, Some(205.0), 1),
                with(record("10", "Cadillac", "Bamber", Some(2), 25), 228.0, Some(212.0), 1),
                with(record("7", "Toyota", "Buemi", None, 30), 229.0, Some(209.0), 1),
            ],
            policy,
        )
    }

    #[test]
    fn test_hour_car_groups() {
        let table = sample(PitSignalPolicy::EventCount);
        let rows = aggregate_by_hour_car(&filter(&table, &FilterSpec::all()));

        let keys: Vec<(u8, &str)> = rows.iter().map(|r| (r.hour, r.car_number.as_str())).collect();
        // Car numbers order as text: "50" < "7".
        assert_eq!(keys, vec![(1, "50"), (1, "7"), (2, "10")]);

        let toyota = &rows[1];
        assert_eq!(toyota.total_laps, 12);
        assert_relative_eq!(toyota.avg_lap_record.unwrap(), 210.0);
        assert_relative_eq!(toyota.avg_speed, 231.0);
        assert_eq!(toyota.pit_events, Some(1));
    }

    #[test]
    fn test_all_undefined_lap_record_is_none() {
        let table = table(
            vec![with(record("7", "Toyota", "Buemi", Some(1), 10), 230.0, None, 0)],
            PitSignalPolicy::EventCount,
        );
        let rows = aggregate_by_hour_car(&filter(&table, &FilterSpec::all()));
        assert_eq!(rows[0].avg_lap_record, None);
    }

    #[test]
    fn test_binary_policy_omits_pit_column() {
        let table = sample(PitSignalPolicy::BinaryThreshold);
        let rows = aggregate_by_hour_car(&filter(&table, &FilterSpec::all()));
        assert!(rows.iter().all(|r| r.pit_events.is_none()));
    }

    #[test]
    fn test_pit_events_by_hour() {
        let table = sample(PitSignalPolicy::EventCount);
        let summary = pit_summary(&filter(&table, &FilterSpec::all()));
        assert_eq!(
            summary,
            PitSummary::EventCount(vec![
                HourPitEvents { hour: 1, pit_events: 2 },
                HourPitEvents { hour: 2, pit_events: 1 },
            ])
        );
    }

    #[test]
    fn test_pit_flags_by_hour_team() {
        let table = sample(PitSignalPolicy::BinaryThreshold);
        let summary = pit_summary(&filter(&table, &FilterSpec::all()));
        let PitSummary::BinaryThreshold(rows) = summary else {
            panic!("expected binary summary");
        };
        let flags: Vec<(u8, &str, u32)> = rows
            .iter()
            .map(|r| (r.hour, r.team.as_str(), r.pitted))
            .collect();
        assert_eq!(
            flags,
            vec![(1, "Ferrari", 1), (1, "Toyota", 1), (2, "Cadillac", 1)]
        );
    }

    #[test]
    fn test_empty_view() {
        let table = sample(PitSignalPolicy::EventCount);
        let spec = FilterSpec {
            hours: Some((20, 23)),
            ..Default::default()
        };
        let view = filter(&table, &spec);
        assert!(aggregate_by_hour_car(&view).is_empty());
        assert!(pit_summary(&view).is_empty());
    }
}
