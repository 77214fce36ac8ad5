//! Core data types for the Le Mans results dashboard.

use serde::{Deserialize, Serialize};

/// Placeholder written into empty categorical cells before one-hot encoding.
pub const MISSING_CATEGORY: &str = "Missing";

/// How the per-car pit signal is derived from cumulative pit stop counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitSignalPolicy {
    /// Increase in `pitstops` since the previous record of the same car, clipped at zero.
    EventCount,
    /// 1 when `pitstops > 0`, otherwise 0.
    BinaryThreshold,
}

impl PitSignalPolicy {
    /// Column name used by the presentation layer.
    pub fn column_name(self) -> &'static str {
        match self {
            PitSignalPolicy::EventCount => "Pit_event",
            PitSignalPolicy::BinaryThreshold => "Pitstop_binary",
        }
    }
}

/// Categorical source columns eligible for one-hot expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CategoricalField {
    Tyres,
    Category,
}

impl CategoricalField {
    /// Source column name.
    pub fn column_name(self) -> &'static str {
        match self {
            CategoricalField::Tyres => "Tyres",
            CategoricalField::Category => "Category",
        }
    }
}

/// One boolean column produced by one-hot expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotColumn {
    /// Source column.
    pub field: CategoricalField,
    /// Category value this column flags.
    pub value: String,
}

impl OneHotColumn {
    /// Column name, e.g. `Tyres_Michelin`.
    pub fn name(&self) -> String {
        format!("{}_{}", self.field.column_name(), self.value)
    }
}

/// One normalized row: a car entry at one checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceRecord {
    /// Car number, kept as text.
    pub car_number: String,
    /// Team name; `None` when the cell was empty.
    pub team: Option<String>,
    /// Driver line-up; `None` when the cell was empty.
    pub drivers: Option<String>,
    /// Category; filled with [`MISSING_CATEGORY`] when category is one-hot encoded.
    pub category: Option<String>,
    /// Tyre supplier, always filled.
    pub tyres: String,
    /// Best lap speed in km/h, median-filled.
    pub best_lap_kph: f64,
    /// Elapsed race time in seconds.
    pub total_time_seconds: Option<f64>,
    /// Hour component of the elapsed race time, 0..=23.
    pub hour: Option<u8>,
    /// Best lap time in seconds.
    pub lap_record_seconds: Option<f64>,
    /// Cumulative pit stop count.
    pub pitstops: u32,
    /// Completed laps.
    pub laps: u32,
    /// Pit event count or binary flag, see [`CanonicalTable::pit_signal_policy`].
    pub pit_signal: u32,
    /// One flag per [`CanonicalTable::one_hot_columns`] entry.
    pub one_hot: Vec<bool>,
}

/// Counters collected while loading a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Data rows read from the source (including skipped ones).
    pub rows_read: u64,
    /// Rows skipped because their field count did not match the header.
    pub skipped_rows: u64,
    /// Speeds replaced by the median.
    pub speed_filled: u64,
    /// Total times that did not parse.
    pub invalid_total_time: u64,
    /// Best lap times that did not parse.
    pub invalid_best_lap: u64,
    /// Pit stop counts zero-filled.
    pub invalid_pitstops: u64,
    /// Lap counts zero-filled.
    pub invalid_laps: u64,
}

/// The normalized dataset. Built once per source and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalTable {
    records: Vec<RaceRecord>,
    one_hot_columns: Vec<OneHotColumn>,
    pit_signal_policy: PitSignalPolicy,
    speed_fill_median: Option<f64>,
    report: LoadReport,
}

impl CanonicalTable {
    /// Assemble a table from normalized parts.
    pub fn new(
        records: Vec<RaceRecord>,
        one_hot_columns: Vec<OneHotColumn>,
        pit_signal_policy: PitSignalPolicy,
        speed_fill_median: Option<f64>,
        report: LoadReport,
    ) -> Self {
        Self {
            records,
            one_hot_columns,
            pit_signal_policy,
            speed_fill_median,
            report,
        }
    }

    /// Records in source order.
    pub fn records(&self) -> &[RaceRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// One-hot columns in encoding order.
    pub fn one_hot_columns(&self) -> &[OneHotColumn] {
        &self.one_hot_columns
    }

    /// Indices and columns belonging to one source field.
    pub fn one_hot_columns_for(
        &self,
        field: CategoricalField,
    ) -> impl Iterator<Item = (usize, &OneHotColumn)> + '_ {
        self.one_hot_columns
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.field == field)
    }

    /// Look up a one-hot flag by column name.
    pub fn one_hot_flag(&self, row: usize, column: &str) -> Option<bool> {
        let idx = self.one_hot_columns.iter().position(|c| c.name() == column)?;
        self.records.get(row).map(|r| r.one_hot[idx])
    }

    /// Policy used to derive [`RaceRecord::pit_signal`].
    pub fn pit_signal_policy(&self) -> PitSignalPolicy {
        self.pit_signal_policy
    }

    /// Median used to fill unparseable speeds, if any speed parsed.
    pub fn speed_fill_median(&self) -> Option<f64> {
        self.speed_fill_median
    }

    /// Load counters.
    pub fn report(&self) -> &LoadReport {
        &self.report
    }
}
