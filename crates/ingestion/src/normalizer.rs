//! Canonical table construction.
//!
//! Turns a [`RawTable`] into an immutable [`CanonicalTable`]: categorical gap
//! filling, one-hot expansion, speed median-fill, time parsing, count coercion
//! and the per-car pit signal.

use crate::fields::{non_empty, parse_count, parse_lap_time, parse_speed, parse_total_time};
use crate::source::RawTable;
use lemans_core::config::{NormalizerConfig, SourceConfig};
use lemans_core::{
    CanonicalTable, CategoricalField, Config, Error, LoadReport, OneHotColumn, PitSignalPolicy,
    RaceRecord, Result, MISSING_CATEGORY,
};
use statrs::statistics::{Data, Median};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{info, warn};

/// Source column names after header normalization.
pub mod columns {
    pub const CAR_NUMBER: &str = "Car No.";
    pub const TEAM: &str = "Team";
    pub const DRIVERS: &str = "Drivers";
    pub const CATEGORY: &str = "Category";
    pub const TYRES: &str = "Tyres";
    pub const BEST_LAP_KPH: &str = "Best Lap Kph";
    pub const TOTAL_TIME: &str = "Total Time";
    pub const BEST_LAP_TIME: &str = "Best LapTime";
    pub const PITSTOPS: &str = "Pitstops";
    pub const LAPS: &str = "Laps";
}

/// Resolved column positions.
struct ColumnIndex {
    car_number: usize,
    team: usize,
    drivers: usize,
    category: Option<usize>,
    tyres: usize,
    best_lap_kph: usize,
    total_time: usize,
    best_lap_time: usize,
    pitstops: usize,
    laps: usize,
}

impl ColumnIndex {
    fn resolve(raw: &RawTable, config: &NormalizerConfig) -> Result<Self> {
        let category = if config.include_category_one_hot {
            Some(raw.require_column(columns::CATEGORY)?)
        } else {
            raw.column_index(columns::CATEGORY)
        };

        Ok(Self {
            car_number: raw.require_column(columns::CAR_NUMBER)?,
            team: raw.require_column(columns::TEAM)?,
            drivers: raw.require_column(columns::DRIVERS)?,
            category,
            tyres: raw.require_column(columns::TYRES)?,
            best_lap_kph: raw.require_column(columns::BEST_LAP_KPH)?,
            total_time: raw.require_column(columns::TOTAL_TIME)?,
            best_lap_time: raw.require_column(columns::BEST_LAP_TIME)?,
            pitstops: raw.require_column(columns::PITSTOPS)?,
            laps: raw.require_column(columns::LAPS)?,
        })
    }
}

/// A row after per-field parsing, before table-wide steps.
struct PartialRecord {
    record: RaceRecord,
    speed: Option<f64>,
}

/// Builds canonical tables from delimited sources.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    source: SourceConfig,
    config: NormalizerConfig,
}

impl Normalizer {
    /// Create a normalizer.
    pub fn new(source: SourceConfig, config: NormalizerConfig) -> Self {
        Self { source, config }
    }

    /// Create a normalizer from the top-level configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.source.clone(), config.normalizer)
    }

    /// Source reading configuration.
    pub fn source_config(&self) -> &SourceConfig {
        &self.source
    }

    /// Variant configuration.
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Read and normalize a file.
    pub fn normalize_path(&self, path: impl AsRef<Path>) -> Result<CanonicalTable> {
        let bytes = std::fs::read(path)?;
        self.normalize_bytes(&bytes)
    }

    /// Normalize an in-memory source.
    pub fn normalize_bytes(&self, bytes: &[u8]) -> Result<CanonicalTable> {
        let raw = RawTable::from_bytes(bytes, &self.source)?;
        self.normalize(&raw)
    }

    /// Normalize an already-read source.
    pub fn normalize(&self, raw: &RawTable) -> Result<CanonicalTable> {
        let cols = ColumnIndex::resolve(raw, &self.config)?;
        let mut report = LoadReport {
            rows_read: raw.rows_read(),
            skipped_rows: raw.skipped_rows(),
            ..Default::default()
        };

        let fields = self.categorical_fields();
        let mut partials: Vec<PartialRecord> = raw
            .rows()
            .iter()
            .map(|row| self.parse_row(row, &cols, &mut report))
            .collect();

        let one_hot_columns = Self::one_hot_columns(&fields, &partials);
        for partial in &mut partials {
            partial.record.one_hot = Self::encode(&one_hot_columns, &partial.record);
        }

        let median = Self::speed_median(&partials)?;
        let mut records: Vec<RaceRecord> = partials
            .into_iter()
            .map(|p| {
                let mut record = p.record;
                match (p.speed, median) {
                    (Some(speed), _) => record.best_lap_kph = speed,
                    (None, Some(m)) => {
                        record.best_lap_kph = m;
                        report.speed_filled += 1;
                    }
                    // Unreachable: speed_median errors when rows exist but none parse.
                    (None, None) => {}
                }
                record
            })
            .collect();

        derive_pit_signal(&mut records, self.config.pit_signal_policy);

        if report.speed_filled > 0 {
            warn!(
                filled = report.speed_filled,
                median = median.unwrap_or_default(),
                "median-filled unparseable speeds"
            );
        }
        info!(
            rows = records.len(),
            skipped = report.skipped_rows,
            one_hot_columns = one_hot_columns.len(),
            invalid_total_time = report.invalid_total_time,
            invalid_best_lap = report.invalid_best_lap,
            "normalized race results"
        );

        Ok(CanonicalTable::new(
            records,
            one_hot_columns,
            self.config.pit_signal_policy,
            median,
            report,
        ))
    }

    fn categorical_fields(&self) -> Vec<CategoricalField> {
        let mut fields = vec![CategoricalField::Tyres];
        if self.config.include_category_one_hot {
            fields.push(CategoricalField::Category);
        }
        fields
    }

    fn parse_row(&self, row: &[String], cols: &ColumnIndex, report: &mut LoadReport) -> PartialRecord {
        let text = |idx: usize| non_empty(&row[idx]).map(str::to_string);

        let category = cols.category.and_then(|idx| text(idx));
        let category = if self.config.include_category_one_hot {
            Some(category.unwrap_or_else(|| MISSING_CATEGORY.to_string()))
        } else {
            category
        };

        let total_time = parse_total_time(&row[cols.total_time]);
        if total_time.is_none() {
            report.invalid_total_time += 1;
        }
        let lap_record_seconds = parse_lap_time(&row[cols.best_lap_time]);
        if lap_record_seconds.is_none() {
            report.invalid_best_lap += 1;
        }
        let pitstops = parse_count(&row[cols.pitstops]).unwrap_or_else(|| {
            report.invalid_pitstops += 1;
            0
        });
        let laps = parse_count(&row[cols.laps]).unwrap_or_else(|| {
            report.invalid_laps += 1;
            0
        });

        PartialRecord {
            speed: parse_speed(&row[cols.best_lap_kph]),
            record: RaceRecord {
                car_number: row[cols.car_number].trim().to_string(),
                team: text(cols.team),
                drivers: text(cols.drivers),
                category,
                tyres: text(cols.tyres).unwrap_or_else(|| MISSING_CATEGORY.to_string()),
                best_lap_kph: f64::NAN,
                total_time_seconds: total_time.map(|t| t.seconds),
                hour: total_time.map(|t| t.hour),
                lap_record_seconds,
                pitstops,
                laps,
                pit_signal: 0,
                one_hot: Vec::new(),
            },
        }
    }

    fn field_value(record: &RaceRecord, field: CategoricalField) -> Option<&str> {
        match field {
            CategoricalField::Tyres => Some(record.tyres.as_str()),
            CategoricalField::Category => record.category.as_deref(),
        }
    }

    /// One column per distinct value, fields in order, values sorted.
    fn one_hot_columns(fields: &[CategoricalField], partials: &[PartialRecord]) -> Vec<OneHotColumn> {
        let mut distinct: BTreeMap<CategoricalField, BTreeSet<&str>> =
            fields.iter().map(|&f| (f, BTreeSet::new())).collect();
        for partial in partials {
            for (&field, values) in distinct.iter_mut() {
                if let Some(v) = Self::field_value(&partial.record, field) {
                    values.insert(v);
                }
            }
        }

        let distinct = &distinct;
        fields
            .iter()
            .flat_map(move |field| {
                distinct[field].iter().map(move |value| OneHotColumn {
                    field: *field,
                    value: value.to_string(),
                })
            })
            .collect()
    }

    fn encode(columns: &[OneHotColumn], record: &RaceRecord) -> Vec<bool> {
        columns
            .iter()
            .map(|c| Self::field_value(record, c.field) == Some(c.value.as_str()))
            .collect()
    }

    fn speed_median(partials: &[PartialRecord]) -> Result<Option<f64>> {
        let parsed: Vec<f64> = partials.iter().filter_map(|p| p.speed).collect();
        if parsed.is_empty() {
            if partials.is_empty() {
                return Ok(None);
            }
            return Err(Error::insufficient_data(
                "no parseable Best Lap Kph value to fill from",
            ));
        }
        Ok(Some(Data::new(parsed).median()))
    }
}

/// Fill [`RaceRecord::pit_signal`] for every record, in source order.
pub fn derive_pit_signal(records: &mut [RaceRecord], policy: PitSignalPolicy) {
    match policy {
        PitSignalPolicy::EventCount => {
            let mut previous: HashMap<String, u32> = HashMap::new();
            for record in records.iter_mut() {
                record.pit_signal = match previous.insert(record.car_number.clone(), record.pitstops) {
                    Some(prev) => record.pitstops.saturating_sub(prev),
                    None => 0,
                };
            }
        }
        PitSignalPolicy::BinaryThreshold => {
            for record in records.iter_mut() {
                record.pit_signal = u32::from(record.pitstops > 0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lemans_core::config::MalformedRowPolicy;
    use std::io::Write;

    const HEADER: &str = "S.No,Status,# Car No.,Team,Drivers,Category,Tyres,Best Lap Kph,Total Time,Best LapTime,Pitstops,Laps";

    fn csv(rows: &[&str]) -> Vec<u8> {
        let mut text = HEADER.to_string();
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text.push('\n');
        text.into_bytes()
    }

    fn sample() -> Vec<u8> {
        csv(&[
            "1,Running,12,Alpine,A/B/C,HYPERCAR,Michelin,230.5,13:45:30,03:27.451,0,10",
            "2,Running,12,Alpine,A/B/C,HYPERCAR,Michelin,231.0,14:45:30,03:27.100,1,24",
            "3,Running,7,Toyota,D/E/F,HYPERCAR,,bad,bad,bad,x,",
            "4,Running,12,Alpine,A/B/C,HYPERCAR,Michelin,232.0,15:45:30,03:26.900,1,38",
            "5,Running,007,Ferrari,G/H/I,,Goodyear,240.0,16:00:00,03:25.000,2,40",
            "6,Running,12,Alpine,A/B/C,HYPERCAR,Michelin,229.0,16:45:30,03:28.000,3,52",
        ])
    }

    fn load(config: NormalizerConfig) -> CanonicalTable {
        Normalizer::new(SourceConfig::default(), config)
            .normalize_bytes(&sample())
            .unwrap()
    }

    #[test]
    fn test_time_derivation() {
        let table = load(NormalizerConfig::full());
        let first = &table.records()[0];
        assert_relative_eq!(first.total_time_seconds.unwrap(), 49530.0);
        assert_eq!(first.hour, Some(13));
        assert_relative_eq!(first.lap_record_seconds.unwrap(), 207.451, epsilon = 1e-9);

        let bad = &table.records()[2];
        assert_eq!(bad.total_time_seconds, None);
        assert_eq!(bad.hour, None);
        assert_eq!(bad.lap_record_seconds, None);
    }

    #[test]
    fn test_car_number_kept_as_text() {
        let table = load(NormalizerConfig::full());
        assert_eq!(table.records()[4].car_number, "007");
    }

    #[test]
    fn test_speed_median_fill() {
        let table = load(NormalizerConfig::full());
        // Parsed speeds: 229, 230.5, 231, 232, 240 -> median 231
        assert_eq!(table.speed_fill_median(), Some(231.0));
        assert_eq!(table.records()[2].best_lap_kph, 231.0);
        assert_eq!(table.report().speed_filled, 1);
        assert!(table.records().iter().all(|r| r.best_lap_kph.is_finite()));
    }

    #[test]
    fn test_even_count_median() {
        let data = csv(&[
            "1,R,1,T,D,C,M,200,01:00:00,03:00.0,0,1",
            "2,R,2,T,D,C,M,210,01:00:00,03:00.0,0,1",
            "3,R,3,T,D,C,M,?,01:00:00,03:00.0,0,1",
        ]);
        let table = Normalizer::default().normalize_bytes(&data).unwrap();
        assert_relative_eq!(table.records()[2].best_lap_kph, 205.0);
    }

    #[test]
    fn test_all_speeds_invalid_is_fatal() {
        let data = csv(&["1,R,1,T,D,C,M,?,01:00:00,03:00.0,0,1"]);
        let err = Normalizer::default().normalize_bytes(&data).unwrap_err();
        assert!(matches!(err, Error::InsufficientData(_)));
    }

    #[test]
    fn test_header_only_source() {
        let table = Normalizer::default().normalize_bytes(&csv(&[])).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.speed_fill_median(), None);
    }

    #[test]
    fn test_count_zero_fill() {
        let table = load(NormalizerConfig::full());
        let bad = &table.records()[2];
        assert_eq!(bad.pitstops, 0);
        assert_eq!(bad.laps, 0);
        assert_eq!(table.report().invalid_pitstops, 1);
        assert_eq!(table.report().invalid_laps, 1);
    }

    #[test]
    fn test_one_hot_full_variant() {
        let table = load(NormalizerConfig::full());
        let names: Vec<String> = table.one_hot_columns().iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec![
                "Tyres_Goodyear",
                "Tyres_Michelin",
                "Tyres_Missing",
                "Category_HYPERCAR",
                "Category_Missing",
            ]
        );

        for record in table.records() {
            for field in [CategoricalField::Tyres, CategoricalField::Category] {
                let set = table
                    .one_hot_columns_for(field)
                    .filter(|(i, _)| record.one_hot[*i])
                    .count();
                assert_eq!(set, 1);
            }
        }
        assert_eq!(table.records()[2].tyres, MISSING_CATEGORY);
        assert_eq!(table.records()[4].category.as_deref(), Some(MISSING_CATEGORY));
    }

    #[test]
    fn test_one_hot_compact_variant() {
        let table = load(NormalizerConfig::compact());
        assert!(table
            .one_hot_columns()
            .iter()
            .all(|c| c.field == CategoricalField::Tyres));
        assert_eq!(table.records()[4].category, None);
    }

    #[test]
    fn test_category_column_optional_in_compact_variant() {
        let data = b"Car No.,Team,Drivers,Tyres,Best Lap Kph,Total Time,Best LapTime,Pitstops,Laps\n\
                     7,Toyota,D,Michelin,240,01:00:00,03:00.0,0,1\n";
        let normalizer = Normalizer::new(SourceConfig::default(), NormalizerConfig::compact());
        assert_eq!(normalizer.normalize_bytes(data).unwrap().len(), 1);

        let err = Normalizer::default().normalize_bytes(data).unwrap_err();
        assert!(matches!(err, Error::MissingColumn(ref c) if c == "Category"));
    }

    #[test]
    fn test_pit_event_sequence() {
        let table = load(NormalizerConfig::full());
        let events: Vec<u32> = table
            .records()
            .iter()
            .filter(|r| r.car_number == "12")
            .map(|r| r.pit_signal)
            .collect();
        assert_eq!(events, vec![0, 1, 0, 2]);
    }

    #[test]
    fn test_pit_event_clips_decrease() {
        let mut records: Vec<RaceRecord> = [2, 5, 3, 4]
            .iter()
            .map(|&p| RaceRecord {
                car_number: "8".to_string(),
                team: None,
                drivers: None,
                category: None,
                tyres: MISSING_CATEGORY.to_string(),
                best_lap_kph: 0.0,
                total_time_seconds: None,
                hour: None,
                lap_record_seconds: None,
                pitstops: p,
                laps: 0,
                pit_signal: 0,
                one_hot: Vec::new(),
            })
            .collect();
        derive_pit_signal(&mut records, PitSignalPolicy::EventCount);
        let events: Vec<u32> = records.iter().map(|r| r.pit_signal).collect();
        assert_eq!(events, vec![0, 3, 0, 1]);
    }

    #[test]
    fn test_pit_binary() {
        let table = load(NormalizerConfig::compact());
        let flags: Vec<u32> = table.records().iter().map(|r| r.pit_signal).collect();
        assert_eq!(flags, vec![0, 1, 0, 1, 1, 1]);
        assert_eq!(table.pit_signal_policy(), PitSignalPolicy::BinaryThreshold);
    }

    #[test]
    fn test_hour_in_range() {
        let table = load(NormalizerConfig::full());
        assert!(table.records().iter().all(|r| r.hour.map_or(true, |h| h <= 23)));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(load(NormalizerConfig::full()), load(NormalizerConfig::full()));
    }

    #[test]
    fn test_skipped_rows_are_reported() {
        let data = csv(&[
            "1,Running,12,Alpine,A/B/C,HYPERCAR,Michelin,230.5,13:45:30,03:27.451,0,10",
            "2,Running,12,Alpine,A/B/C,HYPERCAR,Michelin,231.0",
            "3,Running,12,Alpine,A/B/C,HYPERCAR,Michelin,232.0,15:45:30,03:26.900,1,38",
        ]);
        let table = Normalizer::default().normalize_bytes(&data).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.report().rows_read, 3);
        assert_eq!(table.report().skipped_rows, 1);
        // Every row read is either kept or counted as skipped.
        assert_eq!(
            table.report().rows_read,
            table.len() as u64 + table.report().skipped_rows
        );
        // The pit sequence runs over the kept rows only.
        let pits: Vec<u32> = table.records().iter().map(|r| r.pit_signal).collect();
        assert_eq!(pits, vec![0, 1]);
    }

    #[test]
    fn test_fail_policy_aborts_load() {
        let data = csv(&[
            "1,Running,12,Alpine,A/B/C,HYPERCAR,Michelin,230.5,13:45:30,03:27.451,0,10",
            "2,Running,12,Alpine,A/B/C,HYPERCAR,Michelin,231.0",
        ]);
        let source = SourceConfig {
            malformed_rows: MalformedRowPolicy::Fail,
            ..Default::default()
        };
        let err = Normalizer::new(source, NormalizerConfig::full())
            .normalize_bytes(&data)
            .unwrap_err();

        assert!(matches!(
            err,
            Error::MalformedRow {
                line: 3,
                expected: 12,
                found: 8
            }
        ));
        assert!(err.is_load_error());
    }

    #[test]
    fn test_well_formed_source_skips_nothing() {
        let table = load(NormalizerConfig::full());
        assert_eq!(table.report().rows_read, 6);
        assert_eq!(table.report().skipped_rows, 0);
    }

    #[test]
    fn test_normalize_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&sample()).unwrap();
        file.flush().unwrap();

        let from_file = Normalizer::default().normalize_path(file.path()).unwrap();
        assert_eq!(from_file, load(NormalizerConfig::full()));
    }

    #[test]
    fn test_normalize_missing_path() {
        let err = Normalizer::default()
            .normalize_path("/nonexistent/24LeMans.csv")
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
