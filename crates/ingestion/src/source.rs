//! Delimited source reading.
//!
//! Reads raw bytes with the `csv` crate and decodes every field as ISO-8859-1,
//! so legacy exports that are not valid UTF-8 still load.

use csv::{ByteRecord, ReaderBuilder};
use lemans_core::config::{MalformedRowPolicy, SourceConfig};
use lemans_core::{Error, Result};
use tracing::warn;

/// Administrative columns removed right after reading.
pub const DROPPED_COLUMNS: [&str; 2] = ["S.No", "Status"];

/// Decode ISO-8859-1 bytes; every byte maps to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Normalize a header name: trim, strip leading `#`/space markers, trim again.
pub fn normalize_header(name: &str) -> String {
    name.trim()
        .trim_start_matches(|c| c == '#' || c == ' ')
        .trim()
        .to_string()
}

/// Source rows as text, before any typing.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    rows_read: u64,
    skipped_rows: u64,
}

impl RawTable {
    /// Read a delimited source from bytes.
    pub fn from_bytes(bytes: &[u8], config: &SourceConfig) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(config.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);

        let mut records = reader.byte_records();
        let header_record = match records.next() {
            Some(record) => record?,
            None => return Err(Error::data("source has no header row")),
        };

        let all_headers: Vec<String> = header_record
            .iter()
            .map(|h| normalize_header(&decode_latin1(h)))
            .collect();
        let keep: Vec<usize> = all_headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !DROPPED_COLUMNS.contains(&h.as_str()))
            .map(|(i, _)| i)
            .collect();
        let headers = keep.iter().map(|&i| all_headers[i].clone()).collect();

        let mut table = RawTable {
            headers,
            ..Default::default()
        };

        for result in records {
            let record: ByteRecord = result?;
            table.rows_read += 1;

            if record.len() != all_headers.len() {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                match config.malformed_rows {
                    MalformedRowPolicy::Fail => {
                        return Err(Error::MalformedRow {
                            line,
                            expected: all_headers.len(),
                            found: record.len(),
                        });
                    }
                    MalformedRowPolicy::Skip => {
                        warn!(
                            line,
                            expected = all_headers.len(),
                            found = record.len(),
                            "skipping malformed row"
                        );
                        table.skipped_rows += 1;
                        continue;
                    }
                }
            }

            table
                .rows
                .push(keep.iter().map(|&i| decode_latin1(&record[i])).collect());
        }

        Ok(table)
    }

    /// Column names after dropping and normalization.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Kept rows, in source order.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Data rows read, including skipped ones.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Rows skipped as malformed.
    pub fn skipped_rows(&self) -> u64 {
        self.skipped_rows
    }

    /// Index of a column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of a column that must be present.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| Error::missing_column(name))
    }
}
