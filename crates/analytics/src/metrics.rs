//! Headline metrics for the summary panel.
//!
//! Every mean is `None` when the view holds no defined value, so an empty
//! selection reports "no data" instead of dividing by zero.

use crate::aggregate::Mean;
use crate::filter::FilteredView;
use serde::Serialize;

/// Key metrics over a filtered view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KeyMetrics {
    /// Mean elapsed race time in seconds.
    pub avg_total_time: Option<f64>,
    /// Mean best-lap time in seconds.
    pub avg_best_lap: Option<f64>,
    /// Mean pit signal per record.
    pub avg_pit_signal: Option<f64>,
    /// Number of records in the view.
    pub records: usize,
}

impl KeyMetrics {
    /// Compute metrics for a view.
    pub fn compute(view: &FilteredView<'_>) -> Self {
        let mut total_time = Mean::default();
        let mut best_lap = Mean::default();
        let mut pit = Mean::default();

        for r in view.iter() {
            total_time.add_opt(r.total_time_seconds);
            best_lap.add_opt(r.lap_record_seconds);
            pit.add(r.pit_signal as f64);
        }

        Self {
            avg_total_time: total_time.value(),
            avg_best_lap: best_lap.value(),
            avg_pit_signal: pit.value(),
            records: view.len(),
        }
    }

    /// Whether the view was empty.
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}

/// Format an optional metric, `"no data"` when undefined.
pub fn display_metric(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}"),
        None => "no data".to_string(),
    }
}
