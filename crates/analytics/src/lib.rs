//! Filtering and aggregation for the Le Mans results dashboard.
//!
//! This crate handles:
//! - Row filtering by predicate conjunction
//! - Filter domain (teams, drivers, hour and lap bounds)
//! - Hour/car aggregate table and per-hour pit summary
//! - Key metrics, speed distribution and speed heatmap
//! - Dashboard snapshots combining all of the above

pub mod filter;
pub mod options;
pub mod aggregate;
pub mod metrics;
pub mod speed;
pub mod engine;

pub use filter::{filter, DriverFilter, FilterSpec, FilteredView};
pub use options::FilterOptions;
pub use aggregate::{aggregate_by_hour_car, pit_summary, HourCarSummary, PitSummary};
pub use metrics::KeyMetrics;
pub use speed::{speed_by_hour_team, speed_distribution, SpeedHistogram};
pub use engine::{Dashboard, DashboardSnapshot};
