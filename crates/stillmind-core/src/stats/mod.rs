//! Statistics aggregation for focus sessions.
//!
//! Derives per-period (day/week) rollups from the raw session set. Rollups
//! are pure functions of the sessions in range and are always recomputed
//! whole, never incremented, so repeated invocation is idempotent.

mod aggregator;

pub use aggregator::{
    day_range, derive_rollup, today_range, week_range, week_range_now, Rollup,
    StatisticsAggregator,
};
