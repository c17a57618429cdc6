//! Statistics for focus sessions.
//!
//! Everything here is a pure function of the session log plus "today", which
//! is always passed in rather than cached so that an app left open across
//! midnight never reports yesterday's numbers. Replaying the same records
//! always yields the same result.

mod aggregator;
mod daily;
mod streak;

pub use aggregator::{Stats, StatsAggregator};
pub use daily::DailySummary;
