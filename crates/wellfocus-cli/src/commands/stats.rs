use chrono::{TimeDelta, Utc};
use clap::Subcommand;
use serde_json::json;
use wellfocus_core::storage::Database;
use wellfocus_core::{SessionStore, StatsAggregator};

use super::{load_config, print_json, CliResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's sessions, minutes and current streak
    Today,
    /// Per-day totals for the last seven days
    Week,
    /// Current and longest day streaks
    Streak,
}

pub fn run(action: StatsAction) -> CliResult {
    let config = load_config()?;
    let db = Database::open()?;
    let records = db.all()?;
    let aggregator = StatsAggregator::new(config.utc_offset());
    let today = aggregator.day_of(Utc::now());

    match action {
        StatsAction::Today => {
            print_json(&aggregator.compute(&records, today))?;
        }
        StatsAction::Week => {
            let from = today - TimeDelta::days(6);
            print_json(&aggregator.daily_summaries(&records, from, today))?;
        }
        StatsAction::Streak => {
            let stats = aggregator.compute(&records, today);
            print_json(&json!({
                "currentStreak": stats.current_streak,
                "longestStreak": aggregator.longest_streak(&records),
            }))?;
        }
    }
    Ok(())
}
