use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use super::daily::{summarize_range, DailySummary};
use super::streak::{current_streak, longest_streak, qualifying_days};
use crate::timer::SessionRecord;

/// Same-day focus numbers and the running day streak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Focus records finished today, interrupted ones included.
    pub today_sessions: u64,
    /// Rounded minutes of focus actually run today.
    pub today_minutes: u64,
    /// Today's focus records that ran to their end.
    pub completed_sessions: u64,
    /// Consecutive days, ending today or yesterday, with a finished focus phase.
    pub current_streak: u32,
}

/// Maps timestamps onto calendar days in a fixed offset and derives stats.
#[derive(Debug, Clone, Copy)]
pub struct StatsAggregator {
    offset: FixedOffset,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::utc()
    }
}

impl StatsAggregator {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar day `at` falls on.
    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Compute stats for `today` from the full record sequence.
    pub fn compute(&self, records: &[SessionRecord], today: NaiveDate) -> Stats {
        let mut stats = Stats::default();
        let mut today_secs: u64 = 0;
        for record in records
            .iter()
            .filter(|r| r.is_focus() && self.day_of(r.completed_at) == today)
        {
            stats.today_sessions += 1;
            today_secs = today_secs.saturating_add(record.duration_secs);
            if !record.was_interrupted {
                stats.completed_sessions += 1;
            }
        }
        stats.today_minutes = today_secs.saturating_add(30) / 60;
        stats.current_streak = current_streak(&qualifying_days(records, |at| self.day_of(at)), today);
        stats
    }

    /// Stats as of `now`.
    pub fn compute_at(&self, records: &[SessionRecord], now: DateTime<Utc>) -> Stats {
        self.compute(records, self.day_of(now))
    }

    /// Longest run of qualifying days anywhere in the history.
    pub fn longest_streak(&self, records: &[SessionRecord]) -> u32 {
        longest_streak(&qualifying_days(records, |at| self.day_of(at)))
    }

    /// One summary per day in `from..=to`, oldest first. Days without focus
    /// records are included with zeros.
    pub fn daily_summaries(
        &self,
        records: &[SessionRecord],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<DailySummary> {
        summarize_range(records, from, to, |at| self.day_of(at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::SessionType;
    use chrono::{NaiveDate, TimeZone};
    use proptest::prelude::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn focus(id: &str, d: u32, hour: u32, secs: u64, interrupted: bool) -> SessionRecord {
        SessionRecord {
            id: id.into(),
            session_type: SessionType::Focus,
            duration_secs: secs,
            was_interrupted: interrupted,
            intention: String::new(),
            completed_at: Utc.with_ymd_and_hms(2024, 5, d, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn three_records_today_totaling_62_minutes() {
        let records = vec![
            focus("a", 10, 9, 1500, false),
            focus("b", 10, 11, 1500, false),
            focus("c", 10, 14, 720, true),
        ];
        let stats = StatsAggregator::utc().compute(&records, day(10));
        assert_eq!(stats.today_sessions, 3);
        assert_eq!(stats.today_minutes, 62);
        assert_eq!(stats.completed_sessions, 2);
        assert!(stats.current_streak >= 1);
    }

    #[test]
    fn breaks_and_other_days_are_excluded_from_today() {
        let mut brk = focus("brk", 10, 10, 300, false);
        brk.session_type = SessionType::ShortBreak;
        let records = vec![brk, focus("old", 9, 10, 1500, false)];
        let stats = StatsAggregator::utc().compute(&records, day(10));
        assert_eq!(stats.today_sessions, 0);
        assert_eq!(stats.today_minutes, 0);
        assert_eq!(stats.current_streak, 1);
    }

    #[test]
    fn minutes_round_half_up() {
        let records = vec![focus("a", 10, 9, 89, true), focus("b", 10, 9, 1, true)];
        assert_eq!(StatsAggregator::utc().compute(&records, day(10)).today_minutes, 2);
        let records = vec![focus("a", 10, 9, 89, true)];
        assert_eq!(StatsAggregator::utc().compute(&records, day(10)).today_minutes, 1);
    }

    #[test]
    fn offset_moves_late_evening_records_to_the_next_day() {
        // 23:30 UTC on the 9th is 01:30 on the 10th at UTC+2.
        let mut late = focus("late", 9, 23, 1500, false);
        late.completed_at += chrono::TimeDelta::minutes(30);
        let plus_two = StatsAggregator::new(FixedOffset::east_opt(2 * 3600).unwrap());
        assert_eq!(plus_two.compute(&[late.clone()], day(10)).today_sessions, 1);
        assert_eq!(StatsAggregator::utc().compute(&[late], day(10)).today_sessions, 0);
    }

    #[test]
    fn empty_history_is_all_zero() {
        assert_eq!(StatsAggregator::utc().compute(&[], day(10)), Stats::default());
    }

    #[test]
    fn stats_wire_format_is_camel_case() {
        let json = serde_json::to_value(Stats {
            today_sessions: 1,
            today_minutes: 25,
            completed_sessions: 1,
            current_streak: 3,
        })
        .unwrap();
        assert_eq!(json["todaySessions"], 1);
        assert_eq!(json["currentStreak"], 3);
    }

    fn arb_record() -> impl Strategy<Value = SessionRecord> {
        (0u32..3, 1u32..=20, 0u32..24, 0u64..4000, any::<bool>()).prop_map(
            |(kind, d, hour, secs, interrupted)| {
                let mut r = focus("r", d, hour, secs, interrupted);
                r.session_type = match kind {
                    0 => SessionType::Focus,
                    1 => SessionType::ShortBreak,
                    _ => SessionType::LongBreak,
                };
                r
            },
        )
    }

    proptest! {
        #[test]
        fn replay_is_deterministic_and_order_free(
            records in proptest::collection::vec(arb_record(), 0..60),
            today in 1u32..=21,
        ) {
            let agg = StatsAggregator::utc();
            let first = agg.compute(&records, day(today));
            prop_assert_eq!(first, agg.compute(&records, day(today)));
            let mut reversed = records.clone();
            reversed.reverse();
            prop_assert_eq!(first, agg.compute(&reversed, day(today)));
            prop_assert!(first.completed_sessions <= first.today_sessions);
        }
    }
}
