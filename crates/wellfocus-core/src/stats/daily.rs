use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::SessionRecord;

/// Focus totals for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: NaiveDate,
    pub sessions: u64,
    pub completed_sessions: u64,
    pub minutes: u64,
}

impl DailySummary {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            sessions: 0,
            completed_sessions: 0,
            minutes: 0,
        }
    }
}

pub(super) fn summarize_range(
    records: &[SessionRecord],
    from: NaiveDate,
    to: NaiveDate,
    day_of: impl Fn(DateTime<Utc>) -> NaiveDate,
) -> Vec<DailySummary> {
    if from > to {
        return Vec::new();
    }
    let mut secs: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    let mut days: BTreeMap<NaiveDate, DailySummary> = from
        .iter_days()
        .take_while(|d| *d <= to)
        .map(|d| (d, DailySummary::empty(d)))
        .collect();

    for record in records.iter().filter(|r| r.is_focus()) {
        let date = day_of(record.completed_at);
        if let Some(summary) = days.get_mut(&date) {
            summary.sessions += 1;
            if !record.was_interrupted {
                summary.completed_sessions += 1;
            }
            *secs.entry(date).or_default() += record.duration_secs;
        }
    }
    for (date, total) in secs {
        if let Some(summary) = days.get_mut(&date) {
            summary.minutes = total.saturating_add(30) / 60;
        }
    }
    days.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::SessionType;
    use chrono::TimeZone;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn focus(day: u32, secs: u64, interrupted: bool) -> SessionRecord {
        SessionRecord {
            id: format!("{day}-{secs}"),
            session_type: SessionType::Focus,
            duration_secs: secs,
            was_interrupted: interrupted,
            intention: String::new(),
            completed_at: Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn week_view_fills_empty_days() {
        let records = vec![focus(3, 1500, false), focus(3, 600, true), focus(5, 1500, false)];
        let week = summarize_range(&records, d(1), d(7), |at| at.date_naive());
        assert_eq!(week.len(), 7);
        assert_eq!(week[0], DailySummary::empty(d(1)));
        assert_eq!(
            week[2],
            DailySummary {
                date: d(3),
                sessions: 2,
                completed_sessions: 1,
                minutes: 35,
            }
        );
        assert_eq!(week[4].minutes, 25);
    }

    #[test]
    fn records_outside_range_are_ignored() {
        let records = vec![focus(9, 1500, false)];
        let range = summarize_range(&records, d(1), d(2), |at| at.date_naive());
        assert!(range.iter().all(|s| s.sessions == 0));
    }

    #[test]
    fn inverted_range_is_empty() {
        assert!(summarize_range(&[], d(5), d(1), |at| at.date_naive()).is_empty());
    }
}
