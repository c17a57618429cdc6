use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};

use crate::timer::SessionRecord;

/// Days holding at least one focus phase that ran to its end.
pub(super) fn qualifying_days(
    records: &[SessionRecord],
    day_of: impl Fn(DateTime<Utc>) -> NaiveDate,
) -> BTreeSet<NaiveDate> {
    records
        .iter()
        .filter(|r| r.counts_toward_streak())
        .map(|r| day_of(r.completed_at))
        .collect()
}

/// Length of the run of qualifying days ending today, or ending yesterday
/// when today has nothing yet (today is still in progress).
pub(super) fn current_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut cursor = if days.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if days.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };
    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        match cursor.pred_opt() {
            Some(prev) => cursor = prev,
            None => break,
        }
    }
    streak
}

pub(super) fn longest_streak(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut best = 0;
    let mut run = 0;
    let mut prev: Option<NaiveDate> = None;
    for &day in days {
        run = match prev {
            Some(p) if p.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        best = best.max(run);
        prev = Some(day);
    }
    best
}
