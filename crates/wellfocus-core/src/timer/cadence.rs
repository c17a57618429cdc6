//! Short/long break selection.

use super::session::SessionType;

/// Type of the phase that follows `completed`.
///
/// `focus_count` is the number of focus phases completed so far in this run,
/// *including* the one that just finished. Every `every`-th focus phase earns
/// a long break; all breaks are followed by focus.
pub fn next_session_type(completed: SessionType, focus_count: u64, every: u32) -> SessionType {
    match completed {
        SessionType::Focus => {
            let every = u64::from(every.max(1));
            if focus_count > 0 && focus_count % every == 0 {
                SessionType::LongBreak
            } else {
                SessionType::ShortBreak
            }
        }
        SessionType::ShortBreak | SessionType::LongBreak => SessionType::Focus,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fourth_focus_earns_long_break() {
        let picks: Vec<_> = (1..=8)
            .map(|n| next_session_type(SessionType::Focus, n, 4))
            .collect();
        assert_eq!(
            picks,
            vec![
                SessionType::ShortBreak,
                SessionType::ShortBreak,
                SessionType::ShortBreak,
                SessionType::LongBreak,
                SessionType::ShortBreak,
                SessionType::ShortBreak,
                SessionType::ShortBreak,
                SessionType::LongBreak,
            ]
        );
    }

    #[test]
    fn breaks_are_followed_by_focus() {
        assert_eq!(next_session_type(SessionType::ShortBreak, 3, 4), SessionType::Focus);
        assert_eq!(next_session_type(SessionType::LongBreak, 4, 4), SessionType::Focus);
    }

    #[test]
    fn cadence_of_one_always_long() {
        for n in 1..5 {
            assert_eq!(next_session_type(SessionType::Focus, n, 1), SessionType::LongBreak);
        }
    }

    proptest! {
        #[test]
        fn long_break_exactly_on_multiples(n in 1u64..10_000, every in 1u32..=12) {
            let next = next_session_type(SessionType::Focus, n, every);
            let expect_long = n % u64::from(every) == 0;
            prop_assert_eq!(next == SessionType::LongBreak, expect_long);
            prop_assert!(next.is_break());
        }
    }
}
