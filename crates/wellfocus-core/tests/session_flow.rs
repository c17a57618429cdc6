//! End-to-end flow: controller + SQLite log + stats, across a reopen.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use wellfocus_core::{
    Clock, ControllerOptions, Database, Event, FocusController, ManualClock, SessionStore, SessionType,
    Settings, StatsAggregator, TimerState,
};

fn options() -> ControllerOptions {
    ControllerOptions {
        auto_advance: true,
        ..ControllerOptions::default()
    }
}

#[tokio::test]
async fn full_cycle_reaches_long_break_and_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wellfocus.db");
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap());

    {
        let db = Arc::new(Database::open_at(&path).unwrap());
        db.save_settings(&Settings::default()).unwrap();
        let ctl = FocusController::new(Arc::clone(&db), Arc::new(clock.clone()), options()).unwrap();

        let mut next = SessionType::Focus;
        for round in 1..=4 {
            ctl.start(None, Some(format!("round {round}"))).await.unwrap();
            clock.advance_secs(25 * 60);
            match ctl.poll().await.unwrap() {
                Event::TimerCompleted { record, next_session_type, .. } => {
                    assert_eq!(record.session_type, SessionType::Focus);
                    assert_eq!(record.duration_secs, 1500);
                    assert!(!record.was_interrupted);
                    next = next_session_type;
                }
                other => panic!("unexpected {other:?}"),
            }
            if round < 4 {
                assert_eq!(next, SessionType::ShortBreak);
                ctl.start(None, None).await.unwrap();
                clock.advance_secs(5 * 60);
                ctl.poll().await.unwrap();
            }
        }
        assert_eq!(next, SessionType::LongBreak);
        assert_eq!(ctl.state().await, TimerState::Idle);
        assert_eq!(ctl.shutdown().await, 0);
    }

    let db = Database::open_at(&path).unwrap();
    let records = db.all().unwrap();
    assert_eq!(records.len(), 7);
    assert_eq!(records[0].intention, "round 1");

    let recent: Vec<_> = db.list_recent(2).map(|r| r.unwrap().intention).collect();
    assert_eq!(recent, vec!["round 4".to_string(), String::new()]);

    let stats = StatsAggregator::utc().compute_at(&records, clock.now());
    assert_eq!(stats.today_sessions, 4);
    assert_eq!(stats.today_minutes, 100);
    assert_eq!(stats.completed_sessions, 4);
    assert_eq!(stats.current_streak, 1);
}

#[tokio::test]
async fn skip_after_ten_minutes_logs_interrupted_focus() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap());
    let db = Arc::new(Database::open_memory().unwrap());
    let ctl = FocusController::new(Arc::clone(&db), Arc::new(clock.clone()), options()).unwrap();

    ctl.start(Some(SessionType::Focus), None).await.unwrap();
    clock.advance_secs(600);
    let event = ctl.skip().await.unwrap();
    let record = event.record().unwrap();
    assert_eq!(record.duration_secs, 600);
    assert!(record.was_interrupted);

    match ctl.snapshot().await {
        Event::StateSnapshot {
            state,
            completed_focus_sessions,
            next_session_type,
            ..
        } => {
            assert_eq!(state, TimerState::Idle);
            assert_eq!(completed_focus_sessions, 1);
            assert_eq!(next_session_type, SessionType::ShortBreak);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(db.count().unwrap(), 1);
}

#[tokio::test]
async fn reset_from_idle_writes_nothing() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap());
    let db = Arc::new(Database::open_memory().unwrap());
    let ctl = FocusController::new(Arc::clone(&db), Arc::new(clock.clone()), options()).unwrap();

    assert!(ctl.reset().await.is_none());
    assert_eq!(db.count().unwrap(), 0);
}
