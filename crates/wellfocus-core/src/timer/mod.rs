mod cadence;
mod engine;
mod session;

pub use cadence::next_session_type;
pub use engine::{TimerEngine, TimerState};
pub use session::{
    progress, truncate_intention, ActiveSession, SessionRecord, SessionType, MAX_INTENTION_CHARS,
};
