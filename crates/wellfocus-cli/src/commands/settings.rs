use clap::Subcommand;
use wellfocus_core::storage::Database;
use wellfocus_core::{Clock, SessionStore, SettingsPatch, SystemClock};

use super::{load_engine, load_settings, print_json, save_engine, CliResult};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print current settings as JSON
    Show,
    /// Change one or more settings; the whole change is rejected if any value is out of range
    Set {
        /// Focus phase length in minutes
        #[arg(long, allow_negative_numbers = true)]
        focus: Option<i64>,
        /// Short break length in minutes
        #[arg(long, allow_negative_numbers = true)]
        short_break: Option<i64>,
        /// Long break length in minutes
        #[arg(long, allow_negative_numbers = true)]
        long_break: Option<i64>,
        /// Focus phases before a long break
        #[arg(long, allow_negative_numbers = true)]
        every: Option<i64>,
    },
}

pub fn run(action: SettingsAction) -> CliResult {
    let db = Database::open()?;

    match action {
        SettingsAction::Show => {
            print_json(&load_settings(&db)?)?;
        }
        SettingsAction::Set {
            focus,
            short_break,
            long_break,
            every,
        } => {
            let patch = SettingsPatch {
                focus_duration: focus,
                short_break_duration: short_break,
                long_break_duration: long_break,
                sessions_before_long_break: every,
            };
            if patch.is_empty() {
                return Err("nothing to change (use --focus, --short-break, --long-break or --every)".into());
            }

            let mut engine = load_engine(&db)?;
            engine.set_settings(load_settings(&db)?)?;
            engine.update_settings(&patch, SystemClock.now())?;
            db.save_settings(engine.settings())?;
            save_engine(&db, &engine)?;
            print_json(engine.settings())?;
        }
    }
    Ok(())
}
