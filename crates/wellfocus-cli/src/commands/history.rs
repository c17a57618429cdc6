use wellfocus_core::storage::Database;
use wellfocus_core::{SessionRecord, SessionStore};

use super::{print_json, CliResult};

pub fn run(limit: usize) -> CliResult {
    let db = Database::open()?;
    let records = db.list_recent(limit).collect::<Result<Vec<SessionRecord>, _>>()?;
    print_json(&records)
}
