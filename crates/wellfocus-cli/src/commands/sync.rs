use clap::Subcommand;
use wellfocus_core::storage::Database;
use wellfocus_core::sync::{SyncAdapter, SyncQueue, SyncStatus};

use super::{load_config, print_json, CliResult};

#[derive(Subcommand)]
pub enum SyncAction {
    /// Upload queued sessions (one batch)
    Push,
    /// Fetch remote sessions and add the ones missing locally
    Pull {
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Show sync configuration and queue length
    Status,
    /// Print stats as computed by the remote
    RemoteStats,
}

pub fn run(action: SyncAction) -> CliResult {
    let config = load_config()?;

    if let SyncAction::Status = action {
        let status = match SyncAdapter::from_config(&config.sync) {
            Ok(adapter) => tokio::runtime::Runtime::new()?.block_on(adapter.status()),
            Err(_) => SyncStatus {
                enabled: config.sync.enabled,
                base_url: (!config.sync.base_url.is_empty()).then(|| config.sync.base_url.clone()),
                pending_count: SyncQueue::open()?.len(),
                last_flush_at: None,
            },
        };
        return print_json(&status);
    }

    let adapter = SyncAdapter::from_config(&config.sync)?;
    let runtime = tokio::runtime::Runtime::new()?;

    match action {
        SyncAction::Push => {
            let report = runtime.block_on(adapter.flush())?;
            print_json(&report)?;
            if !report.is_clean() {
                return Err(format!("{} session(s) failed to upload", report.failed).into());
            }
        }
        SyncAction::Pull { limit } => {
            let db = Database::open()?;
            let added = runtime.block_on(adapter.restore(&db, limit))?;
            print_json(&serde_json::json!({ "added": added }))?;
        }
        SyncAction::RemoteStats => {
            let stats = runtime.block_on(adapter.client().fetch_stats())?;
            print_json(&stats)?;
        }
        SyncAction::Status => {}
    }
    Ok(())
}
