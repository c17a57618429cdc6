//! Remote sync for the session log.
//!
//! Finished records are queued locally and pushed to the focus API in
//! batches. The queue survives restarts, and a failed push never affects the
//! timer: records simply stay queued until the next flush.

pub mod adapter;
pub mod client;
pub mod queue;
pub mod types;


pub use adapter::SyncAdapter;
pub use client::RemoteClient;
pub use queue::SyncQueue;
pub use types::{SyncError, SyncReport, SyncStatus};
