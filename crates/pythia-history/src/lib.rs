//! Pythia history - snapshots taken before destructive rewrites
//!
//! Snapshots are plain files named `<filename>_<YYYYMMDD_HHMMSS>.bak` in a
//! hidden directory inside the watched folder. They are never modified after
//! being written.

mod backup;
mod rollback;

pub use backup::{BackupSnapshot, BackupStore, SNAPSHOT_SUFFIX, TIMESTAMP_FORMAT};
pub use rollback::RollbackEngine;
