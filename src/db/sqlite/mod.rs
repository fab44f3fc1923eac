mod usage_snapshots;

pub use usage_snapshots::SqliteUsageSnapshotRepo;
