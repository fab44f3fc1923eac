use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{LatestUsage, NewUsageSnapshot, QuotaUsageDetail, RecordedSnapshot},
};

/// Append-only storage for usage snapshots.
#[async_trait]
pub trait UsageSnapshotRepo: Send + Sync {
    /// Write the model row with its series, the tool row and one row per
    /// quota limit in a single transaction. Nothing is written on error.
    async fn record(&self, snapshot: &NewUsageSnapshot) -> DbResult<RecordedSnapshot>;

    /// Latest model row (with series), latest tool row and the latest row of
    /// each quota type. "Latest" is the newest `created_at`, ties broken by
    /// the highest id; for quotas it is the highest id per type.
    async fn latest(&self) -> DbResult<LatestUsage>;
}

/// `usage_details_json` is left NULL when there are no details.
#[cfg(any(feature = "database-sqlite", feature = "database-postgres"))]
pub(crate) fn encode_usage_details(
    details: Option<&Vec<QuotaUsageDetail>>,
) -> DbResult<Option<String>> {
    match details {
        Some(d) if !d.is_empty() => Ok(Some(serde_json::to_string(d)?)),
        _ => Ok(None),
    }
}

#[cfg(any(feature = "database-sqlite", feature = "database-postgres"))]
pub(crate) fn decode_usage_details(
    raw: Option<String>,
) -> DbResult<Option<Vec<QuotaUsageDetail>>> {
    Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
}
