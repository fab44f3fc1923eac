use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FetchedUsage, LimitItem, QuotaUsageDetail, ToolDetail};
use crate::upstream::{ApiTimezone, FetchResult};

/// One hourly sample of the model-usage series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub time: DateTime<Utc>,
    pub call_count: Option<i64>,
    pub tokens_usage: Option<i64>,
}

/// Input for a new `model_usage` row and its series.
#[derive(Debug, Clone, PartialEq)]
pub struct NewModelUsage {
    pub total_model_call_count: i64,
    pub total_tokens_usage: i64,
    pub time_series: Vec<TimeSeriesPoint>,
}

/// Input for a new `tool_usage` row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewToolUsage {
    pub total_network_search_count: i64,
    pub total_web_read_mcp_count: i64,
    pub total_zread_mcp_count: i64,
    pub total_search_mcp_count: i64,
    pub tool_details: Vec<ToolDetail>,
    /// Hour labels exactly as the API sent them.
    pub x_time: Vec<String>,
}

/// Everything one poll cycle persists, written in a single transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUsageSnapshot {
    pub model: NewModelUsage,
    pub tool: NewToolUsage,
    pub quotas: Vec<LimitItem>,
}

impl NewUsageSnapshot {
    /// Convert validated responses into storage input, attaching `tz` to
    /// the naive sample times.
    ///
    /// Sample `i` takes `model_call_count[i]` and `tokens_usage[i]` when
    /// present; a short or null entry becomes `None`.
    pub fn from_fetched(usage: &FetchedUsage, tz: &ApiTimezone) -> FetchResult<Self> {
        let model = &usage.model;
        let time_series = model
            .x_time
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                Ok(TimeSeriesPoint {
                    time: tz.localize(raw)?.with_timezone(&Utc),
                    call_count: model.model_call_count.get(i).copied().flatten(),
                    tokens_usage: model.tokens_usage.get(i).copied().flatten(),
                })
            })
            .collect::<FetchResult<Vec<_>>>()?;

        let tool = &usage.tool.total_usage;

        Ok(Self {
            model: NewModelUsage {
                total_model_call_count: model.total_usage.total_model_call_count,
                total_tokens_usage: model.total_usage.total_tokens_usage,
                time_series,
            },
            tool: NewToolUsage {
                total_network_search_count: tool.total_network_search_count,
                total_web_read_mcp_count: tool.total_web_read_mcp_count,
                total_zread_mcp_count: tool.total_zread_mcp_count,
                total_search_mcp_count: tool.total_search_mcp_count,
                tool_details: tool.tool_details.clone(),
                x_time: usage.tool.x_time.clone(),
            },
            quotas: usage.quota.limits.clone(),
        })
    }
}

/// Row ids assigned by [`crate::db::UsageSnapshotRepo::record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSnapshot {
    pub model_usage_id: i64,
    pub tool_usage_id: i64,
    pub quota_limit_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelUsageRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub total_model_call_count: i64,
    pub total_tokens_usage: i64,
    /// Ordered by `time`, oldest first.
    pub time_series: Vec<TimeSeriesRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSeriesRecord {
    pub id: i64,
    pub model_usage_id: i64,
    pub created_at: DateTime<Utc>,
    pub time: DateTime<Utc>,
    pub call_count: Option<i64>,
    pub tokens_usage: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolUsageRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub total_network_search_count: i64,
    pub total_web_read_mcp_count: i64,
    pub total_zread_mcp_count: i64,
    pub total_search_mcp_count: i64,
    pub tool_details: Vec<ToolDetail>,
    pub x_time: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaLimitRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub percentage: f64,
    pub current_usage: Option<i64>,
    pub total: Option<i64>,
    pub usage_details: Option<Vec<QuotaUsageDetail>>,
}

/// The most recent stored snapshot of each dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatestUsage {
    pub model: Option<ModelUsageRecord>,
    pub tool: Option<ToolUsageRecord>,
    /// One row per quota type, ordered by type.
    pub quotas: Vec<QuotaLimitRecord>,
}

impl LatestUsage {
    pub fn is_empty(&self) -> bool {
        self.model.is_none() && self.tool.is_none() && self.quotas.is_empty()
    }
}
