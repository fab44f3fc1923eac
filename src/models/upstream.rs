use serde::{Deserialize, Serialize};

/// Body of `GET /api/monitor/usage/model-usage`.
///
/// The three arrays are parallel: `model_call_count[i]` and `tokens_usage[i]`
/// belong to the hour in `x_time[i]`. Either count array may be shorter than
/// `x_time` or contain nulls for hours with no activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsageResponse {
    #[serde(rename = "x_time", default)]
    pub x_time: Vec<String>,
    #[serde(default)]
    pub model_call_count: Vec<Option<i64>>,
    #[serde(default)]
    pub tokens_usage: Vec<Option<i64>>,
    pub total_usage: ModelTotalUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTotalUsage {
    pub total_model_call_count: i64,
    pub total_tokens_usage: i64,
}

/// Body of `GET /api/monitor/usage/tool-usage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUsageResponse {
    #[serde(rename = "x_time", default)]
    pub x_time: Vec<String>,
    #[serde(default)]
    pub network_search_count: Vec<Option<i64>>,
    #[serde(default)]
    pub web_read_mcp_count: Vec<Option<i64>>,
    #[serde(default)]
    pub zread_mcp_count: Vec<Option<i64>>,
    pub total_usage: ToolTotalUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolTotalUsage {
    pub total_network_search_count: i64,
    pub total_web_read_mcp_count: i64,
    pub total_zread_mcp_count: i64,
    pub total_search_mcp_count: i64,
    #[serde(default)]
    pub tool_details: Vec<ToolDetail>,
}

/// Per-model tool call count. Serialized in the upstream's camelCase shape,
/// which is also how it is stored in `tool_usage.tool_details_json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDetail {
    pub model_name: String,
    pub total_usage_count: i64,
}

/// Quota limits after remapping. See [`crate::models::QuotaLimitEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaLimitResponse {
    pub limits: Vec<LimitItem>,
}

/// A quota limit in its display shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_usage: Option<i64>,
    /// Upstream spells this `totol`; the wire name is kept as-is.
    #[serde(rename = "totol", default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_details: Option<Vec<QuotaUsageDetail>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaUsageDetail {
    pub model_code: String,
    pub usage: i64,
}

/// The three responses of one fetch cycle, already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedUsage {
    pub model: ModelUsageResponse,
    pub tool: ToolUsageResponse,
    pub quota: QuotaLimitResponse,
}
