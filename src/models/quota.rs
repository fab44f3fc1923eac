//! Quota limit remapping.
//!
//! The quota endpoint reports limits under internal category codes. Known
//! codes are rewritten into display labels with a reduced field set; any
//! other entry is kept as-is.

use serde::Deserialize;

use super::{LimitItem, QuotaLimitResponse, QuotaUsageDetail};

pub const TOKENS_LIMIT_CODE: &str = "TOKENS_LIMIT";
pub const TIME_LIMIT_CODE: &str = "TIME_LIMIT";

pub const TOKENS_LIMIT_LABEL: &str = "Token usage(5 Hour)";
pub const TIME_LIMIT_LABEL: &str = "MCP usage(1 Month)";

/// A raw entry from the quota endpoint's `limits` array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub enum QuotaLimitEntry {
    /// Rolling 5-hour token allowance.
    Tokens { percentage: f64 },
    /// Monthly MCP tool allowance.
    Time {
        percentage: f64,
        current_value: Option<i64>,
        usage: Option<i64>,
        usage_details: Option<Vec<QuotaUsageDetail>>,
    },
    /// Any other category, already in display shape.
    Other(LimitItem),
}

#[derive(Deserialize)]
struct PercentageOnly {
    percentage: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeLimitFields {
    percentage: f64,
    #[serde(default)]
    current_value: Option<i64>,
    #[serde(default)]
    usage: Option<i64>,
    #[serde(default)]
    usage_details: Option<Vec<QuotaUsageDetail>>,
}

impl TryFrom<serde_json::Value> for QuotaLimitEntry {
    type Error = serde_json::Error;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value.get("type").and_then(|t| t.as_str()) {
            Some(TOKENS_LIMIT_CODE) => {
                let PercentageOnly { percentage } = serde_json::from_value(value)?;
                Ok(Self::Tokens { percentage })
            }
            Some(TIME_LIMIT_CODE) => {
                let fields: TimeLimitFields = serde_json::from_value(value)?;
                Ok(Self::Time {
                    percentage: fields.percentage,
                    current_value: fields.current_value,
                    usage: fields.usage,
                    usage_details: fields.usage_details,
                })
            }
            _ => serde_json::from_value(value).map(Self::Other),
        }
    }
}

impl QuotaLimitEntry {
    /// Rewrite into display shape.
    pub fn remap(self) -> LimitItem {
        match self {
            Self::Tokens { percentage } => LimitItem {
                kind: TOKENS_LIMIT_LABEL.to_string(),
                percentage,
                current_usage: None,
                total: None,
                usage_details: None,
            },
            Self::Time {
                percentage,
                current_value,
                usage,
                usage_details,
            } => LimitItem {
                kind: TIME_LIMIT_LABEL.to_string(),
                percentage,
                current_usage: current_value,
                total: usage,
                usage_details,
            },
            Self::Other(item) => item,
        }
    }
}

/// Raw body of `GET /api/monitor/usage/quota/limit`, after envelope unwrapping.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawQuotaLimitResponse {
    pub limits: Vec<QuotaLimitEntry>,
}

impl RawQuotaLimitResponse {
    pub fn remap(self) -> QuotaLimitResponse {
        QuotaLimitResponse {
            limits: self.limits.into_iter().map(QuotaLimitEntry::remap).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn remap_one(raw: serde_json::Value) -> LimitItem {
        serde_json::from_value::<QuotaLimitEntry>(raw).unwrap().remap()
    }

    #[test]
    fn test_tokens_limit_keeps_only_percentage() {
        let item = remap_one(json!({
            "type": "TOKENS_LIMIT",
            "percentage": 10,
            "currentValue": 123,
            "usage": 999,
            "unit": 3
        }));

        assert_eq!(item.kind, "Token usage(5 Hour)");
        assert_eq!(item.percentage, 10.0);
        assert_eq!(item.current_usage, None);
        assert_eq!(item.total, None);
        assert_eq!(item.usage_details, None);
    }

    #[test]
    fn test_time_limit_renames_fields() {
        let item = remap_one(json!({
            "type": "TIME_LIMIT",
            "percentage": 20,
            "currentValue": 5,
            "usage": 100,
            "remaining": 95,
            "usageDetails": [{"modelCode": "search-prime", "usage": 5}]
        }));

        assert_eq!(item.kind, "MCP usage(1 Month)");
        assert_eq!(item.percentage, 20.0);
        assert_eq!(item.current_usage, Some(5));
        assert_eq!(item.total, Some(100));
        assert_eq!(
            item.usage_details,
            Some(vec![QuotaUsageDetail {
                model_code: "search-prime".into(),
                usage: 5
            }])
        );
        assert_eq!(serde_json::to_value(&item).unwrap()["totol"], 100);
    }

    #[test]
    fn test_unknown_type_passes_through() {
        let item = remap_one(json!({
            "type": "REQUEST_LIMIT",
            "percentage": 3.5,
            "currentUsage": 7,
            "totol": 200
        }));

        assert_eq!(
            item,
            LimitItem {
                kind: "REQUEST_LIMIT".into(),
                percentage: 3.5,
                current_usage: Some(7),
                total: Some(200),
                usage_details: None,
            }
        );
    }

    #[rstest]
    #[case::tokens(json!({"type": "TOKENS_LIMIT"}))]
    #[case::time(json!({"type": "TIME_LIMIT", "usage": 100}))]
    #[case::other(json!({"type": "REQUEST_LIMIT"}))]
    #[case::no_type(json!({"percentage": 1}))]
    fn test_invalid_entries_rejected(#[case] raw: serde_json::Value) {
        assert!(serde_json::from_value::<QuotaLimitEntry>(raw).is_err());
    }

    #[test]
    fn test_response_remap_preserves_order() {
        let raw: RawQuotaLimitResponse = serde_json::from_value(json!({
            "limits": [
                {"type": "TOKENS_LIMIT", "percentage": 10},
                {"type": "TIME_LIMIT", "percentage": 20, "currentValue": 5, "usage": 100, "usageDetails": []}
            ]
        }))
        .unwrap();

        let remapped = raw.remap();
        assert_eq!(remapped.limits.len(), 2);
        assert_eq!(remapped.limits[0].kind, "Token usage(5 Hour)");
        assert_eq!(remapped.limits[1].kind, "MCP usage(1 Month)");
        assert_eq!(remapped.limits[1].total, Some(100));
        assert_eq!(remapped.limits[1].usage_details, Some(vec![]));
    }

    #[test]
    fn test_missing_limits_is_rejected() {
        let err = serde_json::from_value::<RawQuotaLimitResponse>(json!({
            "code": 1001,
            "msg": "Authorization token expired",
            "success": false
        }))
        .unwrap_err();
        assert!(err.to_string().contains("missing field `limits`"));

        let raw: RawQuotaLimitResponse = serde_json::from_value(json!({"limits": []})).unwrap();
        assert!(raw.remap().limits.is_empty());
    }
}
