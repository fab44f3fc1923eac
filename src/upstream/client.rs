use std::time::Duration;

use reqwest::{
    Client,
    header::{ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
use url::Url;

use super::{FetchError, FetchResult, QueryWindow, UsageEndpoints};
use crate::{
    config::UpstreamConfig,
    models::{
        FetchedUsage, ModelUsageResponse, QuotaLimitResponse, RawQuotaLimitResponse,
        ToolUsageResponse,
    },
};

/// Fetches model, tool and quota usage from the monitor API.
#[derive(Clone)]
pub struct UsageFetcher {
    http_client: Client,
    endpoints: UsageEndpoints,
    auth_token: String,
}

impl UsageFetcher {
    pub fn from_config(config: &UpstreamConfig) -> FetchResult<Self> {
        let endpoints = UsageEndpoints::from_base_url(&config.base_url)?;
        Self::new(endpoints, config.auth_token.clone(), config.timeout())
    }

    pub fn new(
        endpoints: UsageEndpoints,
        auth_token: impl Into<String>,
        timeout: Duration,
    ) -> FetchResult<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            endpoints,
            auth_token: auth_token.into(),
        })
    }

    /// Fetch all three dimensions for the window ending now.
    pub async fn fetch_all(&self) -> FetchResult<FetchedUsage> {
        self.fetch_all_in(&QueryWindow::now_local()).await
    }

    /// Fetch model, tool and quota usage, in that order.
    pub async fn fetch_all_in(&self, window: &QueryWindow) -> FetchResult<FetchedUsage> {
        let model = self.fetch_model_usage(window).await?;
        let tool = self.fetch_tool_usage(window).await?;
        let quota = self.fetch_quota_limits().await?;

        tracing::debug!(
            platform = %self.endpoints.platform,
            samples = model.x_time.len(),
            limits = quota.limits.len(),
            "Fetched usage"
        );

        Ok(FetchedUsage { model, tool, quota })
    }

    pub async fn fetch_model_usage(&self, window: &QueryWindow) -> FetchResult<ModelUsageResponse> {
        self.get_json("model", &self.endpoints.model, Some(window))
            .await
    }

    pub async fn fetch_tool_usage(&self, window: &QueryWindow) -> FetchResult<ToolUsageResponse> {
        self.get_json("tool", &self.endpoints.tool, Some(window))
            .await
    }

    /// Quota limits, remapped to display shape.
    pub async fn fetch_quota_limits(&self) -> FetchResult<QuotaLimitResponse> {
        let raw: RawQuotaLimitResponse = self.get_json("quota", &self.endpoints.quota, None).await?;
        Ok(raw.remap())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: &Url,
        window: Option<&QueryWindow>,
    ) -> FetchResult<T> {
        let mut request = self
            .http_client
            .get(url.clone())
            .header(AUTHORIZATION, &self.auth_token)
            .header(ACCEPT_LANGUAGE, "en-US,en")
            .header(CONTENT_TYPE, "application/json");
        if let Some(window) = window {
            request = request.query(&window.query_params());
        }

        let response = request.send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|source| FetchError::Decode { endpoint, source })?;

        serde_json::from_value(unwrap_envelope(value))
            .map_err(|source| FetchError::Decode { endpoint, source })
    }
}

/// Responses usually arrive as `{"code":200,"msg":"...","data":{...}}`;
/// bare payloads are accepted too.
fn unwrap_envelope(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or_default()
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, headers, method, path, query_param},
    };

    use super::*;
    use crate::upstream::Platform;

    fn window() -> QueryWindow {
        QueryWindow::ending_at(
            NaiveDate::from_ymd_opt(2026, 1, 5)
                .unwrap()
                .and_hms_opt(20, 17, 0)
                .unwrap(),
        )
    }

    fn fetcher_for(server: &MockServer) -> UsageFetcher {
        let origin = Url::parse(&server.uri()).unwrap();
        let endpoints = UsageEndpoints::with_origin(Platform::Zai, &origin).unwrap();
        UsageFetcher::new(endpoints, "test-token", Duration::from_secs(5)).unwrap()
    }

    fn model_body() -> serde_json::Value {
        json!({
            "x_time": ["2026-01-05 19:00", "2026-01-05 20:00"],
            "modelCallCount": [3, null],
            "tokensUsage": [1200, null],
            "totalUsage": {"totalModelCallCount": 3, "totalTokensUsage": 1200}
        })
    }

    fn tool_body() -> serde_json::Value {
        json!({
            "x_time": ["2026-01-05 19:00", "2026-01-05 20:00"],
            "networkSearchCount": [1, 0],
            "webReadMcpCount": [0, 0],
            "zreadMcpCount": [0, 0],
            "totalUsage": {
                "totalNetworkSearchCount": 1,
                "totalWebReadMcpCount": 0,
                "totalZreadMcpCount": 0,
                "totalSearchMcpCount": 1,
                "toolDetails": [{"modelName": "search-prime", "totalUsageCount": 1}]
            }
        })
    }

    fn quota_body() -> serde_json::Value {
        json!({
            "limits": [
                {"type": "TOKENS_LIMIT", "percentage": 10},
                {"type": "TIME_LIMIT", "percentage": 20, "currentValue": 5, "usage": 100, "usageDetails": []}
            ]
        })
    }

    fn envelope(data: serde_json::Value) -> serde_json::Value {
        json!({"code": 200, "msg": "Operation successful", "data": data, "success": true})
    }

    #[tokio::test]
    async fn test_fetch_all_unwraps_envelope_and_sends_window() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/monitor/usage/model-usage"))
            .and(query_param("startTime", "2026-01-04 20:00:00"))
            .and(query_param("endTime", "2026-01-05 20:59:59"))
            .and(header("authorization", "test-token"))
            // wiremock splits header values on commas
            .and(headers("accept-language", vec!["en-US", "en"]))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(model_body())))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/monitor/usage/tool-usage"))
            .and(query_param("startTime", "2026-01-04 20:00:00"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(tool_body())))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/monitor/usage/quota/limit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(quota_body())))
            .expect(1)
            .mount(&server)
            .await;

        let usage = fetcher_for(&server).fetch_all_in(&window()).await.unwrap();

        assert_eq!(usage.model.total_usage.total_model_call_count, 3);
        assert_eq!(usage.model.model_call_count, vec![Some(3), None]);
        assert_eq!(usage.tool.total_usage.tool_details.len(), 1);
        assert_eq!(usage.quota.limits[0].kind, "Token usage(5 Hour)");
        assert_eq!(usage.quota.limits[1].current_usage, Some(5));
        assert_eq!(usage.quota.limits[1].total, Some(100));
    }

    #[tokio::test]
    async fn test_bare_payload_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/monitor/usage/model-usage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(model_body()))
            .mount(&server)
            .await;

        let model = fetcher_for(&server)
            .fetch_model_usage(&window())
            .await
            .unwrap();
        assert_eq!(model.total_usage.total_tokens_usage, 1200);
    }

    #[tokio::test]
    async fn test_non_200_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/monitor/usage/model-usage"))
            .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
            .mount(&server)
            .await;

        let err = fetcher_for(&server).fetch_all_in(&window()).await.unwrap_err();
        match err {
            FetchError::Status {
                endpoint,
                status,
                body,
            } => {
                assert_eq!(endpoint, "model");
                assert_eq!(status, 401);
                assert_eq!(body, "token expired");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_quota_failure_after_model_and_tool() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/monitor/usage/model-usage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(model_body())))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/monitor/usage/tool-usage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(tool_body())))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/monitor/usage/quota/limit"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = fetcher_for(&server).fetch_all_in(&window()).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { endpoint: "quota", status: 503, .. }));
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/monitor/usage/model-usage"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(envelope(json!({"x_time": []}))),
            )
            .mount(&server)
            .await;

        let err = fetcher_for(&server)
            .fetch_model_usage(&window())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode { endpoint: "model", .. }));
    }

    #[tokio::test]
    async fn test_error_envelope_without_limits_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/monitor/usage/quota/limit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 1001,
                "msg": "Authorization token expired",
                "success": false
            })))
            .mount(&server)
            .await;

        let err = fetcher_for(&server).fetch_quota_limits().await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { endpoint: "quota", .. }));
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/monitor/usage/quota/limit"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = fetcher_for(&server).fetch_quota_limits().await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { endpoint: "quota", .. }));
    }

    #[test]
    fn test_unwrap_envelope() {
        assert_eq!(unwrap_envelope(json!({"data": {"a": 1}})), json!({"a": 1}));
        assert_eq!(unwrap_envelope(json!({"a": 1})), json!({"a": 1}));
        assert_eq!(unwrap_envelope(json!([1, 2])), json!([1, 2]));
    }

    #[test]
    fn test_from_config_rejects_unknown_host() {
        let config = UpstreamConfig {
            base_url: "https://example.com".into(),
            auth_token: "t".into(),
            timeout_secs: 30,
            timezone_offset_hours: None,
        };
        assert!(matches!(
            UsageFetcher::from_config(&config),
            Err(FetchError::UnsupportedBaseUrl(_))
        ));
    }
}
