use std::fmt;

use url::Url;

use super::{FetchError, FetchResult};

const MODEL_USAGE_PATH: &str = "/api/monitor/usage/model-usage";
const TOOL_USAGE_PATH: &str = "/api/monitor/usage/tool-usage";
const QUOTA_LIMIT_PATH: &str = "/api/monitor/usage/quota/limit";

/// Which deployment of the monitor API a base URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// International deployment (`api.z.ai`).
    Zai,
    /// Mainland deployment (`bigmodel.cn`).
    Zhipu,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Zai => "ZAI",
            Platform::Zhipu => "ZHIPU",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three monitor endpoints, resolved against a base URL's origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageEndpoints {
    pub platform: Platform,
    pub model: Url,
    pub tool: Url,
    pub quota: Url,
}

impl UsageEndpoints {
    /// Derive endpoints from the base URL the coding tools use, e.g.
    /// `https://api.z.ai/api/anthropic`. Path, query and fragment are ignored.
    pub fn from_base_url(base_url: &str) -> FetchResult<Self> {
        let unsupported = || FetchError::UnsupportedBaseUrl(base_url.to_string());

        let platform = if base_url.contains("api.z.ai") {
            Platform::Zai
        } else if base_url.contains("bigmodel.cn") {
            Platform::Zhipu
        } else {
            return Err(unsupported());
        };

        let parsed = Url::parse(base_url).map_err(|_| unsupported())?;
        Self::with_origin(platform, &parsed).ok_or_else(unsupported)
    }

    /// Build endpoints for an explicit origin without host recognition.
    pub fn with_origin(platform: Platform, origin: &Url) -> Option<Self> {
        let origin = origin.origin();
        if !origin.is_tuple() {
            return None;
        }
        let root = Url::parse(&origin.ascii_serialization()).ok()?;

        Some(Self {
            platform,
            model: root.join(MODEL_USAGE_PATH).ok()?,
            tool: root.join(TOOL_USAGE_PATH).ok()?,
            quota: root.join(QUOTA_LIMIT_PATH).ok()?,
        })
    }
}
