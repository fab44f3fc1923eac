/// Errors from the usage-monitor API.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Unsupported or missing base URL '{0}' (expected an api.z.ai or bigmodel.cn URL)")]
    UnsupportedBaseUrl(String),

    #[error("HTTP {status} from {endpoint} endpoint: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid upstream timestamp '{0}'")]
    InvalidTimestamp(String),
}

pub type FetchResult<T> = Result<T, FetchError>;
