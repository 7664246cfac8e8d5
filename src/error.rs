use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid steam id: {0}")]
    InvalidId(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("private account: {0}")]
    PrivateAccount(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("upstream schema changed: {0}")]
    UpstreamSchema(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::InvalidId(_) => "INVALID_ID",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::PrivateAccount(_) => "PRIVATE_ACCOUNT",
            Self::Network(_) => "NETWORK",
            Self::UpstreamSchema(_) => "UPSTREAM_SCHEMA",
            Self::Cache(_) => "CACHE",
            Self::Config(_) => "CONFIG",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            return Self::Network(format!("request timed out: {value}"));
        }
        if value.status() == Some(reqwest::StatusCode::UNAUTHORIZED) {
            return Self::Unauthorized(value.to_string());
        }
        Self::Network(value.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Cache(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::UpstreamSchema(value.to_string())
    }
}
