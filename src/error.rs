#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("invalid record '{key}': {reason}")]
    InvalidRecord { key: String, reason: String },
    #[error("load failed: {0}")]
    Load(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("output error: {0}")]
    Output(#[source] std::io::Error),
    #[error("fatal: {0}")]
    Fatal(String),
}

impl RouteError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        RouteError::InvalidRecord {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
