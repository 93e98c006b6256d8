//! Error types for the smart-test core library.

/// Top-level error enum for the smart-test core library.
#[derive(Debug, thiserror::Error)]
pub enum SmartTestError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type SmartTestResult<T> = Result<T, SmartTestError>;
