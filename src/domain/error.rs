use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("VCS error: {0}")]
    VcsError(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::EmbeddingError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn vcs(msg: impl Into<String>) -> Self {
        Self::VcsError(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::StoreError(_))
    }

    /// Category label used when grouping skipped files in the index summary.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "config",
            Self::ParseError(_) => "parse",
            Self::EmbeddingError(_) => "embedding",
            Self::StoreError(_) => "store",
            Self::VcsError(_) => "vcs",
            Self::Cancelled(_) => "cancelled",
            Self::Timeout(_) => "timeout",
            Self::InvalidInput(_) => "invalid-input",
            Self::IoError(_) => "io",
            Self::Internal(_) => "internal",
        }
    }
}
