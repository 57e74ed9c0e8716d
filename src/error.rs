use thiserror::Error;

#[derive(Error, Debug)]
pub enum LegendaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid SRT document: {0}")]
    InvalidDocument(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Rate limit reached: {0}")]
    RateLimit(String),

    #[error("Operation not allowed: {0}")]
    InvalidState(String),

    #[error("Subtitle block {0} not found")]
    BlockNotFound(u32),

    #[error("No translation context selected")]
    MissingContext,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl LegendaError {
    /// Rate limiting is the only failure worth retrying at the collaborator boundary.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimit(_))
    }

    /// True for failures raised by the translation collaborator.
    pub fn is_translation_failure(&self) -> bool {
        matches!(self, Self::Translation(_) | Self::RateLimit(_) | Self::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, LegendaError>;
