use crate::model::SourceType;

/// Failure confined to a single source. None of these abort the run.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source unavailable: HTTP {status} from {url}")]
    Unavailable { url: String, status: u16 },

    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("config is missing required key '{key}'")]
    ConfigIncomplete { key: String },

    #[error("invalid value for '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("no strategy registered for source type '{0}'")]
    UnknownSourceType(SourceType),

    #[error("no PDF link found in wrapper page {0}")]
    NoPdfLink(String),

    #[error("PDF text extraction failed: {0}")]
    Pdf(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure talking to the text-understanding service.
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("service returned HTTP {0}")]
    Status(u16),

    #[error("service unreachable: {0}")]
    Transport(String),

    #[error("malformed service response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for EnrichmentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            EnrichmentError::Malformed(e.to_string())
        } else {
            EnrichmentError::Transport(e.to_string())
        }
    }
}
