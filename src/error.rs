use thiserror::Error;

/// Classifies geographic catalog errors for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogErrorKind {
    /// Required path or URL not configured
    NotConfigured,
    /// File open/read failure
    FileError,
    /// Data format or decoding error (corrupt file, wrong schema, etc.)
    InvalidData,
    /// Download or verification failure
    DownloadFailed,
}

/// Data hub error types
#[derive(Error, Debug)]
pub enum HubError {
    #[error("Parse error at line {line}: {message}")]
    ParseErrorAtLine { line: usize, message: String },

    #[error("Invalid table kind: {0}")]
    InvalidTableKind(String),

    #[error("Invalid match kind: {0}")]
    InvalidMatchKind(String),

    #[error("Fetch {url} failed: {message}")]
    Fetch { url: String, message: String },

    #[error("Catalog error: {message}")]
    Catalog {
        kind: CatalogErrorKind,
        message: String,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HubError {
    pub(crate) fn catalog(kind: CatalogErrorKind, message: impl Into<String>) -> Self {
        HubError::Catalog {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn fetch(url: &str, message: impl std::fmt::Display) -> Self {
        HubError::Fetch {
            url: url.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HubError>;
