use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("{path}: server answered {status}")]
    Status { path: String, status: u16 },

    #[error("{0}: not found")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid site: {0}")]
    InvalidSite(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SiteError {
    /// True when the resource simply does not exist, as opposed to the site
    /// being unreachable.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            SiteError::NotFound(_) | SiteError::Status { status: 404, .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SiteError>;
