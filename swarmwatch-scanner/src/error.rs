use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Server error: {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;
