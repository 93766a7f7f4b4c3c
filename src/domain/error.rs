use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// A record failed to coerce into the `Post` shape.
///
/// Carries the raw upstream payload so operators can diagnose schema drift in
/// the source database. Recoverable: the content pipeline catches this per
/// page and drops or degrades that single page, never the whole listing.
#[derive(Debug, Error)]
#[error("post validation failed for page `{page_id}`: {message}")]
pub struct ValidationError {
    pub page_id: String,
    pub message: String,
    pub raw: serde_json::Value,
}

impl ValidationError {
    pub fn new(
        page_id: impl Into<String>,
        message: impl Into<String>,
        raw: serde_json::Value,
    ) -> Self {
        Self {
            page_id: page_id.into(),
            message: message.into(),
            raw,
        }
    }
}
