//! The canonical blog post entity derived from upstream pages.

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::error::DomainError;

/// Average reading speed used for the derived reading time, in words/minute.
const WORDS_PER_MINUTE: usize = 200;

/// A fully-validated blog post.
///
/// Every `Post` handed out by the content pipeline satisfies the shape
/// contract checked by [`Post::validate`]: non-empty id/title/slug, a
/// URL-safe slug, and a reading time of at least one minute. Posts are
/// immutable once constructed; invalidation happens at the cache layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    /// Stable upstream page id.
    pub id: String,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub published: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub tags: Vec<String>,
    pub cover: Option<String>,
    /// Markdown body. May be empty for degraded posts, never absent.
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_edited_time: OffsetDateTime,
    /// Whole minutes, minimum 1.
    pub reading_time: u32,
}

impl Post {
    /// Check the shape contract this type promises to the rest of the system.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.trim().is_empty() {
            return Err(DomainError::validation("post id must not be empty"));
        }
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("post title must not be empty"));
        }
        if self.slug.is_empty() {
            return Err(DomainError::validation("post slug must not be empty"));
        }
        if !is_url_safe_slug(&self.slug) {
            return Err(DomainError::validation(format!(
                "post slug `{}` is not URL-safe",
                self.slug
            )));
        }
        if self.reading_time == 0 {
            return Err(DomainError::validation(
                "post reading time must be at least one minute",
            ));
        }
        Ok(())
    }
}

/// Lowercase alphanumeric segments joined by single hyphens.
pub fn is_url_safe_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
}

/// Estimate reading time in whole minutes from a markdown body.
///
/// `ceil(words / 200)`, clamped to a minimum of one minute so even stub
/// posts advertise a sane value.
pub fn reading_time_minutes(content: &str) -> u32 {
    let words = content.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE);
    minutes.max(1) as u32
}
