//! Defensive coercion of upstream values into domain-safe primitives.
//!
//! The upstream property schema is caller-configurable and effectively
//! untyped, so every coercion here is total: wrong-typed, absent, or
//! malformed input yields the caller-supplied default instead of an error.
//! [`safe_blog_post`] is the single place a [`Post`] is assembled; anything
//! it returns has independently passed [`Post::validate`].

use serde::Serialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use url::Url;

use crate::domain::error::ValidationError;
use crate::domain::post::{Post, reading_time_minutes};
use crate::domain::slug::derive_slug;

/// Coerce to a trimmed string, falling back on any other JSON type.
pub fn sanitize_string(value: &Value, default: &str) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        _ => default.to_string(),
    }
}

/// Coerce to a boolean. No truthiness: only a JSON boolean passes.
pub fn sanitize_boolean(value: &Value, default: bool) -> bool {
    value.as_bool().unwrap_or(default)
}

/// Coerce to a finite number. Numeric strings parse; everything else falls
/// back.
pub fn sanitize_number(value: &Value, default: f64) -> f64 {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|number| number.is_finite()).unwrap_or(default)
}

/// Coerce to a list of non-empty strings, dropping every other element kind.
pub fn sanitize_string_array(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Coerce to a valid instant, falling back when the value is not a parseable
/// ISO-8601 string.
pub fn sanitize_date(value: &Value, fallback: OffsetDateTime) -> OffsetDateTime {
    value
        .as_str()
        .and_then(parse_datetime)
        .unwrap_or(fallback)
}

/// Coerce to a well-formed absolute http(s) URL, or nothing.
pub fn sanitize_url(value: &Value) -> Option<String> {
    value.as_str().and_then(validate_url)
}

/// Accept an http(s) URL string verbatim when it parses, otherwise drop it.
pub fn validate_url(candidate: &str) -> Option<String> {
    let url = Url::parse(candidate.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

/// Parse ISO-8601 timestamps as emitted by the upstream source.
///
/// Accepts full RFC 3339 instants, naive date-times, and bare dates (both
/// treated as UTC).
pub fn parse_datetime(text: &str) -> Option<OffsetDateTime> {
    let text = text.trim();
    if let Ok(instant) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(instant);
    }

    let naive = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    if let Ok(datetime) = PrimitiveDateTime::parse(text, naive) {
        return Some(datetime.assume_utc());
    }

    let date_only = format_description!("[year]-[month]-[day]");
    if let Ok(date) = Date::parse(text, date_only) {
        return Some(PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc());
    }

    None
}

/// Field values extracted from a single upstream page, before assembly.
#[derive(Debug, Clone, Serialize)]
pub struct PostDraft {
    pub id: String,
    pub title: String,
    /// Explicit slug property, when the page has one.
    pub explicit_slug: Option<String>,
    pub summary: String,
    pub published: bool,
    /// Explicit date property; `created_time` is the fallback.
    #[serde(with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_time: OffsetDateTime,
    /// Tag values from the two possible source fields, merged later.
    pub tags: Vec<String>,
    pub extra_tags: Vec<String>,
    pub cover: Option<String>,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_edited_time: OffsetDateTime,
}

/// Assemble a fully-validated [`Post`] from extracted field values.
///
/// Normalizes every field (slug derivation, tag dedup across both source
/// fields, URL validation, date fallback, reading time) and then re-checks
/// the assembled record against the post shape contract. The re-check should
/// be unreachable given total sanitizers; it guards against bugs in them.
pub fn safe_blog_post(draft: PostDraft) -> Result<Post, ValidationError> {
    let slug = draft
        .explicit_slug
        .as_deref()
        .and_then(|explicit| derive_slug(explicit).ok())
        .or_else(|| derive_slug(&draft.title).ok())
        .unwrap_or_default();

    let mut tags: Vec<String> = Vec::new();
    for tag in draft.tags.iter().chain(draft.extra_tags.iter()) {
        let tag = tag.trim();
        if !tag.is_empty() && !tags.iter().any(|existing| existing == tag) {
            tags.push(tag.to_string());
        }
    }

    let cover = draft.cover.as_deref().and_then(validate_url);
    let date = draft.date.unwrap_or(draft.created_time);

    let post = Post {
        id: draft.id.clone(),
        title: draft.title.trim().to_string(),
        slug,
        summary: draft.summary.trim().to_string(),
        published: draft.published,
        date,
        tags,
        cover,
        content: draft.content.clone(),
        last_edited_time: draft.last_edited_time,
        reading_time: reading_time_minutes(&draft.content),
    };

    if let Err(error) = post.validate() {
        let raw = serde_json::to_value(&draft).unwrap_or(Value::Null);
        return Err(ValidationError::new(draft.id, error.to_string(), raw));
    }

    Ok(post)
}
