//! The upstream content source boundary.
//!
//! [`ContentSource`] is the seam the content pipeline is written against;
//! [`NotionHttpSource`] is the production implementation speaking the Notion
//! HTTP API. Tests substitute an in-memory source.

pub mod properties;
pub mod wire;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::warn;

pub use properties::PropertyBag;
pub use wire::{ListResponse, Page, blocks_to_markdown};

/// Property names this system expects in the source database schema.
pub const PROP_TITLE: &str = "Title";
pub const PROP_SLUG: &str = "Slug";
pub const PROP_SUMMARY: &str = "Summary";
pub const PROP_PUBLISHED: &str = "Published";
pub const PROP_DATE: &str = "Date";
pub const PROP_TAGS: &str = "Tags";
pub const PROP_CATEGORIES: &str = "Categories";
pub const PROP_COVER: &str = "Cover";

const NOTION_VERSION: &str = "2022-06-28";
const PAGE_SIZE: u32 = 100;

/// Upstream unreachable, rejected the request, or returned a malformed
/// response. Fatal to the calling list/fetch operation.
#[derive(Debug, Error)]
pub enum NotionApiError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream rejected request with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upstream response violated expected shape: {message}")]
    Schema { message: String },
}

impl NotionApiError {
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }
}

/// Credentials and endpoint for one tenant's source database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub api_base: String,
    pub token: String,
    pub database_id: String,
    pub timeout: Duration,
}

/// Page query scope. Published-only is implied; a slug narrows to one page.
#[derive(Debug, Clone, Default)]
pub struct PageFilter {
    pub slug: Option<String>,
}

impl PageFilter {
    pub fn by_slug(slug: impl Into<String>) -> Self {
        Self {
            slug: Some(slug.into()),
        }
    }
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Query the source database for published pages, newest first.
    async fn query_pages(&self, filter: &PageFilter) -> Result<Vec<Page>, NotionApiError>;

    /// Fetch a page's block content flattened to markdown.
    async fn page_markdown(&self, page_id: &str) -> Result<String, NotionApiError>;
}

pub struct NotionHttpSource {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl NotionHttpSource {
    pub fn new(config: UpstreamConfig) -> Result<Self, NotionApiError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn query_body(&self, filter: &PageFilter, cursor: Option<&str>) -> Value {
        let mut conditions = vec![json!({
            "property": PROP_PUBLISHED,
            "checkbox": { "equals": true }
        })];
        if let Some(slug) = filter.slug.as_deref() {
            conditions.push(json!({
                "property": PROP_SLUG,
                "rich_text": { "equals": slug }
            }));
        }

        let mut body = json!({
            "filter": { "and": conditions },
            "sorts": [{ "property": PROP_DATE, "direction": "descending" }],
            "page_size": PAGE_SIZE,
        });
        if let Some(cursor) = cursor {
            body["start_cursor"] = Value::String(cursor.to_string());
        }
        body
    }

    async fn fetch_envelope(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<ListResponse, NotionApiError> {
        let response = request
            .bearer_auth(&self.config.token)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotionApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: ListResponse = response.json().await?;
        envelope.ensure_list().map_err(NotionApiError::schema)?;
        Ok(envelope)
    }
}

#[async_trait]
impl ContentSource for NotionHttpSource {
    async fn query_pages(&self, filter: &PageFilter) -> Result<Vec<Page>, NotionApiError> {
        let url = format!(
            "{}/databases/{}/query",
            self.config.api_base, self.config.database_id
        );

        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let body = self.query_body(filter, cursor.as_deref());
            let envelope = self
                .fetch_envelope(self.http.post(&url).json(&body))
                .await?;

            for raw in &envelope.results {
                match serde_json::from_value::<Page>(raw.clone()) {
                    Ok(page) => pages.push(page),
                    Err(error) => {
                        // One malformed page must not abort the listing.
                        warn!(%error, "skipping page with unparseable shape");
                    }
                }
            }

            if !envelope.has_more {
                break;
            }
            match envelope.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(pages)
    }

    async fn page_markdown(&self, page_id: &str) -> Result<String, NotionApiError> {
        let base = format!("{}/blocks/{}/children", self.config.api_base, page_id);

        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self.http.get(&base).query(&[("page_size", PAGE_SIZE)]);
            if let Some(cursor) = cursor.as_deref() {
                request = request.query(&[("start_cursor", cursor)]);
            }

            let envelope = self.fetch_envelope(request).await?;
            blocks.extend(envelope.results);

            if !envelope.has_more {
                break;
            }
            match envelope.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(blocks_to_markdown(&blocks))
    }
}
