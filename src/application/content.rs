//! The content pipeline: upstream pages in, validated posts out.
//!
//! `ContentClient` orchestrates query → shape validation → property
//! extraction → body fetch → sanitize/validate → cache. Upstream failure of
//! the listing query is fatal to the call; every per-page failure is
//! recovered locally so one malformed page never takes down a blog.

use std::sync::Arc;

use metrics::counter;
use time::OffsetDateTime;
use tracing::warn;

use crate::cache::{CacheConfig, ContentCache};
use crate::domain::Post;
use crate::domain::sanitize::{PostDraft, parse_datetime, safe_blog_post};
use crate::infra::notion::{
    ContentSource, NotionApiError, PROP_CATEGORIES, PROP_COVER, PROP_DATE, PROP_PUBLISHED,
    PROP_SLUG, PROP_SUMMARY, PROP_TAGS, PROP_TITLE, Page, PageFilter,
};

pub struct ContentClient {
    source: Arc<dyn ContentSource>,
    cache: ContentCache,
}

impl ContentClient {
    pub fn new(source: Arc<dyn ContentSource>, cache_config: CacheConfig) -> Self {
        Self {
            source,
            cache: ContentCache::new(cache_config),
        }
    }

    /// All published posts, newest first. Cache-through on the list
    /// namespace; nothing is cached when the upstream query fails.
    pub async fn published_posts(&self) -> Result<Vec<Post>, NotionApiError> {
        if let Some(posts) = self.cache.get_post_list() {
            return Ok(posts);
        }

        let pages = match self.source.query_pages(&PageFilter::default()).await {
            Ok(pages) => pages,
            Err(error) => {
                counter!("foglio_upstream_query_error_total").increment(1);
                return Err(error);
            }
        };

        let mut posts = Vec::with_capacity(pages.len());
        for page in &pages {
            if let Some(post) = self.build_post(page).await {
                // The upstream filter already excludes unpublished pages, but
                // the schema is caller-configurable; never surface them.
                if post.published {
                    posts.push(post);
                }
            }
        }

        self.cache.set_post_list(posts.clone());
        Ok(posts)
    }

    /// Look up one published post by slug.
    ///
    /// Tries the upstream slug filter first; pages without an explicit slug
    /// property are found by scanning the listing for a matching derived
    /// slug.
    pub async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>, NotionApiError> {
        if let Some(post) = self.cache.get_post_by_slug(slug) {
            return Ok(Some(post));
        }

        let pages = self.source.query_pages(&PageFilter::by_slug(slug)).await?;
        if let Some(page) = pages.first()
            && let Some(post) = self.build_post(page).await
            && post.published
        {
            self.cache.set_post(post.clone());
            return Ok(Some(post));
        }

        // Fallback: the page may carry no slug property at all, in which
        // case its slug was derived from the title during assembly.
        let post = self
            .published_posts()
            .await?
            .into_iter()
            .find(|post| post.slug == slug);

        if let Some(post) = &post {
            self.cache.set_post(post.clone());
        }
        Ok(post)
    }

    /// Slugs of every published post. Degrades to empty on upstream failure:
    /// slug enumeration feeds static listings and must never crash them.
    pub async fn all_slugs(&self) -> Vec<String> {
        match self.published_posts().await {
            Ok(posts) => posts.into_iter().map(|post| post.slug).collect(),
            Err(error) => {
                warn!(%error, "slug enumeration degraded to empty after upstream failure");
                Vec::new()
            }
        }
    }

    /// Sweep expired cache entries; returns the count removed.
    pub fn cleanup_cache(&self) -> usize {
        self.cache.cleanup()
    }

    /// Drop all cached content for this client.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }

    /// Run one page through extraction and validation.
    ///
    /// Returns `None` only after both the normal build and the degraded
    /// empty-content retry have failed; that page is logged and dropped.
    async fn build_post(&self, page: &Page) -> Option<Post> {
        let content = self.page_content(page).await;
        let draft = self.extract_draft(page, content);

        match safe_blog_post(draft.clone()) {
            Ok(post) => Some(post),
            Err(error) => {
                warn!(
                    page_id = %error.page_id,
                    %error,
                    "post failed validation, retrying with empty content"
                );
                let degraded = PostDraft {
                    content: String::new(),
                    ..draft
                };
                match safe_blog_post(degraded) {
                    Ok(post) => {
                        counter!("foglio_page_degraded_total").increment(1);
                        Some(post)
                    }
                    Err(error) => {
                        counter!("foglio_page_skipped_total").increment(1);
                        warn!(
                            page_id = %error.page_id,
                            raw = %error.raw,
                            "dropping page that failed validation twice"
                        );
                        None
                    }
                }
            }
        }
    }

    /// Page body as markdown, cache-through by page id. A body fetch failure
    /// is per-item: the post degrades to empty content instead of aborting
    /// the listing.
    async fn page_content(&self, page: &Page) -> String {
        if let Some(markdown) = self.cache.get_raw_content(&page.id) {
            return markdown;
        }

        match self.source.page_markdown(&page.id).await {
            Ok(markdown) => {
                self.cache.set_raw_content(&page.id, markdown.clone());
                markdown
            }
            Err(error) => {
                warn!(page_id = %page.id, %error, "page body fetch failed, using empty content");
                String::new()
            }
        }
    }

    fn extract_draft(&self, page: &Page, content: String) -> PostDraft {
        let props = &page.properties;
        let now = OffsetDateTime::now_utc();
        let created_time = parse_datetime(&page.created_time).unwrap_or(now);

        let explicit_slug = Some(props.get_string(PROP_SLUG, ""))
            .filter(|slug| !slug.is_empty());

        let date = props
            .contains(PROP_DATE)
            .then(|| props.get_date(PROP_DATE, created_time));

        let cover = page
            .cover
            .as_ref()
            .and_then(|cover| cover.url())
            .map(str::to_string)
            .or_else(|| {
                Some(props.get_string(PROP_COVER, "")).filter(|url| !url.is_empty())
            });

        PostDraft {
            id: page.id.clone(),
            title: props.get_string(PROP_TITLE, ""),
            explicit_slug,
            summary: props.get_string(PROP_SUMMARY, ""),
            published: props.get_boolean(PROP_PUBLISHED, false),
            date,
            created_time,
            tags: props.get_string_array(PROP_TAGS),
            extra_tags: props.get_string_array(PROP_CATEGORIES),
            cover,
            content,
            last_edited_time: parse_datetime(&page.last_edited_time).unwrap_or(now),
        }
    }
}
