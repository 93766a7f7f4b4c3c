//! The three cache namespaces backing one content client.
//!
//! Post list, post-by-slug, and raw markdown-by-page-id live in separate
//! stores so their keys can never collide and each can carry its own TTL.

use crate::domain::Post;

use super::config::CacheConfig;
use super::ttl::TtlCache;

/// Key under which the single published-post listing is stored.
const POST_LIST_KEY: &str = "published";

pub struct ContentCache {
    config: CacheConfig,
    post_list: TtlCache<String, Vec<Post>>,
    post_by_slug: TtlCache<String, Post>,
    raw_content: TtlCache<String, String>,
}

impl ContentCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            post_list: TtlCache::new("post_list", config.post_list_capacity_non_zero()),
            post_by_slug: TtlCache::new("post_by_slug", config.post_capacity_non_zero()),
            raw_content: TtlCache::new("raw_content", config.raw_content_capacity_non_zero()),
            config,
        }
    }

    pub fn get_post_list(&self) -> Option<Vec<Post>> {
        self.post_list.get(&POST_LIST_KEY.to_string())
    }

    pub fn set_post_list(&self, posts: Vec<Post>) {
        self.post_list
            .insert(POST_LIST_KEY.to_string(), posts, self.config.post_list_ttl);
    }

    pub fn get_post_by_slug(&self, slug: &str) -> Option<Post> {
        self.post_by_slug.get(&slug.to_string())
    }

    pub fn set_post(&self, post: Post) {
        self.post_by_slug
            .insert(post.slug.clone(), post, self.config.post_ttl);
    }

    pub fn get_raw_content(&self, page_id: &str) -> Option<String> {
        self.raw_content.get(&page_id.to_string())
    }

    pub fn set_raw_content(&self, page_id: &str, markdown: String) {
        self.raw_content
            .insert(page_id.to_string(), markdown, self.config.raw_content_ttl);
    }

    /// Drop everything. Used when a tenant is re-initialized or removed.
    pub fn invalidate_all(&self) {
        self.post_list.clear();
        self.post_by_slug.clear();
        self.raw_content.clear();
    }

    /// Sweep expired entries across all namespaces; returns the count removed.
    pub fn cleanup(&self) -> usize {
        self.post_list.cleanup() + self.post_by_slug.cleanup() + self.raw_content.cleanup()
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn sample_post(slug: &str) -> Post {
        Post {
            id: format!("id-{slug}"),
            title: slug.to_string(),
            slug: slug.to_string(),
            summary: String::new(),
            published: true,
            date: datetime!(2024-03-01 12:00 UTC),
            tags: vec![],
            cover: None,
            content: String::new(),
            last_edited_time: datetime!(2024-03-01 12:00 UTC),
            reading_time: 1,
        }
    }

    #[test]
    fn namespaces_do_not_collide() {
        let cache = ContentCache::new(CacheConfig::default());

        // Same textual key in all three namespaces.
        cache.set_post(sample_post("published"));
        cache.set_raw_content("published", "raw body".to_string());

        assert!(cache.get_post_list().is_none());
        assert_eq!(
            cache.get_post_by_slug("published").map(|post| post.slug),
            Some("published".to_string())
        );
        assert_eq!(
            cache.get_raw_content("published"),
            Some("raw body".to_string())
        );
    }

    #[test]
    fn invalidate_all_clears_every_namespace() {
        let cache = ContentCache::new(CacheConfig::default());
        cache.set_post_list(vec![sample_post("a")]);
        cache.set_post(sample_post("a"));
        cache.set_raw_content("id-a", "body".to_string());

        cache.invalidate_all();

        assert!(cache.get_post_list().is_none());
        assert!(cache.get_post_by_slug("a").is_none());
        assert!(cache.get_raw_content("id-a").is_none());
    }
}
