//! End-to-end pipeline coverage: canned upstream pages flow through
//! validation, caching, the plugin runtime, and the HTTP surface.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use foglio::cache::CacheConfig;
use foglio::infra::http::{HttpState, build_router};
use foglio::infra::notion::{
    ContentSource, NotionApiError, PROP_PUBLISHED, PROP_SLUG, Page, PageFilter, UpstreamConfig,
};
use foglio::plugins::runtime::SourceFactory;
use foglio::plugins::{BlogConfig, BlogRuntime, PluginCatalog, PluginEntry};

struct CannedSource {
    pages: Vec<Page>,
    bodies: Vec<(String, String)>,
    queries: Arc<AtomicUsize>,
}

#[async_trait]
impl ContentSource for CannedSource {
    async fn query_pages(&self, filter: &PageFilter) -> Result<Vec<Page>, NotionApiError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .pages
            .iter()
            .filter(|page| page.properties.get_boolean(PROP_PUBLISHED, false))
            .filter(|page| match filter.slug.as_deref() {
                Some(slug) => page.properties.get_string(PROP_SLUG, "") == slug,
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn page_markdown(&self, page_id: &str) -> Result<String, NotionApiError> {
        Ok(self
            .bodies
            .iter()
            .find(|(id, _)| id == page_id)
            .map(|(_, body)| body.clone())
            .unwrap_or_default())
    }
}

fn page(id: &str, properties: Value) -> Page {
    serde_json::from_value(json!({
        "id": id,
        "created_time": "2024-06-01T08:00:00Z",
        "last_edited_time": "2024-06-02T08:00:00Z",
        "properties": properties,
    }))
    .expect("page json")
}

fn full_page(id: &str, title: &str, slug: Option<&str>, published: bool) -> Page {
    let mut properties = json!({
        "Title": { "type": "title", "title": [{ "plain_text": title }] },
        "Published": { "type": "checkbox", "checkbox": published },
        "Tags": { "type": "multi_select", "multi_select": [{ "name": "rust" }] },
    });
    if let Some(slug) = slug {
        properties["Slug"] = json!({
            "type": "rich_text",
            "rich_text": [{ "plain_text": slug }]
        });
    }
    page(id, properties)
}

fn blog_config(id: &str) -> BlogConfig {
    BlogConfig {
        id: id.to_string(),
        name: format!("Blog {id}"),
        upstream: UpstreamConfig {
            api_base: "http://localhost:1".to_string(),
            token: "secret".to_string(),
            database_id: "db".to_string(),
            timeout: Duration::from_secs(5),
        },
        cache: CacheConfig::default(),
        plugins: Vec::new(),
    }
}

fn runtime_for(
    pages: Vec<Page>,
    bodies: Vec<(String, String)>,
) -> (Arc<BlogRuntime>, Arc<AtomicUsize>) {
    let queries = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&queries);
    let factory: SourceFactory = Arc::new(move |_: &UpstreamConfig| {
        Ok(Arc::new(CannedSource {
            pages: pages.clone(),
            bodies: bodies.clone(),
            queries: Arc::clone(&counter),
        }) as Arc<dyn ContentSource>)
    });
    (
        Arc::new(BlogRuntime::new(PluginCatalog::with_builtins(), factory)),
        queries,
    )
}

#[tokio::test]
async fn pipeline_validates_and_serves_pages() {
    let pages = vec![
        full_page("p1", "Hello World", Some("hello-world"), true),
        full_page("p2", "Hidden Draft", Some("hidden"), false),
        // No title: the page is skipped, not fatal for the batch.
        page(
            "p3",
            json!({
                "Published": { "type": "checkbox", "checkbox": true },
            }),
        ),
    ];
    let bodies = vec![("p1".to_string(), "# Heading\n\nSome body text.".to_string())];
    let (runtime, _) = runtime_for(pages, bodies);
    runtime
        .initialize_blog(blog_config("main"))
        .await
        .expect("init");

    let posts = runtime.enhanced_posts("main").await.expect("posts");
    assert_eq!(posts.len(), 1);
    let post = &posts[0];
    assert_eq!(post.slug, "hello-world");
    assert!(post.published);
    assert_eq!(post.tags, vec!["rust".to_string()]);
    assert!(post.content.contains("Some body text."));
    assert!(post.reading_time >= 1);
}

#[tokio::test]
async fn cjk_titles_get_ascii_slugs() {
    let pages = vec![full_page("p1", "你好世界", None, true)];
    let (runtime, _) = runtime_for(pages, Vec::new());
    runtime
        .initialize_blog(blog_config("main"))
        .await
        .expect("init");

    let posts = runtime.enhanced_posts("main").await.expect("posts");
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].slug, "ni-hao-shi-jie");
}

#[tokio::test]
async fn repeated_reads_hit_the_cache() {
    let pages = vec![full_page("p1", "Cached", Some("cached"), true)];
    let (runtime, queries) = runtime_for(pages, Vec::new());
    runtime
        .initialize_blog(blog_config("main"))
        .await
        .expect("init");

    runtime.enhanced_posts("main").await.expect("first read");
    runtime.enhanced_posts("main").await.expect("second read");
    runtime.enhanced_posts("main").await.expect("third read");

    assert_eq!(queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn builtin_comments_plugin_marks_rendered_posts() {
    let pages = vec![full_page("p1", "Annotated", Some("annotated"), true)];
    let (runtime, _) = runtime_for(pages, Vec::new());
    let mut config = blog_config("main");
    config.plugins.push(PluginEntry {
        name: "comments".to_string(),
        enabled: true,
        settings: json!({"provider": "giscus"}),
    });
    runtime.initialize_blog(config).await.expect("init");

    let post = runtime
        .enhanced_post("main", "annotated")
        .await
        .expect("query")
        .expect("post");
    assert!(post.content.contains("<!-- comments:giscus -->"));

    // The list pipeline runs a different hook and stays untouched.
    let posts = runtime.enhanced_posts("main").await.expect("posts");
    assert!(!posts[0].content.contains("<!-- comments:giscus -->"));
}

#[tokio::test]
async fn http_surface_serves_the_pipeline_output() {
    let pages = vec![full_page("p1", "Over HTTP", Some("over-http"), true)];
    let (runtime, _) = runtime_for(pages, Vec::new());
    runtime
        .initialize_blog(blog_config("main"))
        .await
        .expect("init");
    let router = build_router(HttpState { runtime });

    let response = router
        .clone()
        .oneshot(
            Request::get("/blogs/main/posts/over-http")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["slug"], "over-http");
    assert_eq!(body["id"], "p1");

    let response = router
        .oneshot(
            Request::get("/blogs/main/slugs")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let slugs: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(slugs, json!(["over-http"]));
}
