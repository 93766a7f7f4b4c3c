//! Thin JSON surface over the blog runtime.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde_json::{Value, json};

use crate::application::error::HttpError;
use crate::domain::Post;
use crate::plugins::{BlogRuntime, PluginError};

#[derive(Clone)]
pub struct HttpState {
    pub runtime: Arc<BlogRuntime>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/blogs", get(list_blogs))
        .route("/blogs/{blog}/posts", get(list_posts))
        .route("/blogs/{blog}/posts/{slug}", get(get_post))
        .route("/blogs/{blog}/slugs", get(list_slugs))
        .with_state(state)
}

async fn healthz(State(state): State<HttpState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "blogs": state.runtime.blog_ids().len(),
    }))
}

async fn list_blogs(State(state): State<HttpState>) -> Json<Vec<String>> {
    Json(state.runtime.blog_ids())
}

async fn list_posts(
    State(state): State<HttpState>,
    Path(blog): Path<String>,
) -> Result<Json<Vec<Post>>, HttpError> {
    let posts = state
        .runtime
        .enhanced_posts(&blog)
        .await
        .map_err(|err| plugin_error_to_http("infra::http::list_posts", err))?;
    Ok(Json(posts))
}

async fn get_post(
    State(state): State<HttpState>,
    Path((blog, slug)): Path<(String, String)>,
) -> Result<Json<Post>, HttpError> {
    let post = state
        .runtime
        .enhanced_post(&blog, &slug)
        .await
        .map_err(|err| plugin_error_to_http("infra::http::get_post", err))?;
    match post {
        Some(post) => Ok(Json(post)),
        None => Err(HttpError::new(
            "infra::http::get_post",
            StatusCode::NOT_FOUND,
            "Post not found",
            format!("no published post with slug `{slug}` in blog `{blog}`"),
        )),
    }
}

async fn list_slugs(
    State(state): State<HttpState>,
    Path(blog): Path<String>,
) -> Result<Json<Vec<String>>, HttpError> {
    let slugs = state
        .runtime
        .all_slugs(&blog)
        .await
        .map_err(|err| plugin_error_to_http("infra::http::list_slugs", err))?;
    Ok(Json(slugs))
}

fn plugin_error_to_http(source: &'static str, err: PluginError) -> HttpError {
    match &err {
        PluginError::UnknownBlog { .. } => HttpError::from_error(
            source,
            StatusCode::NOT_FOUND,
            "Blog not found",
            &err,
        ),
        PluginError::Content(_) => HttpError::from_error(
            source,
            StatusCode::BAD_GATEWAY,
            "Upstream unavailable",
            &err,
        ),
        _ => HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal error",
            &err,
        ),
    }
}
