//! Plugins shipped with the platform.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::domain::sanitize::{sanitize_boolean, sanitize_string};

use super::Plugin;
use super::context::{PluginContext, RouteHandler};
use super::error::PluginError;
use super::hooks::{HookData, HookName, hook_fn};

/// Injects a comment section under every rendered post.
///
/// Settings: `provider` (default `giscus`) selects the embed component.
pub struct CommentsPlugin;

struct CommentConfigRoute {
    provider: String,
}

#[async_trait]
impl RouteHandler for CommentConfigRoute {
    async fn handle(&self, _params: Value) -> Result<Value, PluginError> {
        Ok(json!({ "provider": self.provider }))
    }
}

#[async_trait]
impl Plugin for CommentsPlugin {
    fn name(&self) -> &str {
        "comments"
    }

    fn version(&self) -> &str {
        "1.2.0"
    }

    async fn register(&self, context: &mut PluginContext) -> Result<(), PluginError> {
        let provider = sanitize_string(&context.config()["provider"], "giscus");

        context.register_component("post-footer", "CommentSection");
        context.register_route(
            "/api/comments/config",
            Arc::new(CommentConfigRoute {
                provider: provider.clone(),
            }),
        );

        context.register_hook(
            HookName::BeforePostRender,
            hook_fn(move |data| {
                let provider = provider.clone();
                async move {
                    let HookData::Post(mut post) = data else {
                        return Err(PluginError::handler("expected a single post"));
                    };
                    post.content
                        .push_str(&format!("\n\n<!-- comments:{provider} -->"));
                    Ok(HookData::Post(post))
                }
            }),
        );
        Ok(())
    }
}

/// Tags listed posts so the frontend can attach analytics attributes.
///
/// Settings: `tag` (default `tracked`) names the marker tag; `enabled`
/// (default true) lets a blog keep the plugin installed but inert.
pub struct AnalyticsPlugin;

#[async_trait]
impl Plugin for AnalyticsPlugin {
    fn name(&self) -> &str {
        "analytics"
    }

    fn version(&self) -> &str {
        "0.4.1"
    }

    async fn register(&self, context: &mut PluginContext) -> Result<(), PluginError> {
        let marker = sanitize_string(&context.config()["tag"], "tracked");
        let active = sanitize_boolean(&context.config()["enabled"], true);

        context.register_hook(
            HookName::AfterPostsQuery,
            hook_fn(move |data| {
                let marker = marker.clone();
                async move {
                    let HookData::Posts(mut posts) = data else {
                        return Err(PluginError::handler("expected a post list"));
                    };
                    if active {
                        for post in &mut posts {
                            if !post.tags.iter().any(|tag| tag == &marker) {
                                post.tags.push(marker.clone());
                            }
                        }
                    }
                    Ok(HookData::Posts(posts))
                }
            }),
        );
        Ok(())
    }
}
