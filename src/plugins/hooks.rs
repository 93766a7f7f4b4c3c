//! Named extension points executed as an ordered async fold.
//!
//! Handlers registered under the same hook run strictly in registration
//! order; each handler's output becomes the next handler's input. A failing
//! handler is logged and skipped, so the fold continues from the last
//! successfully-produced value and never aborts the chain.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use metrics::counter;
use tracing::warn;

use crate::cache::lock::{rw_read, rw_write};
use crate::domain::Post;

use super::error::PluginError;

/// The extension points this runtime exposes to plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookName {
    BeforePostsQuery,
    AfterPostsQuery,
    BeforePostRender,
    AfterPostRender,
}

impl HookName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforePostsQuery => "before_posts_query",
            Self::AfterPostsQuery => "after_posts_query",
            Self::BeforePostRender => "before_post_render",
            Self::AfterPostRender => "after_post_render",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value a hook chain transforms.
#[derive(Debug, Clone)]
pub enum HookData {
    Posts(Vec<Post>),
    Post(Box<Post>),
    Value(serde_json::Value),
}

impl HookData {
    fn kind(&self) -> &'static str {
        match self {
            Self::Posts(_) => "posts",
            Self::Post(_) => "post",
            Self::Value(_) => "value",
        }
    }

    pub fn into_posts(self) -> Option<Vec<Post>> {
        match self {
            Self::Posts(posts) => Some(posts),
            _ => None,
        }
    }

    pub fn into_post(self) -> Option<Post> {
        match self {
            Self::Post(post) => Some(*post),
            _ => None,
        }
    }
}

/// One async transformer in a hook chain.
#[async_trait]
pub trait HookHandler: Send + Sync {
    async fn run(&self, data: HookData) -> Result<HookData, PluginError>;
}

struct FnHandler<F> {
    handler: F,
}

#[async_trait]
impl<F, Fut> HookHandler for FnHandler<F>
where
    F: Fn(HookData) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HookData, PluginError>> + Send,
{
    async fn run(&self, data: HookData) -> Result<HookData, PluginError> {
        (self.handler)(data).await
    }
}

/// Wrap an async closure as a registrable hook handler.
pub fn hook_fn<F, Fut>(handler: F) -> Arc<dyn HookHandler>
where
    F: Fn(HookData) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HookData, PluginError>> + Send + 'static,
{
    Arc::new(FnHandler { handler })
}

#[derive(Clone)]
struct HookRegistration {
    plugin: String,
    handler: Arc<dyn HookHandler>,
}

const SOURCE: &str = "plugins::hooks::HookRegistry";

/// Ordered handler chains keyed by hook name.
#[derive(Default)]
pub struct HookRegistry {
    chains: RwLock<HashMap<HookName, Vec<HookRegistration>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, plugin: &str, hook: HookName, handler: Arc<dyn HookHandler>) {
        rw_write(&self.chains, SOURCE, "register")
            .entry(hook)
            .or_default()
            .push(HookRegistration {
                plugin: plugin.to_string(),
                handler,
            });
    }

    pub fn handler_count(&self, hook: HookName) -> usize {
        rw_read(&self.chains, SOURCE, "handler_count")
            .get(&hook)
            .map_or(0, Vec::len)
    }

    /// Drop every handler a plugin registered, across all hooks.
    pub fn remove_plugin(&self, plugin: &str) {
        let mut chains = rw_write(&self.chains, SOURCE, "remove_plugin");
        for chain in chains.values_mut() {
            chain.retain(|registration| registration.plugin != plugin);
        }
    }

    /// Fold `data` through the chain registered under `hook`, in
    /// registration order, skipping handlers of plugins `is_active` rejects.
    ///
    /// A handler that errors, or that returns a different data variant than
    /// it received, is skipped: the next handler sees the last good value.
    pub async fn execute_filtered<F>(&self, hook: HookName, data: HookData, is_active: F) -> HookData
    where
        F: Fn(&str) -> bool,
    {
        let chain: Vec<HookRegistration> = {
            let chains = rw_read(&self.chains, SOURCE, "execute");
            chains
                .get(&hook)
                .map(|chain| {
                    chain
                        .iter()
                        .filter(|registration| is_active(&registration.plugin))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut acc = data;
        for registration in chain {
            let expected = acc.kind();
            match registration.handler.run(acc.clone()).await {
                Ok(next) if next.kind() == expected => acc = next,
                Ok(next) => {
                    counter!("foglio_hook_handler_error_total").increment(1);
                    warn!(
                        hook = %hook,
                        plugin = %registration.plugin,
                        expected,
                        got = next.kind(),
                        "hook handler changed data variant, skipping its output"
                    );
                }
                Err(error) => {
                    counter!("foglio_hook_handler_error_total").increment(1);
                    warn!(
                        hook = %hook,
                        plugin = %registration.plugin,
                        %error,
                        "hook handler failed, continuing with previous value"
                    );
                }
            }
        }
        acc
    }

    pub async fn execute(&self, hook: HookName, data: HookData) -> HookData {
        self.execute_filtered(hook, data, |_| true).await
    }
}
