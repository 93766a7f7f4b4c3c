//! The multi-tenant plugin runtime.
//!
//! Each initialized blog owns its own content client and its own
//! single-tenant registry, so one tenant's plugins can never observe or
//! mutate another tenant's routes, components, hooks, or cached content.
//! Plugin instances themselves are created once per process (by name, via
//! the catalog) and registered independently for every blog that enables
//! them.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{info, warn};

use crate::application::ContentClient;
use crate::cache::CacheConfig;
use crate::domain::Post;
use crate::infra::notion::{ContentSource, NotionApiError, NotionHttpSource, UpstreamConfig};

use super::Plugin;
use super::catalog::PluginCatalog;
use super::error::PluginError;
use super::hooks::{HookData, HookName};
use super::registry::PluginRegistry;

/// One plugin activation in a blog's configuration.
#[derive(Debug, Clone)]
pub struct PluginEntry {
    pub name: String,
    pub enabled: bool,
    pub settings: Value,
}

/// Everything needed to bring one blog online.
#[derive(Debug, Clone)]
pub struct BlogConfig {
    pub id: String,
    pub name: String,
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
    pub plugins: Vec<PluginEntry>,
}

impl BlogConfig {
    fn plugin_entry_mut(&mut self, plugin: &str) -> Option<&mut PluginEntry> {
        self.plugins.iter_mut().find(|entry| entry.name == plugin)
    }
}

struct TenantState {
    config: BlogConfig,
    content: Arc<ContentClient>,
    registry: Arc<PluginRegistry>,
}

/// Builds a content source from a blog's upstream credentials. The seam
/// exists so tests can run whole blogs against in-memory sources.
pub type SourceFactory =
    Arc<dyn Fn(&UpstreamConfig) -> Result<Arc<dyn ContentSource>, NotionApiError> + Send + Sync>;

pub struct BlogRuntime {
    catalog: PluginCatalog,
    source_factory: SourceFactory,
    /// One instance per plugin name, shared across every blog enabling it.
    instances: DashMap<String, Arc<dyn Plugin>>,
    tenants: DashMap<String, TenantState>,
}

impl BlogRuntime {
    pub fn new(catalog: PluginCatalog, source_factory: SourceFactory) -> Self {
        Self {
            catalog,
            source_factory,
            instances: DashMap::new(),
            tenants: DashMap::new(),
        }
    }

    /// A runtime whose blogs talk to the real upstream HTTP API.
    pub fn with_http_sources(catalog: PluginCatalog) -> Self {
        Self::new(
            catalog,
            Arc::new(|upstream: &UpstreamConfig| {
                Ok(Arc::new(NotionHttpSource::new(upstream.clone())?) as Arc<dyn ContentSource>)
            }),
        )
    }

    /// Bring a blog online (or rebuild it from its current config).
    ///
    /// Always starts from a fresh registry: re-initialization drops every
    /// one of the tenant's previous registrations before re-running plugin
    /// registration, which makes the operation idempotent regardless of how
    /// individual plugins implement `register`. Plugins are registered
    /// sequentially so a later plugin's dependency check can rely on all
    /// earlier ones having completed.
    pub async fn initialize_blog(&self, config: BlogConfig) -> Result<(), PluginError> {
        // The warm client survives a plugin toggle, but changed upstream
        // credentials or cache sizing must produce a fresh one.
        let content = match self.tenants.get(&config.id) {
            Some(existing)
                if existing.config.upstream == config.upstream
                    && existing.config.cache == config.cache =>
            {
                Arc::clone(&existing.content)
            }
            _ => {
                let source = (self.source_factory)(&config.upstream)?;
                Arc::new(ContentClient::new(source, config.cache.clone()))
            }
        };

        let registry = Arc::new(PluginRegistry::new(Some(Arc::clone(&content))));

        for entry in config.plugins.iter().filter(|entry| entry.enabled) {
            let instance = self.plugin_instance(&entry.name)?;
            registry
                .register_plugin(instance, entry.settings.clone())
                .await?;
        }

        info!(
            blog = %config.id,
            plugins = registry.plugin_names().len(),
            "blog initialized"
        );
        self.tenants.insert(
            config.id.clone(),
            TenantState {
                config,
                content,
                registry,
            },
        );
        Ok(())
    }

    fn plugin_instance(&self, name: &str) -> Result<Arc<dyn Plugin>, PluginError> {
        if let Some(instance) = self.instances.get(name) {
            return Ok(Arc::clone(instance.value()));
        }
        let instance = self
            .catalog
            .create(name)
            .ok_or_else(|| PluginError::UnknownCatalogEntry {
                plugin: name.to_string(),
            })?;
        self.instances.insert(name.to_string(), Arc::clone(&instance));
        Ok(instance)
    }

    fn tenant_handles(
        &self,
        blog: &str,
    ) -> Result<(Arc<ContentClient>, Arc<PluginRegistry>), PluginError> {
        let tenant = self
            .tenants
            .get(blog)
            .ok_or_else(|| PluginError::unknown_blog(blog))?;
        Ok((Arc::clone(&tenant.content), Arc::clone(&tenant.registry)))
    }

    /// The blog's published posts, after its `after_posts_query` chain.
    pub async fn enhanced_posts(&self, blog: &str) -> Result<Vec<Post>, PluginError> {
        let (content, registry) = self.tenant_handles(blog)?;
        let posts = content.published_posts().await?;

        let data = registry
            .execute_hook(HookName::AfterPostsQuery, HookData::Posts(posts.clone()))
            .await;
        match data.into_posts() {
            Some(enhanced) => Ok(enhanced),
            None => {
                warn!(blog, "after_posts_query chain lost the post list, serving unenhanced");
                Ok(posts)
            }
        }
    }

    /// One published post by slug, after the blog's `before_post_render`
    /// chain.
    pub async fn enhanced_post(&self, blog: &str, slug: &str) -> Result<Option<Post>, PluginError> {
        let (content, registry) = self.tenant_handles(blog)?;
        let Some(post) = content.post_by_slug(slug).await? else {
            return Ok(None);
        };

        let data = registry
            .execute_hook(HookName::BeforePostRender, HookData::Post(Box::new(post.clone())))
            .await;
        match data.into_post() {
            Some(enhanced) => Ok(Some(enhanced)),
            None => {
                warn!(blog, slug, "before_post_render chain lost the post, serving unenhanced");
                Ok(Some(post))
            }
        }
    }

    /// Slugs of the blog's published posts; empty when upstream is down.
    pub async fn all_slugs(&self, blog: &str) -> Result<Vec<String>, PluginError> {
        let (content, _) = self.tenant_handles(blog)?;
        Ok(content.all_slugs().await)
    }

    /// Run an arbitrary hook chain for one blog.
    pub async fn execute_hook(
        &self,
        blog: &str,
        hook: HookName,
        data: HookData,
    ) -> Result<HookData, PluginError> {
        let (_, registry) = self.tenant_handles(blog)?;
        Ok(registry.execute_hook(hook, data).await)
    }

    /// Enable or disable a plugin for one blog and rebuild that blog.
    ///
    /// Rebuilding on both transitions keeps the live registry in lockstep
    /// with the stored config: a disabled plugin stops contributing routes,
    /// components, and hooks immediately.
    pub async fn toggle_blog_plugin(
        &self,
        blog: &str,
        plugin: &str,
        enabled: bool,
    ) -> Result<(), PluginError> {
        let config = {
            let mut tenant = self
                .tenants
                .get_mut(blog)
                .ok_or_else(|| PluginError::unknown_blog(blog))?;
            let entry = tenant
                .config
                .plugin_entry_mut(plugin)
                .ok_or_else(|| PluginError::unknown_plugin(plugin))?;
            entry.enabled = enabled;
            tenant.config.clone()
        };

        self.initialize_blog(config).await
    }

    /// Replace a plugin's per-blog settings without re-running `register`.
    pub fn update_blog_plugin_settings(
        &self,
        blog: &str,
        plugin: &str,
        settings: Value,
    ) -> Result<(), PluginError> {
        let mut tenant = self
            .tenants
            .get_mut(blog)
            .ok_or_else(|| PluginError::unknown_blog(blog))?;
        let entry = tenant
            .config
            .plugin_entry_mut(plugin)
            .ok_or_else(|| PluginError::unknown_plugin(plugin))?;
        entry.settings = settings.clone();

        // Keep the live registry's view in sync when the plugin is active.
        if tenant.registry.is_registered(plugin) {
            tenant.registry.update_plugin_config(plugin, settings)?;
        }
        Ok(())
    }

    /// Take a blog offline, dropping its config, content client, caches,
    /// and every registration its plugins made.
    pub fn remove_blog(&self, blog: &str) -> Result<(), PluginError> {
        let (_, state) = self
            .tenants
            .remove(blog)
            .ok_or_else(|| PluginError::unknown_blog(blog))?;
        state.content.invalidate_cache();
        info!(blog, "blog removed");
        Ok(())
    }

    pub fn has_blog(&self, blog: &str) -> bool {
        self.tenants.contains_key(blog)
    }

    pub fn blog_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .tenants
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Route paths a blog's plugins registered.
    pub fn blog_route_paths(&self, blog: &str) -> Result<Vec<String>, PluginError> {
        let (_, registry) = self.tenant_handles(blog)?;
        Ok(registry.route_paths())
    }

    /// Sweep expired cache entries across every blog; returns the total
    /// removed.
    pub fn cleanup_caches(&self) -> usize {
        self.tenants
            .iter()
            .map(|tenant| tenant.content.cleanup_cache())
            .sum()
    }
}
