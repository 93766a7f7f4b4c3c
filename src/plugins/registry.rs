//! Single-tenant plugin registry.
//!
//! Owns the plugin records and everything they registered. Lifecycle per
//! plugin: unregistered → registered(enabled) ⇄ registered(disabled) →
//! unregistered. Dependencies must be registered strictly before their
//! dependents; there is no cycle resolution, ordering is the caller's job.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::application::ContentClient;
use crate::cache::lock::{rw_read, rw_write};

use super::Plugin;
use super::context::{ComponentRegistration, PluginContext, RouteHandler, RouteRegistration};
use super::error::PluginError;
use super::hooks::{HookData, HookName, HookRegistry};

const SOURCE: &str = "plugins::registry::PluginRegistry";

#[derive(Debug, Clone)]
pub struct PluginStatus {
    pub enabled: bool,
    pub last_updated: OffsetDateTime,
}

struct PluginRecord {
    plugin: Arc<dyn Plugin>,
    status: PluginStatus,
    config: Value,
}

pub struct PluginRegistry {
    content: Option<Arc<ContentClient>>,
    plugins: RwLock<HashMap<String, PluginRecord>>,
    routes: RwLock<HashMap<String, RouteRegistration>>,
    components: RwLock<HashMap<String, ComponentRegistration>>,
    hooks: HookRegistry,
}

impl PluginRegistry {
    pub fn new(content: Option<Arc<ContentClient>>) -> Self {
        Self {
            content,
            plugins: RwLock::new(HashMap::new()),
            routes: RwLock::new(HashMap::new()),
            components: RwLock::new(HashMap::new()),
            hooks: HookRegistry::new(),
        }
    }

    /// Register a plugin and run its `register` entry point.
    ///
    /// Rejected when the name is taken or a declared dependency is absent.
    /// On success the plugin starts enabled; on failure nothing the plugin
    /// tried to register is kept.
    pub async fn register_plugin(
        &self,
        plugin: Arc<dyn Plugin>,
        config: Value,
    ) -> Result<(), PluginError> {
        let name = plugin.name().to_string();

        {
            let plugins = rw_read(&self.plugins, SOURCE, "register_plugin.check");
            if plugins.contains_key(&name) {
                return Err(PluginError::duplicate(name));
            }
            for dependency in plugin.dependencies() {
                if !plugins.contains_key(dependency) {
                    return Err(PluginError::missing_dependency(name, dependency));
                }
            }
        }

        let mut context = PluginContext::new(&name, config.clone(), self.content.clone());
        plugin
            .register(&mut context)
            .await
            .map_err(|error| PluginError::registration(&name, error.to_string()))?;

        self.commit(&name, context);
        rw_write(&self.plugins, SOURCE, "register_plugin.insert").insert(
            name.clone(),
            PluginRecord {
                plugin,
                status: PluginStatus {
                    enabled: true,
                    last_updated: OffsetDateTime::now_utc(),
                },
                config,
            },
        );
        debug!(plugin = %name, "plugin registered");
        Ok(())
    }

    fn commit(&self, name: &str, context: PluginContext) {
        {
            let mut routes = rw_write(&self.routes, SOURCE, "commit.routes");
            for registration in context.routes {
                if let Some(previous) = routes.insert(registration.path.clone(), registration) {
                    warn!(
                        plugin = name,
                        path = %previous.path,
                        previous_owner = %previous.plugin,
                        "route re-registered, previous handler replaced"
                    );
                }
            }
        }
        {
            let mut components = rw_write(&self.components, SOURCE, "commit.components");
            for registration in context.components {
                components.insert(registration.slot.clone(), registration);
            }
        }
        for (hook, handler) in context.hooks {
            self.hooks.register(name, hook, handler);
        }
    }

    /// Remove a plugin and sweep everything it registered.
    pub fn unregister_plugin(&self, name: &str) -> Result<(), PluginError> {
        let removed = rw_write(&self.plugins, SOURCE, "unregister_plugin").remove(name);
        if removed.is_none() {
            return Err(PluginError::unknown_plugin(name));
        }

        rw_write(&self.routes, SOURCE, "unregister_plugin.routes")
            .retain(|_, registration| registration.plugin != name);
        rw_write(&self.components, SOURCE, "unregister_plugin.components")
            .retain(|_, registration| registration.plugin != name);
        self.hooks.remove_plugin(name);
        Ok(())
    }

    /// Flip a plugin's enabled status without re-invoking `register`.
    pub fn set_plugin_enabled(&self, name: &str, enabled: bool) -> Result<(), PluginError> {
        let mut plugins = rw_write(&self.plugins, SOURCE, "set_plugin_enabled");
        let record = plugins
            .get_mut(name)
            .ok_or_else(|| PluginError::unknown_plugin(name))?;
        record.status.enabled = enabled;
        record.status.last_updated = OffsetDateTime::now_utc();
        Ok(())
    }

    /// Replace a plugin's config without re-invoking `register`.
    pub fn update_plugin_config(&self, name: &str, config: Value) -> Result<(), PluginError> {
        let mut plugins = rw_write(&self.plugins, SOURCE, "update_plugin_config");
        let record = plugins
            .get_mut(name)
            .ok_or_else(|| PluginError::unknown_plugin(name))?;
        record.config = config;
        record.status.last_updated = OffsetDateTime::now_utc();
        Ok(())
    }

    pub fn plugin_status(&self, name: &str) -> Option<PluginStatus> {
        rw_read(&self.plugins, SOURCE, "plugin_status")
            .get(name)
            .map(|record| record.status.clone())
    }

    pub fn plugin_config(&self, name: &str) -> Option<Value> {
        rw_read(&self.plugins, SOURCE, "plugin_config")
            .get(name)
            .map(|record| record.config.clone())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        rw_read(&self.plugins, SOURCE, "is_registered").contains_key(name)
    }

    pub fn plugin_names(&self) -> Vec<String> {
        rw_read(&self.plugins, SOURCE, "plugin_names")
            .keys()
            .cloned()
            .collect()
    }

    pub fn route(&self, path: &str) -> Option<Arc<dyn RouteHandler>> {
        rw_read(&self.routes, SOURCE, "route")
            .get(path)
            .map(|registration| registration.handler.clone())
    }

    pub fn route_paths(&self) -> Vec<String> {
        rw_read(&self.routes, SOURCE, "route_paths")
            .keys()
            .cloned()
            .collect()
    }

    pub fn component(&self, slot: &str) -> Option<ComponentRegistration> {
        rw_read(&self.components, SOURCE, "component")
            .get(slot)
            .cloned()
    }

    /// Fold `data` through the hook's chain, skipping handlers owned by
    /// disabled plugins.
    pub async fn execute_hook(&self, hook: HookName, data: HookData) -> HookData {
        self.hooks
            .execute_filtered(hook, data, |plugin| {
                rw_read(&self.plugins, SOURCE, "execute_hook.filter")
                    .get(plugin)
                    .is_some_and(|record| record.status.enabled)
            })
            .await
    }

    pub fn hook_handler_count(&self, hook: HookName) -> usize {
        self.hooks.handler_count(hook)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use crate::plugins::hooks::hook_fn;

    use super::*;

    struct TestPlugin {
        name: &'static str,
        dependencies: Vec<&'static str>,
        fail_register: bool,
    }

    impl TestPlugin {
        fn named(name: &'static str) -> Self {
            Self {
                name,
                dependencies: Vec::new(),
                fail_register: false,
            }
        }
    }

    #[async_trait]
    impl Plugin for TestPlugin {
        fn name(&self) -> &str {
            self.name
        }

        fn version(&self) -> &str {
            "0.0.1"
        }

        fn dependencies(&self) -> Vec<&str> {
            self.dependencies.clone()
        }

        async fn register(&self, context: &mut PluginContext) -> Result<(), PluginError> {
            if self.fail_register {
                return Err(PluginError::handler("nope"));
            }
            context.register_component("sidebar", "TestWidget");
            context.register_hook(
                HookName::AfterPostsQuery,
                hook_fn(|data| async move { Ok(data) }),
            );
            Ok(())
        }
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let registry = PluginRegistry::new(None);
        registry
            .register_plugin(Arc::new(TestPlugin::named("a")), json!({}))
            .await
            .expect("first registration");

        let error = registry
            .register_plugin(Arc::new(TestPlugin::named("a")), json!({}))
            .await
            .expect_err("duplicate");
        assert!(matches!(error, PluginError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn dependencies_must_be_registered_first() {
        let registry = PluginRegistry::new(None);
        let dependent = TestPlugin {
            name: "needs-base",
            dependencies: vec!["base"],
            fail_register: false,
        };

        let error = registry
            .register_plugin(Arc::new(dependent), json!({}))
            .await
            .expect_err("missing dependency");
        assert!(matches!(error, PluginError::MissingDependency { .. }));

        registry
            .register_plugin(Arc::new(TestPlugin::named("base")), json!({}))
            .await
            .expect("base");
        let dependent = TestPlugin {
            name: "needs-base",
            dependencies: vec!["base"],
            fail_register: false,
        };
        registry
            .register_plugin(Arc::new(dependent), json!({}))
            .await
            .expect("dependent after base");
    }

    #[tokio::test]
    async fn failed_register_keeps_nothing() {
        let registry = PluginRegistry::new(None);
        let failing = TestPlugin {
            name: "broken",
            dependencies: Vec::new(),
            fail_register: true,
        };

        let error = registry
            .register_plugin(Arc::new(failing), json!({}))
            .await
            .expect_err("register fails");
        assert!(matches!(error, PluginError::Registration { .. }));
        assert!(!registry.is_registered("broken"));
        assert_eq!(registry.hook_handler_count(HookName::AfterPostsQuery), 0);
        assert!(registry.component("sidebar").is_none());
    }

    #[tokio::test]
    async fn unregister_sweeps_registrations() {
        let registry = PluginRegistry::new(None);
        registry
            .register_plugin(Arc::new(TestPlugin::named("a")), json!({}))
            .await
            .expect("registration");
        assert!(registry.component("sidebar").is_some());

        registry.unregister_plugin("a").expect("unregister");
        assert!(!registry.is_registered("a"));
        assert!(registry.component("sidebar").is_none());
        assert_eq!(registry.hook_handler_count(HookName::AfterPostsQuery), 0);
    }

    #[tokio::test]
    async fn disabled_plugin_hooks_are_skipped() {
        let registry = PluginRegistry::new(None);

        struct Mutator;
        #[async_trait]
        impl Plugin for Mutator {
            fn name(&self) -> &str {
                "mutator"
            }
            fn version(&self) -> &str {
                "0.0.1"
            }
            async fn register(&self, context: &mut PluginContext) -> Result<(), PluginError> {
                context.register_hook(
                    HookName::AfterPostsQuery,
                    hook_fn(|_| async { Ok(HookData::Value(json!("mutated"))) }),
                );
                Ok(())
            }
        }

        registry
            .register_plugin(Arc::new(Mutator), json!({}))
            .await
            .expect("registration");
        registry
            .set_plugin_enabled("mutator", false)
            .expect("disable");

        let out = registry
            .execute_hook(HookName::AfterPostsQuery, HookData::Value(json!("x")))
            .await;
        match out {
            HookData::Value(value) => assert_eq!(value, json!("x")),
            _ => panic!("variant changed"),
        }
    }

    #[tokio::test]
    async fn update_config_does_not_reregister() {
        let registry = PluginRegistry::new(None);
        registry
            .register_plugin(Arc::new(TestPlugin::named("a")), json!({"k": 1}))
            .await
            .expect("registration");

        registry
            .update_plugin_config("a", json!({"k": 2}))
            .expect("update");
        assert_eq!(registry.plugin_config("a"), Some(json!({"k": 2})));
        // Still exactly one hook handler: register ran once.
        assert_eq!(registry.hook_handler_count(HookName::AfterPostsQuery), 1);
    }

    #[tokio::test]
    async fn plugins_read_content_through_their_context() {
        use std::sync::Mutex;

        use crate::cache::CacheConfig;
        use crate::infra::notion::{
            ContentSource, NotionApiError, PROP_PUBLISHED, PROP_SLUG, Page, PageFilter,
        };

        struct CannedSource {
            pages: Vec<Page>,
        }

        #[async_trait]
        impl ContentSource for CannedSource {
            async fn query_pages(&self, filter: &PageFilter) -> Result<Vec<Page>, NotionApiError> {
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

            async fn page_markdown(&self, _page_id: &str) -> Result<String, NotionApiError> {
                Ok("body text".to_string())
            }
        }

        /// Reads the blog's content during `register` and records what it saw.
        struct ContentReaderPlugin {
            seen_slugs: Arc<Mutex<Vec<String>>>,
            seen_title: Arc<Mutex<Option<String>>>,
        }

        #[async_trait]
        impl Plugin for ContentReaderPlugin {
            fn name(&self) -> &str {
                "content-reader"
            }

            fn version(&self) -> &str {
                "0.0.1"
            }

            async fn register(&self, context: &mut PluginContext) -> Result<(), PluginError> {
                let posts = context.posts().await?;
                {
                    let mut slugs = self.seen_slugs.lock().unwrap_or_else(|e| e.into_inner());
                    slugs.extend(posts.iter().map(|post| post.slug.clone()));
                }

                let post = context.post("hello-world").await?;
                let mut title = self.seen_title.lock().unwrap_or_else(|e| e.into_inner());
                *title = post.map(|post| post.title);
                Ok(())
            }
        }

        let page: Page = serde_json::from_value(json!({
            "id": "p1",
            "created_time": "2024-05-01T09:00:00Z",
            "last_edited_time": "2024-05-02T09:00:00Z",
            "properties": {
                "Title": { "type": "title", "title": [{ "plain_text": "Hello World" }] },
                "Slug": { "type": "rich_text", "rich_text": [{ "plain_text": "hello-world" }] },
                "Published": { "type": "checkbox", "checkbox": true },
            },
        }))
        .expect("page");

        let content = Arc::new(ContentClient::new(
            Arc::new(CannedSource { pages: vec![page] }),
            CacheConfig::default(),
        ));
        let registry = PluginRegistry::new(Some(content));

        let seen_slugs = Arc::new(Mutex::new(Vec::new()));
        let seen_title = Arc::new(Mutex::new(None));
        registry
            .register_plugin(
                Arc::new(ContentReaderPlugin {
                    seen_slugs: Arc::clone(&seen_slugs),
                    seen_title: Arc::clone(&seen_title),
                }),
                json!({}),
            )
            .await
            .expect("registration");

        let slugs = seen_slugs.lock().unwrap_or_else(|e| e.into_inner());
        assert_eq!(*slugs, vec!["hello-world".to_string()]);
        let title = seen_title.lock().unwrap_or_else(|e| e.into_inner());
        assert_eq!(title.as_deref(), Some("Hello World"));
    }

    #[tokio::test]
    async fn context_content_reads_fail_without_a_client() {
        struct NeedsContent;

        #[async_trait]
        impl Plugin for NeedsContent {
            fn name(&self) -> &str {
                "needs-content"
            }

            fn version(&self) -> &str {
                "0.0.1"
            }

            async fn register(&self, context: &mut PluginContext) -> Result<(), PluginError> {
                context.posts().await?;
                Ok(())
            }
        }

        let registry = PluginRegistry::new(None);
        let error = registry
            .register_plugin(Arc::new(NeedsContent), json!({}))
            .await
            .expect_err("no content client");
        assert!(matches!(error, PluginError::Registration { .. }));
        assert!(error.to_string().contains("no content client"));
    }
}
