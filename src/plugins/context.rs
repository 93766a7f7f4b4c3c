//! The registration surface handed to a plugin's `register` call.
//!
//! A context buffers everything the plugin registers; the owning registry
//! commits the buffers only after `register` returns success, so a plugin
//! that fails halfway leaves no partial registrations behind.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::application::ContentClient;
use crate::domain::Post;

use super::error::PluginError;
use super::hooks::{HookHandler, HookName};

/// Handles a plugin-registered route invocation with JSON in and out.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, params: Value) -> Result<Value, PluginError>;
}

#[derive(Clone)]
pub struct RouteRegistration {
    pub plugin: String,
    pub path: String,
    pub handler: Arc<dyn RouteHandler>,
}

/// A named UI extension point filled with a component reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRegistration {
    pub plugin: String,
    pub slot: String,
    pub component: String,
}

pub struct PluginContext {
    plugin: String,
    config: Value,
    content: Option<Arc<ContentClient>>,
    pub(super) routes: Vec<RouteRegistration>,
    pub(super) components: Vec<ComponentRegistration>,
    pub(super) hooks: Vec<(HookName, Arc<dyn HookHandler>)>,
}

impl PluginContext {
    pub(super) fn new(
        plugin: impl Into<String>,
        config: Value,
        content: Option<Arc<ContentClient>>,
    ) -> Self {
        Self {
            plugin: plugin.into(),
            config,
            content,
            routes: Vec::new(),
            components: Vec::new(),
            hooks: Vec::new(),
        }
    }

    pub fn register_route(&mut self, path: impl Into<String>, handler: Arc<dyn RouteHandler>) {
        self.routes.push(RouteRegistration {
            plugin: self.plugin.clone(),
            path: path.into(),
            handler,
        });
    }

    pub fn register_component(&mut self, slot: impl Into<String>, component: impl Into<String>) {
        self.components.push(ComponentRegistration {
            plugin: self.plugin.clone(),
            slot: slot.into(),
            component: component.into(),
        });
    }

    pub fn register_hook(&mut self, hook: HookName, handler: Arc<dyn HookHandler>) {
        self.hooks.push((hook, handler));
    }

    /// This plugin's settings for the blog being initialized.
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Published posts of the blog this context is bound to.
    pub async fn posts(&self) -> Result<Vec<Post>, PluginError> {
        let content = self.content.as_ref().ok_or(PluginError::NoContent)?;
        Ok(content.published_posts().await?)
    }

    /// One published post of the bound blog.
    pub async fn post(&self, slug: &str) -> Result<Option<Post>, PluginError> {
        let content = self.content.as_ref().ok_or(PluginError::NoContent)?;
        Ok(content.post_by_slug(slug).await?)
    }
}
