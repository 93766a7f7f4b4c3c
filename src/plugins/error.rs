use thiserror::Error;

use crate::infra::notion::NotionApiError;

/// Failures inside the plugin runtime.
///
/// Handler failures are recoverable at the hook fold (the handler is
/// skipped); everything else propagates to the caller of the registry or
/// runtime operation.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin `{plugin}` is already registered")]
    Duplicate { plugin: String },
    #[error("plugin `{plugin}` requires `{dependency}` to be registered first")]
    MissingDependency { plugin: String, dependency: String },
    #[error("plugin `{plugin}` is not registered")]
    UnknownPlugin { plugin: String },
    #[error("no plugin named `{plugin}` in the catalog")]
    UnknownCatalogEntry { plugin: String },
    #[error("blog `{blog}` is not initialized")]
    UnknownBlog { blog: String },
    #[error("plugin `{plugin}` failed to register: {message}")]
    Registration { plugin: String, message: String },
    #[error("hook handler failed: {message}")]
    Handler { message: String },
    #[error("plugin context has no content client")]
    NoContent,
    #[error(transparent)]
    Content(#[from] NotionApiError),
}

impl PluginError {
    pub fn duplicate(plugin: impl Into<String>) -> Self {
        Self::Duplicate {
            plugin: plugin.into(),
        }
    }

    pub fn missing_dependency(plugin: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self::MissingDependency {
            plugin: plugin.into(),
            dependency: dependency.into(),
        }
    }

    pub fn unknown_plugin(plugin: impl Into<String>) -> Self {
        Self::UnknownPlugin {
            plugin: plugin.into(),
        }
    }

    pub fn unknown_blog(blog: impl Into<String>) -> Self {
        Self::UnknownBlog { blog: blog.into() }
    }

    pub fn registration(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Registration {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }
}
