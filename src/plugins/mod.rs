//! Plugin system: catalog, per-tenant registries, and the hook pipeline.
//!
//! A [`Plugin`] describes itself and, when a blog enables it, registers
//! routes, components, and hook handlers through a [`context::PluginContext`].
//! Registrations are buffered and committed atomically, so a plugin whose
//! `register` fails leaves no trace. [`runtime::BlogRuntime`] hosts many
//! blogs at once, each with an isolated [`registry::PluginRegistry`].

pub mod builtin;
pub mod catalog;
pub mod context;
pub mod error;
pub mod hooks;
pub mod registry;
pub mod runtime;

use async_trait::async_trait;

pub use catalog::PluginCatalog;
pub use context::PluginContext;
pub use error::PluginError;
pub use hooks::{HookData, HookName};
pub use registry::PluginRegistry;
pub use runtime::{BlogConfig, BlogRuntime, PluginEntry};

/// Something installable into a blog.
///
/// Implementations must be stateless with respect to any one blog: the
/// same instance may be registered into several tenants, each call to
/// [`Plugin::register`] receiving that tenant's own context.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique name, used as the registry key and for dependency checks.
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Names of plugins that must already be registered in the same blog.
    fn dependencies(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Declare the plugin's routes, components, and hook handlers.
    async fn register(&self, context: &mut PluginContext) -> Result<(), PluginError>;
}
