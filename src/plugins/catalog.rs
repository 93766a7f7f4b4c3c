//! Startup lookup table mapping plugin names to factories.
//!
//! Blogs reference plugins by name in configuration; the catalog resolves
//! those names to instances without any dynamic loading.

use std::collections::HashMap;
use std::sync::Arc;

use super::Plugin;
use super::builtin::{AnalyticsPlugin, CommentsPlugin};

type PluginFactory = Arc<dyn Fn() -> Arc<dyn Plugin> + Send + Sync>;

#[derive(Default, Clone)]
pub struct PluginCatalog {
    factories: HashMap<String, PluginFactory>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog with every plugin shipped in-tree.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.insert("comments", || Arc::new(CommentsPlugin));
        catalog.insert("analytics", || Arc::new(AnalyticsPlugin));
        catalog
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn create(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}
