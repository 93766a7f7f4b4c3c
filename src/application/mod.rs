//! Application services orchestrating domain, cache, and upstream access.

pub mod content;
pub mod error;

pub use content::ContentClient;
