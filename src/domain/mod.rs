//! Domain model: validated posts and the coercions that produce them.

pub mod error;
pub mod post;
pub mod sanitize;
pub mod slug;

pub use error::{DomainError, ValidationError};
pub use post::Post;
