//! Foglio: a multi-tenant blog platform backed by schema-loose Notion
//! databases.
//!
//! Pages are pulled from the upstream API, coerced into validated
//! [`domain::Post`] records, cached with per-namespace TTLs, and served
//! through a per-blog plugin runtime that lets plugins enrich post lists,
//! individual posts, and register their own routes and UI components.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod plugins;
