//! Infrastructure: upstream API access, telemetry, and the HTTP surface.

pub mod error;
pub mod http;
pub mod notion;
pub mod telemetry;

pub use error::InfraError;
