//! The famdigest server: HTTP surface, process wiring, and the digest
//! pipeline.

pub mod app;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod routes;

#[cfg(test)]
pub(crate) mod test_support;

pub use app::{AppState, StartupError, build_router};
pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use pipeline::{DigestOutcome, TickSummary, run_tick};
