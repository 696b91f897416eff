#![deny(missing_docs)]

//! Client-side orchestration for a PDF ingestion and search service.

/// HTTP client and wire types for the ingestion service.
pub mod backend;
/// Environment-driven configuration management.
pub mod config;
/// Bearer credential loading.
pub mod credentials;
/// Structured logging and tracing setup.
pub mod logging;
/// Session metrics helpers.
pub mod metrics;
/// Search query composition and execution.
pub mod search;
/// Upload workflow orchestration.
pub mod upload;
