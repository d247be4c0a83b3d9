//! Featurelens - A feature verification core for the goal tracker.
//!
//! This library provides the debug/verification infrastructure behind the
//! `fl` CLI tool, including correlated execution tracing, a dependency-aware
//! feature-test runner, and feature status aggregation.

pub mod cli;
pub mod commands;
pub mod config;
pub mod mapping;
pub mod models;
pub mod query;
pub mod runner;
pub mod service;
pub mod status;
pub mod storage;
pub mod tracer;

pub use service::DebugService;


/// Library-level error type for Featurelens operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Result type alias for Featurelens operations.
pub type Result<T> = std::result::Result<T, Error>;
