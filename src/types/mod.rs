//! Core types for the MCP server.
//!
//! - **Errors**: kind-tagged [`AppError`] with operational classification
//! - **Config**: configuration structures loaded from the environment

mod config;
mod errors;

pub use config::{Config, ConnectionConfig, GraphStoreConfig, KvStoreConfig, LoggingConfig};
pub use errors::{AppError, ErrorKind, Result};
