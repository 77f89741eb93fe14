//! # graphkv-mcp — MCP gateway for a graph database and key-value store
//!
//! An MCP (Model Context Protocol) stdio server exposing graph and
//! key-value operations as tools, resources and prompts. The engineering
//! core is:
//! - a resilient connection lifecycle shared by both backing stores
//!   (bounded retry on connect, fail-fast operations, idempotent close),
//! - an error classification policy deciding which failures the process
//!   survives, and
//! - a dual-sink structured logger (JSON-lines file + client
//!   notifications) that both depend on.
//!
//! ## Architecture
//!
//! ```text
//!   stdin/stdout (JSON-RPC)
//!        │
//!   ┌────▼─────┐   ┌────────────┐   ┌──────────────────┐
//!   │ McpServer│──▶│ tools /    │──▶│ GraphStore       │─▶ RESP/TCP
//!   │  loop    │   │ resources /│   │ KvStore          │─▶ RESP/TCP
//!   └────▲─────┘   │ prompts    │   │ (ManagedConnection)
//!        │         └────────────┘   └──────────────────┘
//!   notifications ◀── Logger ◀── ErrorHandler
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

// Re-export public API
pub mod logging;
pub mod mcp;
pub mod policy;
pub mod resp;
pub mod store;
pub mod types;

// Internal utilities
pub mod observability;

pub use types::{AppError, Config, Result};
