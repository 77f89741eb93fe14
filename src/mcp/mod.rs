//! MCP protocol gateway: JSON-RPC envelopes, tool/resource/prompt
//! surfaces, and the stdio server loop.

pub mod prompts;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod tools;

pub use server::McpServer;
