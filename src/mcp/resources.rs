//! MCP resources.
//!
//! One resource today: the graph listing, rendered as a markdown list so
//! clients can embed it directly.

use crate::mcp::protocol::McpResource;
use crate::store::GraphStore;
use crate::types::{AppError, Result};

/// URI of the graph listing resource.
pub const GRAPH_LIST_URI: &str = "graph://listing";

/// Return all available resources.
pub fn list_resources() -> Vec<McpResource> {
    vec![McpResource {
        uri: GRAPH_LIST_URI.into(),
        name: "graph_list".into(),
        description: "Names of all graphs on the server, one per line.".into(),
        mime_type: "text/markdown".into(),
    }]
}

/// Read a resource by URI.
pub async fn read_resource(uri: &str, graph: &GraphStore) -> Result<String> {
    match uri {
        GRAPH_LIST_URI => {
            let names = graph.list().await?;
            let mut listing = String::new();
            for name in names {
                listing.push_str("- ");
                listing.push_str(&name);
                listing.push('\n');
            }
            Ok(listing)
        }
        other => Err(AppError::resource_not_found(format!(
            "unknown resource: {other}"
        ))),
    }
}
