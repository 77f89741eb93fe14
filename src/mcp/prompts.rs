//! MCP prompts.

use crate::mcp::protocol::{McpContent, McpPrompt, McpPromptArgument, PromptMessage};
use crate::types::{AppError, Result};

/// Return all available prompts.
pub fn list_prompts() -> Vec<McpPrompt> {
    vec![McpPrompt {
        name: "user_setup".into(),
        description: "Guide a new user through connecting and running their first graph query."
            .into(),
        arguments: vec![McpPromptArgument {
            name: "name".into(),
            description: "Name to address the user by.".into(),
            required: false,
        }],
    }]
}

/// Resolve a prompt by name into its message list.
pub fn get_prompt(name: &str, args: &serde_json::Value) -> Result<Vec<PromptMessage>> {
    match name {
        "user_setup" => {
            let greeting = match args.get("name").and_then(|v| v.as_str()) {
                Some(user) if !user.trim().is_empty() => format!("Hello {user}."),
                _ => "Hello.".to_string(),
            };
            let text = format!(
                "{greeting} You are connected to a graph database and a key-value store. \
                 Start by calling the list_graphs tool to see which graphs exist, then use \
                 query_graph to run a query against one of them. Key-value data is available \
                 through get_key, set_key, delete_key and list_keys."
            );
            Ok(vec![PromptMessage {
                role: "user".into(),
                content: McpContent::text(text),
            }])
        }
        other => Err(AppError::resource_not_found(format!(
            "unknown prompt: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorKind;

    #[test]
    fn setup_prompt_is_advertised() {
        let prompts = list_prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].name, "user_setup");
        assert!(!prompts[0].arguments[0].required);
    }

    #[test]
    fn prompt_addresses_user_by_name_when_given() {
        let messages = get_prompt("user_setup", &serde_json::json!({"name": "Ada"})).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.text.starts_with("Hello Ada."));
    }

    #[test]
    fn prompt_works_without_a_name() {
        let messages = get_prompt("user_setup", &serde_json::json!({})).unwrap();
        assert!(messages[0].content.text.starts_with("Hello."));
    }

    #[test]
    fn unknown_prompt_is_not_found() {
        let err = get_prompt("bogus", &serde_json::json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
    }
}
