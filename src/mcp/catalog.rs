use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Value, json};

use super::client::ToolProvider;
use super::types::McpTool;

/// A callable tool as advertised to the completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON-Schema object describing the tool's arguments.
    pub parameter_schema: Value,
}

impl ToolDefinition {
    /// Chat Completions `tools[]` entry.
    pub fn to_function_spec(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameter_schema
            }
        })
    }
}

fn empty_object_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// Turn provider descriptors into function definitions.
///
/// Unnamed entries are skipped; a repeated name keeps its first occurrence.
pub fn translate_tools(tools: Vec<McpTool>) -> Vec<ToolDefinition> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(tools.len());

    for tool in tools {
        if tool.name.trim().is_empty() {
            tracing::debug!("Skipping tool descriptor without a name");
            continue;
        }
        if !seen.insert(tool.name.clone()) {
            tracing::debug!(tool = %tool.name, "Skipping duplicate tool descriptor");
            continue;
        }

        let parameter_schema = if tool.input_schema.is_object() {
            tool.input_schema
        } else {
            empty_object_schema()
        };

        out.push(ToolDefinition {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            parameter_schema,
        });
    }

    out
}

/// Resolves the tool catalog once per turn.
#[derive(Clone)]
pub struct ToolCatalog {
    provider: Arc<dyn ToolProvider>,
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog").finish_non_exhaustive()
    }
}

impl ToolCatalog {
    pub fn new(provider: Arc<dyn ToolProvider>) -> Self {
        Self { provider }
    }

    /// Current tool definitions. Any discovery failure yields an empty list.
    pub async fn fetch_tools(&self) -> Vec<ToolDefinition> {
        match self.provider.list_tools().await {
            Ok(tools) => {
                let defs = translate_tools(tools);
                tracing::debug!(tool_count = defs.len(), "Resolved tool catalog");
                defs
            }
            Err(e) => {
                tracing::warn!(error = %e, "Tool discovery failed, continuing without tools");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DiscoveryError, ProviderError};
    use crate::mcp::types::CallToolResult;
    use async_trait::async_trait;
    use std::time::Duration;

    fn tool(name: &str, description: Option<&str>, schema: Value) -> McpTool {
        McpTool {
            name: name.to_string(),
            title: None,
            description: description.map(str::to_string),
            input_schema: schema,
            output_schema: None,
        }
    }

    struct FixedProvider(Result<Vec<McpTool>, ()>);

    #[async_trait]
    impl ToolProvider for FixedProvider {
        async fn list_tools(&self) -> Result<Vec<McpTool>, DiscoveryError> {
            self.0
                .clone()
                .map_err(|()| ProviderError::Timeout(Duration::from_secs(30)).into())
        }

        async fn call_tool(
            &self,
            _name: &str,
            _arguments: Value,
        ) -> Result<CallToolResult, ProviderError> {
            unreachable!("catalog never invokes tools")
        }
    }

    #[test]
    fn test_translate_fills_defaults() {
        let defs = translate_tools(vec![tool("lookup", None, Value::Null)]);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].description, "");
        assert_eq!(defs[0].parameter_schema, empty_object_schema());
    }

    #[test]
    fn test_translate_skips_unnamed_and_duplicates() {
        let defs = translate_tools(vec![
            tool("", Some("nameless"), empty_object_schema()),
            tool("lookup", Some("first"), empty_object_schema()),
            tool("lookup", Some("second"), empty_object_schema()),
            tool("refund_policy", Some("policy"), empty_object_schema()),
        ]);
        let names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["lookup", "refund_policy"]);
        assert_eq!(defs[0].description, "first");
    }

    #[test]
    fn test_function_spec_shape() {
        let schema = json!({
            "type": "object",
            "properties": {"confirmation_code": {"type": "string"}},
            "required": ["confirmation_code"]
        });
        let def = translate_tools(vec![tool(
            "get_return_by_confirmation_code",
            Some("Look up a return"),
            schema.clone(),
        )])
        .remove(0);

        assert_eq!(
            def.to_function_spec(),
            json!({
                "type": "function",
                "function": {
                    "name": "get_return_by_confirmation_code",
                    "description": "Look up a return",
                    "parameters": schema
                }
            })
        );
    }

    #[tokio::test]
    async fn test_fetch_tools_swallows_failures() {
        let catalog = ToolCatalog::new(Arc::new(FixedProvider(Err(()))));
        assert!(catalog.fetch_tools().await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_tools_translates() {
        let catalog = ToolCatalog::new(Arc::new(FixedProvider(Ok(vec![tool(
            "lookup",
            Some("Look up a return"),
            empty_object_schema(),
        )]))));
        let defs = catalog.fetch_tools().await;
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "lookup");
    }
}
