use std::sync::Arc;

use futures::future::join_all;

use crate::conversation::{ToolArguments, ToolCallRequest, ToolCallResult};
use crate::error::ToolError;

use super::client::ToolProvider;

/// Executes tool calls against the provider and turns every outcome into a
/// [`ToolCallResult`]. Failures never escape; they become `Error:` content.
#[derive(Clone)]
pub struct ToolBridge {
    provider: Arc<dyn ToolProvider>,
}

impl std::fmt::Debug for ToolBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolBridge").finish_non_exhaustive()
    }
}

impl ToolBridge {
    pub fn new(provider: Arc<dyn ToolProvider>) -> Self {
        Self { provider }
    }

    /// Run one tool call.
    pub async fn invoke(&self, call: &ToolCallRequest) -> ToolCallResult {
        match self.try_invoke(call).await {
            Ok(content) => {
                tracing::debug!(
                    tool = %call.tool_name,
                    tool_call_id = %call.id,
                    "Tool call succeeded"
                );
                ToolCallResult::success(call, content)
            }
            Err(e) => {
                tracing::warn!(
                    tool = %call.tool_name,
                    tool_call_id = %call.id,
                    error = %e,
                    "Tool call failed"
                );
                ToolCallResult::failure(call, &e)
            }
        }
    }

    async fn try_invoke(&self, call: &ToolCallRequest) -> Result<String, ToolError> {
        let arguments = match &call.arguments {
            ToolArguments::Parsed(value) => value.clone(),
            ToolArguments::Malformed { reason, .. } => {
                return Err(ToolError::InvalidArguments {
                    tool: call.tool_name.clone(),
                    reason: reason.clone(),
                });
            }
        };

        let result = self
            .provider
            .call_tool(&call.tool_name, arguments)
            .await
            .map_err(|source| ToolError::Provider {
                tool: call.tool_name.clone(),
                source,
            })?;

        if result.is_error {
            return Err(ToolError::Reported {
                tool: call.tool_name.clone(),
                message: result.text(),
            });
        }

        Ok(serde_json::to_string(&result).unwrap_or_else(|_| result.text()))
    }

    /// Run a batch of tool calls. Results come back in request order whether
    /// the calls ran concurrently or one after another.
    pub async fn invoke_all(&self, calls: &[ToolCallRequest], parallel: bool) -> Vec<ToolCallResult> {
        if parallel {
            join_all(calls.iter().map(|call| self.invoke(call))).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.invoke(call).await);
            }
            results
        }
    }
}
