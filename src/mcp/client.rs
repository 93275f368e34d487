//! JSON-RPC client for an MCP tool provider reachable over HTTP.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::{DiscoveryError, ProviderError, truncate_body};

use super::types::{
    CallToolParams, CallToolResult, ClientCapabilities, ClientInfo, DiscoveryParams,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, McpTool, RootsCapability,
};

/// Default JSON-RPC endpoint of the tool provider.
pub const DEFAULT_TOOL_PROVIDER_URL: &str = "http://localhost:53000/mcp";
/// MCP protocol revision announced in discovery requests.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";
/// Per-request timeout for discovery and invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations the orchestrator needs from a tool provider.
///
/// The production implementation is [`HttpToolProvider`]; tests substitute
/// in-process fakes.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Fetch the provider's tool catalog (`tools/list`).
    async fn list_tools(&self) -> Result<Vec<McpTool>, DiscoveryError>;

    /// Invoke one tool (`tools/call`).
    async fn call_tool(&self, name: &str, arguments: Value)
    -> Result<CallToolResult, ProviderError>;
}

/// Connection settings for the tool provider.
#[derive(Debug, Clone)]
pub struct ToolProviderSettings {
    /// JSON-RPC endpoint (e.g., `http://localhost:53000/mcp`).
    pub url: String,
    /// Bound on each discovery or invocation request.
    pub timeout: Duration,
    /// Protocol revision sent as `protocolVersion`.
    pub protocol_version: String,
    /// `clientInfo.name`.
    pub client_name: String,
    /// `clientInfo.version`.
    pub client_version: String,
    /// `capabilities.roots.listChanged`.
    pub list_changed: bool,
}

impl Default for ToolProviderSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_TOOL_PROVIDER_URL.to_string(),
            timeout: DEFAULT_TOOL_TIMEOUT,
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            client_name: "mcp".to_string(),
            client_version: "0.1.0".to_string(),
            list_changed: true,
        }
    }
}

/// Tool provider speaking JSON-RPC 2.0 over HTTP POST.
///
/// Cloning is cheap and clones share the connection pool and request-id
/// counter, so one instance can serve every concurrent turn.
#[derive(Clone)]
pub struct HttpToolProvider {
    http: reqwest::Client,
    settings: Arc<ToolProviderSettings>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for HttpToolProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpToolProvider")
            .field("settings", &self.settings)
            .finish()
    }
}

impl HttpToolProvider {
    pub fn new(settings: ToolProviderSettings) -> Self {
        Self::with_client(reqwest::Client::new(), settings)
    }

    /// Use an existing HTTP client (shared pool, custom TLS).
    pub fn with_client(http: reqwest::Client, settings: ToolProviderSettings) -> Self {
        Self {
            http,
            settings: Arc::new(settings),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn settings(&self) -> &ToolProviderSettings {
        &self.settings
    }

    /// Send one JSON-RPC request and return its `result`.
    async fn request<P: Serialize + Send + Sync>(
        &self,
        method: &str,
        params: P,
    ) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = JsonRpcRequest::new(id, method, params);

        tracing::debug!(
            rpc_id = id,
            method = %method,
            url = %self.settings.url,
            "Sending tool provider request"
        );

        let response = self
            .http
            .post(&self.settings.url)
            .timeout(self.settings.timeout)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let reply: JsonRpcResponse = serde_json::from_slice(&body)
            .map_err(|e| ProviderError::Malformed(format!("{method} reply is not JSON-RPC: {e}")))?;

        if let Some(err) = reply.error {
            return Err(ProviderError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        reply
            .result
            .ok_or_else(|| ProviderError::Malformed(format!("{method} reply has no result")))
    }

    fn transport_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.settings.timeout)
        } else {
            ProviderError::Transport(e)
        }
    }
}

#[async_trait]
impl ToolProvider for HttpToolProvider {
    async fn list_tools(&self) -> Result<Vec<McpTool>, DiscoveryError> {
        let params = DiscoveryParams {
            protocol_version: &self.settings.protocol_version,
            capabilities: ClientCapabilities {
                roots: RootsCapability {
                    list_changed: self.settings.list_changed,
                },
            },
            client_info: ClientInfo {
                name: &self.settings.client_name,
                version: &self.settings.client_version,
            },
        };

        let result = self.request("tools/list", params).await?;
        if result.get("tools").is_none() {
            return Err(DiscoveryError::MissingTools);
        }
        let parsed: ListToolsResult = serde_json::from_value(result)?;

        if parsed.next_cursor.is_some() {
            // One discovery request per turn; later pages are not fetched.
            tracing::debug!(
                tool_count = parsed.tools.len(),
                "tools/list returned a cursor, ignoring remaining pages"
            );
        }

        let tools = parsed
            .tools
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value::<McpTool>(entry) {
                Ok(tool) => Some(tool),
                Err(e) => {
                    tracing::warn!(index, error = %e, "Skipping undecodable tool entry");
                    None
                }
            })
            .collect();

        Ok(tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, ProviderError> {
        let result = self
            .request("tools/call", CallToolParams { name, arguments })
            .await?;
        serde_json::from_value(result)
            .map_err(|e| ProviderError::Malformed(format!("tools/call result: {e}")))
    }
}
