//! Model Context Protocol (MCP) tool provider integration.
//!
//! The tool provider is a JSON-RPC 2.0 endpoint reached over HTTP POST. It
//! exposes two methods:
//!
//! - `tools/list`: the catalog, translated into function definitions by
//!   [`ToolCatalog`]
//! - `tools/call`: a single invocation, wrapped by [`ToolBridge`]
//!
//! # Configuration
//!
//! The endpoint defaults to `http://localhost:53000/mcp` and can be changed
//! through the `tool_provider` config section:
//!
//! ```yaml
//! tool_provider:
//!   url: http://localhost:53000/mcp
//!   timeout_secs: 30
//! ```

pub mod bridge;
pub mod catalog;
pub mod client;
pub mod types;

pub use bridge::ToolBridge;
pub use catalog::{ToolCatalog, ToolDefinition, translate_tools};
pub use client::{HttpToolProvider, ToolProvider, ToolProviderSettings};
pub use types::{CallToolResult, McpTool};
