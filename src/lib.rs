//! Returns concierge
//!
//! A tool-augmented conversation orchestrator. Each turn takes the caller's
//! transcript and a new user message, lets a chat completion service decide
//! whether to call tools exposed by an MCP tool provider, runs those tools,
//! and returns the reply together with the extended transcript.
//!
//! # Architecture
//!
//! - **Conversation**: Closed message model and caller-owned transcripts
//! - **MCP Client**: JSON-RPC tool discovery and invocation over HTTP
//! - **LLM**: Chat Completions client, retry policy and the turn orchestrator
//!
//! # Modules
//!
//! - [`conversation`]: Messages, transcripts and the system directive
//! - [`mcp`]: Tool provider client, catalog resolver and invocation bridge
//! - [`llm`]: Completion client and [`llm::Orchestrator`]
//! - [`config`]: Layered configuration (defaults, YAML file, env, CLI)
//! - [`error`]: Typed errors for each collaborator

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod mcp;
