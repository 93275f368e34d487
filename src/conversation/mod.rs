//! Conversation transcripts.
//!
//! This module owns the message model and the rules every transcript obeys.
//! Transcripts are supplied by the caller on each turn and handed back
//! afterwards; the crate keeps no conversation state of its own.
//!
//! # Architecture
//!
//! - [`Message`]: One transcript entry, a closed union over the four roles
//! - [`Transcript`]: Ordered, append-only message sequence
//! - [`SystemDirective`]: The canonical system message placed at index 0
//!
//! # Example
//!
//! ```rust
//! use returns_concierge::conversation::{SystemDirective, Transcript};
//!
//! let directive = SystemDirective::default();
//! let transcript = Transcript::new().seed(&directive).append_user("Hello!");
//!
//! assert_eq!(transcript.len(), 2);
//! assert_eq!(transcript.clone().seed(&directive), transcript);
//! ```

mod message;
mod transcript;

pub use message::{
    Message, MessageError, MessageRole, ToolArguments, ToolCallRequest, ToolCallResult,
};
pub use transcript::{
    DEFAULT_DIRECTIVE_VERSION, DEFAULT_SYSTEM_PROMPT, SystemDirective, Transcript,
};
