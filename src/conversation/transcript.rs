//! Transcript management.
//!
//! A [`Transcript`] is the caller-owned, append-only message sequence for one
//! conversation. Every operation consumes the transcript and returns the next
//! one; nothing here holds state between turns.

use serde::{Deserialize, Serialize};

use super::message::{Message, MessageError, ToolCallRequest, ToolCallResult};

/// Canonical system directive for the returns-status assistant.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a customer service expert for 'Happy Returns'. \
Your sole responsibility is to provide information about the status of customer returns. \
You have access to tools that can look up return information when a customer provides a confirmation code. \
Always use the get_return_by_confirmation_code tool when a customer mentions their confirmation code (an 8-character string starting with 'HR'). \
You must not answer any questions or engage in conversations on any other topic. \
If a customer asks about something other than a return status, \
politely state that you can only help with return status inquiries. \
Be courteous and professional in all your responses.";

/// Version label for [`DEFAULT_SYSTEM_PROMPT`].
pub const DEFAULT_DIRECTIVE_VERSION: &str = "returns-status/1";

/// The system message every transcript starts with.
///
/// The version label only shows up in logs; transcripts are compared on
/// content so that seeding stays idempotent for callers that strip unknown
/// fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemDirective {
    version: String,
    text: String,
}

impl SystemDirective {
    pub fn new(version: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            text: text.into(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn message(&self) -> Message {
        Message::system(self.text.clone())
    }
}

impl Default for SystemDirective {
    fn default() -> Self {
        Self::new(DEFAULT_DIRECTIVE_VERSION, DEFAULT_SYSTEM_PROMPT)
    }
}

/// Ordered message sequence for one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Caller-supplied id used to correlate logs across turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(default)]
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            correlation_id: None,
            messages,
        }
    }

    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Text of the most recent assistant message that has any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find_map(|m| match m {
                Message::Assistant { content, .. } => content.as_deref(),
                _ => None,
            })
    }

    /// Put `directive` at index 0.
    ///
    /// A missing system message is prepended; a system message with different
    /// text is replaced. `seed(seed(t)) == seed(t)`.
    #[must_use]
    pub fn seed(mut self, directive: &SystemDirective) -> Self {
        let stale = match self.messages.first() {
            Some(Message::System { content }) => Some(content != directive.text()),
            _ => None,
        };

        match stale {
            Some(false) => {}
            Some(true) => {
                tracing::debug!(
                    correlation_id = ?self.correlation_id,
                    directive_version = %directive.version(),
                    "Replacing stale system directive"
                );
                self.messages[0] = directive.message();
            }
            None => self.messages.insert(0, directive.message()),
        }
        self
    }

    #[must_use]
    pub fn append_user(self, text: impl Into<String>) -> Self {
        self.push(Message::user(text))
    }

    #[must_use]
    pub fn append_assistant(self, text: impl Into<String>) -> Self {
        self.push(Message::assistant(text))
    }

    /// Append an assistant message that requests tools.
    pub fn append_tool_calls(
        self,
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Result<Self, MessageError> {
        let message = Message::assistant_with_tool_calls(content, tool_calls)?;
        Ok(self.push(message))
    }

    #[must_use]
    pub fn append_tool_result(self, result: ToolCallResult) -> Self {
        self.push(result.into())
    }

    fn push(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }
}

impl From<Vec<Message>> for Transcript {
    fn from(messages: Vec<Message>) -> Self {
        Self::from_messages(messages)
    }
}
