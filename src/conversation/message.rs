//! Transcript entries.
//!
//! [`Message`] is a closed union over the four roles the completion service
//! understands. Each variant carries only the fields valid for that role, and
//! both the constructors and deserialization reject shapes the service would
//! refuse (for example an assistant message with neither text nor tool calls).
//!
//! The serialized form is the Chat Completions wire form, so a transcript can be
//! handed to the caller and fed back on the next turn unchanged.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System directive.
    System,
    /// End user.
    User,
    /// Completion service.
    Assistant,
    /// Tool result.
    Tool,
}

impl MessageRole {
    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message shape that no role accepts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("{role} message requires text content")]
    MissingContent { role: MessageRole },
    #[error("assistant message must carry content or tool calls")]
    EmptyAssistant,
    #[error("tool message requires a tool_call_id")]
    MissingToolCallId,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        /// Null when the message only requests tools.
        content: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Plain assistant reply.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Assistant message requesting tools. `content` may be absent only when
    /// at least one tool call is present.
    pub fn assistant_with_tool_calls(
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Result<Self, MessageError> {
        if content.is_none() && tool_calls.is_empty() {
            return Err(MessageError::EmptyAssistant);
        }
        Ok(Self::Assistant {
            content,
            tool_calls,
        })
    }

    pub fn role(&self) -> MessageRole {
        match self {
            Self::System { .. } => MessageRole::System,
            Self::User { .. } => MessageRole::User,
            Self::Assistant { .. } => MessageRole::Assistant,
            Self::Tool { .. } => MessageRole::Tool,
        }
    }

    /// Text content, if the message has any.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::System { content } | Self::User { content } | Self::Tool { content, .. } => {
                Some(content)
            }
            Self::Assistant { content, .. } => content.as_deref(),
        }
    }

    /// Tool calls requested by an assistant message; empty for every other role.
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }
}

impl From<ToolCallResult> for Message {
    fn from(result: ToolCallResult) -> Self {
        Self::Tool {
            tool_call_id: result.tool_call_id,
            name: result.name,
            content: result.content,
        }
    }
}

/// Loose wire shape; validated into [`Message`] on the way in.
#[derive(Deserialize)]
struct WireMessage {
    role: MessageRole,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(default)]
    tool_call_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl TryFrom<WireMessage> for Message {
    type Error = MessageError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        match wire.role {
            MessageRole::System => wire
                .content
                .map(Message::system)
                .ok_or(MessageError::MissingContent {
                    role: MessageRole::System,
                }),
            MessageRole::User => wire
                .content
                .map(Message::user)
                .ok_or(MessageError::MissingContent {
                    role: MessageRole::User,
                }),
            MessageRole::Assistant => {
                Message::assistant_with_tool_calls(wire.content, wire.tool_calls.unwrap_or_default())
            }
            MessageRole::Tool => {
                let tool_call_id = wire
                    .tool_call_id
                    .filter(|id| !id.is_empty())
                    .ok_or(MessageError::MissingToolCallId)?;
                let content = wire.content.ok_or(MessageError::MissingContent {
                    role: MessageRole::Tool,
                })?;
                Ok(Message::Tool {
                    tool_call_id,
                    name: wire.name.unwrap_or_default(),
                    content,
                })
            }
        }
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = WireMessage::deserialize(deserializer)?;
        Message::try_from(wire).map_err(serde::de::Error::custom)
    }
}

/// Arguments attached to a tool call by the completion service.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArguments {
    /// A JSON object, ready to send to the provider.
    Parsed(Value),
    /// Text that did not decode to a JSON object. Kept verbatim so the
    /// transcript still shows what the service asked for.
    Malformed { raw: String, reason: String },
}

impl ToolArguments {
    /// Decode the service's argument text. Blank text means "no arguments".
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::Parsed(Value::Object(serde_json::Map::new()));
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from_value(value, raw),
            Err(e) => Self::Malformed {
                raw: raw.to_string(),
                reason: e.to_string(),
            },
        }
    }

    fn from_value(value: Value, raw: &str) -> Self {
        if value.is_object() {
            Self::Parsed(value)
        } else {
            Self::Malformed {
                raw: raw.to_string(),
                reason: "expected a JSON object".to_string(),
            }
        }
    }

    /// Argument text in wire form.
    pub fn to_wire_string(&self) -> String {
        match self {
            Self::Parsed(value) => value.to_string(),
            Self::Malformed { raw, .. } => raw.clone(),
        }
    }
}

/// A tool invocation requested inside an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireToolCall", into = "WireToolCall")]
pub struct ToolCallRequest {
    pub id: String,
    pub tool_name: String,
    pub arguments: ToolArguments,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        let raw = arguments.to_string();
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments: ToolArguments::from_value(arguments, &raw),
        }
    }

    /// Build from the raw argument text the completion service sent.
    pub fn from_raw(id: impl Into<String>, tool_name: impl Into<String>, raw: &str) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments: ToolArguments::parse(raw),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunction,
}

#[derive(Clone, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    /// A JSON string on the wire; some services send the object directly.
    #[serde(default)]
    arguments: Value,
}

fn function_type() -> String {
    "function".to_string()
}

impl From<WireToolCall> for ToolCallRequest {
    fn from(wire: WireToolCall) -> Self {
        let arguments = match wire.function.arguments {
            Value::String(raw) => ToolArguments::parse(&raw),
            Value::Null => ToolArguments::parse(""),
            other => {
                let raw = other.to_string();
                ToolArguments::from_value(other, &raw)
            }
        };
        Self {
            id: wire.id,
            tool_name: wire.function.name,
            arguments,
        }
    }
}

impl From<ToolCallRequest> for WireToolCall {
    fn from(call: ToolCallRequest) -> Self {
        Self {
            id: call.id,
            call_type: function_type(),
            function: WireFunction {
                name: call.tool_name,
                arguments: Value::String(call.arguments.to_wire_string()),
            },
        }
    }
}

/// Outcome of one tool invocation, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool_call_id: String,
    pub name: String,
    /// Serialized success payload, or diagnostic text beginning with `Error:`.
    pub content: String,
}

impl ToolCallResult {
    pub fn success(call: &ToolCallRequest, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.tool_name.clone(),
            content: content.into(),
        }
    }

    pub fn failure(call: &ToolCallRequest, error: &impl std::fmt::Display) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.tool_name.clone(),
            content: format!("Error: {error}"),
        }
    }

    pub fn is_error(&self) -> bool {
        self.content.starts_with("Error:")
    }
}
