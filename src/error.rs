//! Error types for the orchestrator's collaborators.
//!
//! None of these cross [`Orchestrator::respond`](crate::llm::Orchestrator::respond):
//! discovery failures degrade to an empty tool list, tool failures become
//! tool-result messages, and completion failures become the fallback reply.

use std::time::Duration;

use thiserror::Error;

/// Transport and protocol failures talking to the tool provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The request did not finish within the per-call timeout.
    #[error("tool provider request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection or body-level failure.
    #[error("tool provider transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("tool provider returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated for logging.
        body: String,
    },

    /// JSON-RPC error envelope.
    #[error("tool provider error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message reported by the provider.
        message: String,
    },

    /// The reply was not a JSON-RPC response we understand.
    #[error("malformed tool provider reply: {0}")]
    Malformed(String),
}

/// Tool catalog discovery failed. Always absorbed by the catalog resolver.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("tools/list failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("tools/list reply is missing result.tools")]
    MissingTools,

    #[error("tools/list reply could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A single tool invocation failed. Always converted into a tool-result message.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The completion service produced arguments that are not a JSON object.
    #[error("invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments {
        /// Requested tool name.
        tool: String,
        /// Why the arguments were rejected.
        reason: String,
    },

    /// The provider could not be reached or answered with an error envelope.
    #[error("tool '{tool}' failed: {source}")]
    Provider {
        /// Requested tool name.
        tool: String,
        /// Underlying protocol failure.
        #[source]
        source: ProviderError,
    },

    /// The provider ran the tool and flagged the result as an error.
    #[error("tool '{tool}' reported an error: {message}")]
    Reported {
        /// Requested tool name.
        tool: String,
        /// Text content of the failed result.
        message: String,
    },
}

/// The completion service could not produce a usable reply.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("completion request timed out after {0:?}")]
    Timeout(Duration),

    #[error("completion transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("completion service returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated for logging.
        body: String,
        /// `Retry-After` hint, when the service sent one.
        retry_after: Option<Duration>,
    },

    /// The body carried an `error` object instead of choices.
    #[error("completion service error: {0}")]
    Api(String),

    /// The body lacked `choices[0].message` or had neither content nor tool calls.
    #[error("malformed completion reply: {0}")]
    Malformed(String),
}

impl CompletionError {
    /// Whether repeating the same request could reasonably succeed.
    ///
    /// Rate limits, server errors and transport failures are transient;
    /// client errors and malformed replies are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Api(_) | Self::Malformed(_) => false,
        }
    }

    /// Server-provided delay hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

const MAX_LOGGED_BODY: usize = 512;

/// Cut an upstream response body down to something safe to log.
pub(crate) fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_LOGGED_BODY {
        let mut end = MAX_LOGGED_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    body
}

/// Why a turn took the fallback path.
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("first completion failed: {0}")]
    FirstCompletion(#[source] CompletionError),

    #[error("final completion failed: {0}")]
    FinalCompletion(#[source] CompletionError),

    #[error("turn exceeded {0:?}")]
    TimedOut(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_retryability() {
        let rate_limited = CompletionError::Status {
            status: 429,
            body: String::new(),
            retry_after: Some(Duration::from_secs(2)),
        };
        assert!(rate_limited.is_retryable());
        assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(2)));

        let unavailable = CompletionError::Status {
            status: 503,
            body: String::new(),
            retry_after: None,
        };
        assert!(unavailable.is_retryable());

        let unauthorized = CompletionError::Status {
            status: 401,
            body: "bad key".to_string(),
            retry_after: None,
        };
        assert!(!unauthorized.is_retryable());
    }

    #[test]
    fn test_malformed_is_not_retryable() {
        assert!(!CompletionError::Malformed("no choices".into()).is_retryable());
        assert!(!CompletionError::Api("context_length_exceeded".into()).is_retryable());
        assert!(CompletionError::Timeout(Duration::from_secs(60)).is_retryable());
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "é".repeat(400);
        let cut = truncate_body(body);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= MAX_LOGGED_BODY + 3);

        assert_eq!(truncate_body("short".to_string()), "short");
    }

    #[test]
    fn test_tool_error_messages_name_the_tool() {
        let err = ToolError::Provider {
            tool: "get_return_by_confirmation_code".to_string(),
            source: ProviderError::Rpc {
                code: -32602,
                message: "missing confirmation_code".to_string(),
            },
        };
        let text = err.to_string();
        assert!(text.contains("get_return_by_confirmation_code"));
        assert!(text.contains("missing confirmation_code"));
    }
}
