//! Error handling for the conversation client
//!
//! Every server-facing failure falls into one of three buckets:
//!
//! - **Transport**: the request never produced a response (DNS, refused
//!   connection, reset, timeout)
//! - **Status**: the server answered with a non-2xx status
//! - **Malformed body**: the server answered 2xx but the body did not parse
//!
//! Callers treat all three the same way: log, show a short inline message,
//! and let the next poll tick or a manual retry recover.
//!
//! ```rust
//! use social_messages::{ClientError, Result};
//!
//! fn parse(body: &str) -> Result<serde_json::Value> {
//!     // serde_json errors convert automatically
//!     Ok(serde_json::from_str(body)?)
//! }
//!
//! assert!(matches!(parse("{"), Err(ClientError::MalformedBody(_))));
//! ```

use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while talking to the messaging endpoints
#[derive(Error, Debug)]
pub enum ClientError {
    /// Local I/O error (reading an attachment from disk, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Response body could not be decoded
    #[error("Malformed response body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    /// Request failed before a response arrived
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request timed out
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Server answered with a non-success status
    #[error("HTTP {status}: {url}")]
    Status {
        /// Status code returned by the server
        status: u16,
        /// URL that was requested
        url: String,
    },

    /// Send attempted with neither text nor attachment
    #[error("Message has no content and no attachment")]
    EmptyMessage,

    /// Client was configured with unusable settings
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Classify a reqwest error into the transport taxonomy
    pub fn from_reqwest(error: reqwest::Error, context: &str) -> Self {
        if error.is_timeout() {
            return ClientError::Timeout(format!("{}: {}", context, error));
        }

        if let Some(status) = error.status() {
            return ClientError::Status {
                status: status.as_u16(),
                url: error
                    .url()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| context.to_string()),
            };
        }

        if error.is_decode() {
            return ClientError::Transport(format!("{}: undecodable body ({})", context, error));
        }

        ClientError::Transport(format!("{}: {}", context, error))
    }

    /// Whether the next poll tick or a plain retry may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::Transport(_) | ClientError::Timeout(_) | ClientError::Io(_) => true,
            ClientError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Whether the user has to change something before retrying
    pub fn requires_user_action(&self) -> bool {
        match self {
            ClientError::EmptyMessage | ClientError::Configuration(_) => true,
            ClientError::Status { status, .. } => matches!(status, 401 | 403),
            _ => false,
        }
    }

    /// Short message suitable for an inline notice
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Transport(_) => {
                "Could not reach the server. Check your connection.".to_string()
            }
            ClientError::Timeout(_) => "The server took too long to answer.".to_string(),
            ClientError::Status { status: 401, .. } | ClientError::Status { status: 403, .. } => {
                "Your session has expired. Please sign in again.".to_string()
            }
            ClientError::Status { status: 404, .. } => {
                "This conversation is no longer available.".to_string()
            }
            ClientError::Status { status, .. } => {
                format!("The server returned an error ({}).", status)
            }
            ClientError::MalformedBody(_) => {
                "The server sent an unexpected response.".to_string()
            }
            ClientError::EmptyMessage => "Type a message or attach a file first.".to_string(),
            ClientError::Configuration(msg) => {
                format!("Configuration error: {}. Check your settings.", msg)
            }
            ClientError::Io(e) => format!("I/O error: {}.", e),
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        ClientError::Configuration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ClientError::Status {
            status: 404,
            url: "http://localhost/conversation/1/messages/".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "HTTP 404: http://localhost/conversation/1/messages/"
        );

        let error = ClientError::EmptyMessage;
        assert_eq!(error.to_string(), "Message has no content and no attachment");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>(r#"{"messages": ["#).unwrap_err();
        let error: ClientError = json_error.into();
        assert!(matches!(error, ClientError::MalformedBody(_)));
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(ClientError::Transport("refused".into()).is_recoverable());
        assert!(ClientError::Timeout("slow".into()).is_recoverable());
        assert!(ClientError::Status { status: 502, url: String::new() }.is_recoverable());
        assert!(!ClientError::Status { status: 404, url: String::new() }.is_recoverable());
        assert!(!ClientError::EmptyMessage.is_recoverable());
    }

    #[test]
    fn test_user_action_classification() {
        assert!(ClientError::Status { status: 403, url: String::new() }.requires_user_action());
        assert!(ClientError::configuration("missing base url").requires_user_action());
        assert!(!ClientError::Transport("reset".into()).requires_user_action());
    }

    #[test]
    fn test_user_messages() {
        let message = ClientError::Status { status: 401, url: String::new() }.user_message();
        assert!(message.contains("sign in"));

        let message = ClientError::Status { status: 500, url: String::new() }.user_message();
        assert!(message.contains("500"));
    }
}
