//! GMO API Errors

use thiserror::Error;

use crate::application::ports::TokenError;

/// Request parameter rule violations, detected before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Two parameters that cannot be combined were both set.
    #[error("{first} and {second} cannot be set together")]
    MutuallyExclusive {
        /// First parameter name.
        first: &'static str,
        /// Second parameter name.
        second: &'static str,
    },

    /// None of a set of alternatives was provided.
    #[error("at least one of {} is required", .0.join(", "))]
    MissingOneOf(&'static [&'static str]),

    /// A parameter required by another parameter's value is missing.
    #[error("{field} is required when {condition}")]
    MissingField {
        /// Missing parameter name.
        field: &'static str,
        /// The condition that makes it required.
        condition: &'static str,
    },
}

/// Errors from GMO REST calls.
#[derive(Debug, Error)]
pub enum GmoError {
    /// Request parameters were rejected locally.
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// HTTP 429 from the server.
    #[error("rate limited by server")]
    RateLimited,

    /// The envelope carried a non-zero status.
    #[error("API error (status {status}): {}", format_messages(.messages))]
    Api {
        /// Envelope status code.
        status: i64,
        /// Server message codes and texts.
        messages: Vec<ApiMessage>,
    },

    /// The envelope carried no `data`.
    #[error("response did not contain data")]
    MissingData,

    /// The response body was not the expected JSON.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Transport failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API secret could not key the signer.
    #[error("invalid API secret")]
    InvalidSecret,
}

/// One entry of an error envelope's `messages` array.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ApiMessage {
    /// Server error code, e.g. `ERR-5201`.
    #[serde(rename = "message_code", default)]
    pub code: String,
    /// Human-readable message.
    #[serde(rename = "message_string", default)]
    pub message: String,
}

fn format_messages(messages: &[ApiMessage]) -> String {
    if messages.is_empty() {
        return "no message".to_string();
    }
    messages
        .iter()
        .map(|m| format!("{}: {}", m.code, m.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<GmoError> for TokenError {
    fn from(err: GmoError) -> Self {
        Self::Request(err.to_string())
    }
}
