//! Stream Codec Module
//!
//! JSON encoding of subscribe commands and decoding of inbound text frames.
//!
//! Every inbound message is a single JSON object:
//! ```json
//! {"channel":"ticker","symbol":"USD_JPY","ask":"137.644","bid":"137.632","timestamp":"...","status":"OPEN"}
//! ```

use crate::domain::streaming::Frame;
use crate::domain::subscription::Subscription;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Valid JSON that is not an object.
    #[error("expected a JSON object, got: {0}")]
    NotAnObject(String),
}

/// JSON codec for the public and private streams.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encode the subscribe command for a subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode_subscribe(&self, subscription: &Subscription) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&subscription.to_command())?)
    }

    /// Decode a text frame into a `Frame`.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not JSON or not a JSON object.
    pub fn decode(&self, text: &str) -> Result<Frame, CodecError> {
        let value: serde_json::Value = serde_json::from_str(text.trim())?;
        Frame::try_from(value).map_err(|other| {
            let mut preview = other.to_string();
            if preview.len() > 50 {
                let mut cut = 50;
                while !preview.is_char_boundary(cut) {
                    cut -= 1;
                }
                preview.truncate(cut);
            }
            CodecError::NotAnObject(preview)
        })
    }
}
