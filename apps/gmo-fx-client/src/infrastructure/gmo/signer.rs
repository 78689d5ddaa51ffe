//! Request Signing
//!
//! Private REST calls carry three headers:
//!
//! - `API-KEY`: the account's API key
//! - `API-TIMESTAMP`: Unix epoch milliseconds
//! - `API-SIGN`: lowercase hex HMAC-SHA256 over `timestamp + method + path + body`
//!
//! The body is omitted from the signed text for GET requests. For every other
//! method the signed body must be byte-identical to the body sent on the wire.

use std::fmt;

use hmac::{Hmac, Mac};
use reqwest::Method;
use sha2::Sha256;

use crate::infrastructure::config::Credentials;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the API key.
pub const HEADER_API_KEY: &str = "API-KEY";
/// Header carrying the request timestamp.
pub const HEADER_API_TIMESTAMP: &str = "API-TIMESTAMP";
/// Header carrying the request signature.
pub const HEADER_API_SIGN: &str = "API-SIGN";

/// Authentication headers for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    /// `API-KEY` value.
    pub api_key: String,
    /// `API-TIMESTAMP` value.
    pub timestamp: String,
    /// `API-SIGN` value.
    pub signature: String,
}

impl AuthHeaders {
    /// Header name/value pairs in sending order.
    #[must_use]
    pub fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            (HEADER_API_KEY, self.api_key.as_str()),
            (HEADER_API_TIMESTAMP, self.timestamp.as_str()),
            (HEADER_API_SIGN, self.signature.as_str()),
        ]
    }
}

/// Produces authentication headers for private REST calls.
#[derive(Clone)]
pub struct RequestSigner {
    api_key: String,
    mac: HmacSha256,
}

impl RequestSigner {
    /// Create a signer from API credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret cannot key an HMAC.
    pub fn new(credentials: &Credentials) -> Result<Self, hmac::digest::InvalidLength> {
        let mac = HmacSha256::new_from_slice(credentials.api_secret().as_bytes())?;
        Ok(Self {
            api_key: credentials.api_key().to_string(),
            mac,
        })
    }

    /// Compute the signature for a request.
    #[must_use]
    pub fn sign(&self, timestamp: &str, method: &Method, path: &str, body: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(timestamp.as_bytes());
        mac.update(method.as_str().as_bytes());
        mac.update(path.as_bytes());
        if *method != Method::GET {
            mac.update(body.as_bytes());
        }
        hex::encode(mac.finalize().into_bytes())
    }

    /// Build headers for a request using the current time.
    #[must_use]
    pub fn headers(&self, method: &Method, path: &str, body: &str) -> AuthHeaders {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        self.headers_at(timestamp, method, path, body)
    }

    /// Build headers for a request at a fixed timestamp.
    #[must_use]
    pub fn headers_at(
        &self,
        timestamp: String,
        method: &Method,
        path: &str,
        body: &str,
    ) -> AuthHeaders {
        let signature = self.sign(&timestamp, method, path, body);
        AuthHeaders {
            api_key: self.api_key.clone(),
            timestamp,
            signature,
        }
    }
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> RequestSigner {
        let creds = Credentials::new("key".to_string(), "secret".to_string());
        RequestSigner::new(&creds).unwrap()
    }

    fn reference(text: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(text.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn get_signature_ignores_body() {
        let s = signer();
        let with_body = s.sign("1700000000000", &Method::GET, "/v1/orders", "{\"x\":1}");
        let without = s.sign("1700000000000", &Method::GET, "/v1/orders", "");
        assert_eq!(with_body, without);
        assert_eq!(without, reference("1700000000000GET/v1/orders"));
    }

    #[test]
    fn post_signature_covers_body() {
        let s = signer();
        let body = r#"{"symbol":"USD_JPY"}"#;
        let sig = s.sign("1700000000000", &Method::POST, "/v1/order", body);
        assert_eq!(sig, reference(&format!("1700000000000POST/v1/order{body}")));
    }

    #[test]
    fn signature_is_lowercase_hex() {
        let sig = signer().sign("1", &Method::DELETE, "/v1/ws-auth", "{}");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn headers_carry_key_and_timestamp() {
        let headers = signer().headers_at("42".to_string(), &Method::PUT, "/v1/ws-auth", "{}");
        assert_eq!(headers.api_key, "key");
        assert_eq!(headers.timestamp, "42");
        let names: Vec<_> = headers.pairs().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, [HEADER_API_KEY, HEADER_API_TIMESTAMP, HEADER_API_SIGN]);
    }

    #[test]
    fn debug_redacts_key() {
        let debug = format!("{:?}", signer());
        assert!(!debug.contains("key\""));
        assert!(debug.contains("REDACTED"));
    }
}
