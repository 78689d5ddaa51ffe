//! HTTP transport for the GMO REST API.
//!
//! Every response is wrapped in an envelope:
//!
//! ```json
//! {"status": 0, "data": ..., "responsetime": "2019-03-19T02:15:06.102Z"}
//! {"status": 5, "messages": [{"message_code": "ERR-5201", "message_string": "..."}]}
//! ```
//!
//! Calls are single-shot. Retrying is left to the caller.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{ApiMessage, GmoError};
use super::signer::AuthHeaders;

/// Maximum response body length kept in error values.
const MAX_ERROR_BODY: usize = 512;

/// Response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    /// `0` on success.
    pub status: i64,
    /// Payload, absent on most errors and on some acknowledgements.
    pub data: Option<T>,
    /// Error details.
    #[serde(default)]
    pub messages: Vec<ApiMessage>,
    /// Server response time.
    #[serde(default)]
    pub responsetime: Option<String>,
}

impl<T> Envelope<T> {
    /// Take the payload, failing if absent.
    pub fn into_data(self) -> Result<T, GmoError> {
        self.data.ok_or(GmoError::MissingData)
    }
}

/// Thin `reqwest` wrapper bound to one base URL.
#[derive(Debug, Clone)]
pub struct GmoHttpClient {
    client: Client,
    base_url: String,
}

impl GmoHttpClient {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GmoError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Unsigned GET used by public endpoints.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Envelope<T>, GmoError> {
        let request = self.client.get(self.url(path)).query(query);
        Self::execute(Method::GET, path, request).await
    }

    /// Signed request used by private endpoints.
    ///
    /// `body` is sent verbatim as JSON and must be the text that was signed.
    pub async fn send_signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<String>,
        auth: &AuthHeaders,
    ) -> Result<Envelope<T>, GmoError> {
        let mut request = self.client.request(method.clone(), self.url(path));
        for (name, value) in auth.pairs() {
            request = request.header(name, value);
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }
        Self::execute(method, path, request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn execute<T: DeserializeOwned>(
        method: Method,
        path: &str,
        request: RequestBuilder,
    ) -> Result<Envelope<T>, GmoError> {
        tracing::debug!(%method, path, "Sending REST request");

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::warn!(%method, path, status = status.as_u16(), "REST request failed");
            return Err(http_error(status, text));
        }

        parse_envelope(&text)
    }
}

/// Parse an envelope, mapping a non-zero status to `GmoError::Api`.
pub fn parse_envelope<T: DeserializeOwned>(text: &str) -> Result<Envelope<T>, GmoError> {
    let raw: Envelope<Value> = serde_json::from_str(text)?;
    if raw.status != 0 {
        return Err(GmoError::Api {
            status: raw.status,
            messages: raw.messages,
        });
    }
    let data = raw.data.map(serde_json::from_value).transpose()?;
    Ok(Envelope {
        status: raw.status,
        data,
        messages: raw.messages,
        responsetime: raw.responsetime,
    })
}

fn http_error(status: StatusCode, mut body: String) -> GmoError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return GmoError::RateLimited;
    }
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    GmoError::Http {
        status: status.as_u16(),
        body,
    }
}
