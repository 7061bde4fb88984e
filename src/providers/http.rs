//! HTTP plumbing shared by the vendor adapters.

use std::time::Duration;

use reqwest::{Client, Response};

use crate::{MuninnError, Result};

/// Upper bound on establishing a connection. Whole-call deadlines are
/// enforced by the router, not by the client.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest provider error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Build the shared HTTP client.
pub fn client() -> Client {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Map a non-success response to the matching error.
///
/// Consumes the response so the error body can be read; returns it
/// untouched when the status is a success.
pub async fn check_status(response: Response, provider: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        401 | 403 => Err(MuninnError::AuthenticationFailed),
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(MuninnError::RateLimited { retry_after })
        }
        code => {
            let body = response.text().await.unwrap_or_default();
            let mut message = format!("{provider} API error: {status}");
            if !body.is_empty() {
                message.push_str(": ");
                message.extend(body.chars().take(MAX_ERROR_BODY));
            }
            Err(MuninnError::Api {
                status: code,
                message,
            })
        }
    }
}

/// Decode a JSON body, reporting failures as malformed responses.
pub async fn json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| MuninnError::MalformedResponse(e.to_string()))
}

/// Map a transport error.
pub fn transport(err: reqwest::Error) -> MuninnError {
    MuninnError::Http(err.to_string())
}
