//! Provider error types and HTTP status classification shared by the
//! HTTP-backed providers.

pub use studyquiz_core::error::ProviderError;

/// Seconds to wait when a 429 carries no usable `retry-after`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Map a transport failure to a `ProviderError`.
pub(crate) fn send_error(err: reqwest::Error, timeout_secs: u64) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout_secs)
    } else {
        ProviderError::NetworkError(err.to_string())
    }
}

/// Pass successful responses through and classify the rest.
///
/// `api_message` pulls the human-readable message out of the provider's
/// error body, if it has the provider's shape.
pub(crate) async fn check_status(
    response: reqwest::Response,
    model: &str,
    api_message: fn(&str) -> Option<String>,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    if status < 400 {
        return Ok(response);
    }

    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
            * 1000;
        return Err(ProviderError::RateLimited {
            retry_after_ms: retry_after,
        });
    }

    let body = response.text().await.unwrap_or_default();
    let message = api_message(&body).unwrap_or(body);
    Err(match status {
        401 | 403 => ProviderError::AuthenticationFailed(message),
        404 => ProviderError::ModelNotFound(model.to_string()),
        _ => ProviderError::ApiError { status, message },
    })
}

/// Failure to decode a 2xx body.
pub(crate) fn decode_error(err: reqwest::Error) -> ProviderError {
    ProviderError::ApiError {
        status: 0,
        message: format!("failed to parse response: {err}"),
    }
}
