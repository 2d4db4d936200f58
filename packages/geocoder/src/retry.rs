//! HTTP retry helper for transient geocoder failures.
//!
//! Provider calls go through [`send_json`] instead of calling
//! `reqwest::RequestBuilder::send()` directly, so that timeouts, connection
//! resets, HTTP 429 and HTTP 5xx responses are retried with exponential
//! backoff. A well-formed "no match" response is never retried; that is
//! decided by the caller after the body has been parsed.
//!
//! ```ignore
//! let body = retry::send_json(|| client.get(&url).query(&params), policy).await?;
//! ```

use std::time::Duration;

use crate::GeocodeError;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Bounded exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub const NONE: Self = Self {
        max_retries: 0,
        base_delay: Duration::ZERO,
    };

    /// Returns the delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor)
    }
}

/// Sends an HTTP request and parses the response body as JSON.
///
/// `build_request` is called once per attempt because a
/// [`reqwest::RequestBuilder`] is consumed by `send()`.
///
/// Retries on connection errors, timeouts, HTTP 429, HTTP 5xx, unreadable
/// bodies and bodies that fail to parse as JSON. HTTP 4xx other than 429
/// is returned immediately.
///
/// # Errors
///
/// * [`GeocodeError::Http`] for a transport failure that persisted through
///   every retry, or a non-transient transport failure.
/// * [`GeocodeError::RateLimited`] if the provider kept answering 429.
/// * [`GeocodeError::Status`] for a non-retryable status, or a 5xx that
///   persisted through every retry.
/// * [`GeocodeError::Parse`] if the body never parsed as JSON.
pub async fn send_json<F>(
    build_request: F,
    policy: RetryPolicy,
) -> Result<serde_json::Value, GeocodeError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = policy.delay_for(attempt);
            log::warn!(
                "  retry {attempt}/{} in {delay:?}...",
                policy.max_retries
            );
            tokio::time::sleep(delay).await;
        }

        let can_retry = attempt < policy.max_retries;
        attempt += 1;

        let response = match build_request().send().await {
            Ok(response) => response,
            Err(e) => {
                if is_transient(&e) && can_retry {
                    log::warn!("  transient error: {e}");
                    continue;
                }
                return Err(GeocodeError::Http(e));
            }
        };

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            if can_retry {
                log::warn!("  HTTP 429 (rate limited)");
                continue;
            }
            return Err(GeocodeError::RateLimited);
        }

        if status.is_server_error() {
            if can_retry {
                log::warn!("  HTTP {status} (server error)");
                continue;
            }
            return Err(GeocodeError::Status {
                status: status.as_u16(),
            });
        }

        if status.is_client_error() {
            return Err(GeocodeError::Status {
                status: status.as_u16(),
            });
        }

        let url = response.url().to_string();

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                if can_retry {
                    log::warn!("Response body read failed for {url}: {e}");
                    continue;
                }
                return Err(GeocodeError::Http(e));
            }
        };

        match serde_json::from_str(&text) {
            Ok(value) => return Ok(value),
            Err(json_err) => {
                let preview = preview(&text);
                if can_retry {
                    log::warn!(
                        "JSON parse failed, re-fetching...\n  \
                         url: {url}\n  \
                         status: {status}\n  \
                         parse error: {json_err}\n  \
                         body preview: {preview}"
                    );
                    continue;
                }
                log::error!(
                    "JSON parse failed after {} retries, giving up.\n  \
                     url: {url}\n  \
                     status: {status}\n  \
                     parse error: {json_err}\n  \
                     body preview: {preview}",
                    policy.max_retries
                );
                return Err(GeocodeError::Parse {
                    message: format!(
                        "JSON parse failed: {json_err} (status={status}, received {} bytes)",
                        text.len()
                    ),
                });
            }
        }
    }
}

fn preview(text: &str) -> &str {
    if text.len() <= BODY_PREVIEW_LEN {
        return text;
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FAST: RetryPolicy = RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(1),
    };

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let text = "é".repeat(BODY_PREVIEW_LEN);
        let cut = preview(&text);
        assert!(cut.len() <= BODY_PREVIEW_LEN);
        assert!(text.starts_with(cut));
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/search", server.uri());
        let body = send_json(|| client.get(&url), FAST).await.unwrap();
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn persistent_rate_limit_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/search", server.uri());
        let err = send_json(|| client.get(&url), FAST).await.unwrap_err();
        assert!(matches!(err, GeocodeError::RateLimited));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/search", server.uri());
        let err = send_json(|| client.get(&url), FAST).await.unwrap_err();
        assert!(matches!(err, GeocodeError::Status { status: 403 }));
    }

    #[tokio::test]
    async fn malformed_body_becomes_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/search", server.uri());
        let err = send_json(|| client.get(&url), RetryPolicy::NONE)
            .await
            .unwrap_err();
        assert!(matches!(err, GeocodeError::Parse { .. }));
    }
}
