//! Bounded retry for transient upstream failures.

use crate::{Error, Result};
use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::warn;

/// Retry policy applied to every authenticated request.
///
/// The defaults retry up to 5 times on HTTP 502, 503 and 504 (and on
/// connection failures) with an exponential backoff of 1 second, for `https`
/// URLs only. Any other status is returned to the caller untouched.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Base factor of the exponential backoff.
    pub backoff_factor: Duration,
    /// Upper bound of a single backoff delay.
    pub backoff_max: Duration,
    /// Statuses that trigger a retry.
    pub status_forcelist: Vec<u16>,
    /// Only retry requests to `https` URLs.
    pub https_only: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor: Duration::from_secs(1),
            backoff_max: Duration::from_secs(120),
            status_forcelist: vec![502, 503, 504],
            https_only: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before the `retry`-th retry (1-based).
    ///
    /// The first retry is immediate; later ones wait
    /// `backoff_factor * 2^(retry - 1)`, capped at `backoff_max`.
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry <= 1 {
            return Duration::ZERO;
        }
        let exp = 2u32.saturating_pow(retry - 1);
        self.backoff_factor
            .checked_mul(exp)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }

    /// Whether `status` is one of the retryable codes.
    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.status_forcelist.contains(&status.as_u16())
    }

    fn applies_to(&self, url: &reqwest::Url) -> bool {
        !self.https_only || url.scheme() == "https"
    }

    /// Send `request`, retrying transient failures according to the policy.
    ///
    /// # Errors
    /// - [`Error::RetriesExhausted`] if the last attempt still returned a
    ///   retryable status.
    /// - [`Error::Request`] if the request cannot be built or the last attempt
    ///   failed at the transport level.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let (client, request) = request.build_split();
        let request = request?;

        if !self.applies_to(request.url()) {
            return Ok(client.execute(request).await?);
        }

        let mut retries = 0;
        loop {
            let Some(attempt) = request.try_clone() else {
                // Streaming bodies cannot be replayed.
                return Ok(client.execute(request).await?);
            };

            let delay = match client.execute(attempt).await {
                Ok(response) if self.is_retryable_status(response.status()) => {
                    let status = response.status();
                    if retries >= self.max_retries {
                        return Err(Error::RetriesExhausted {
                            url: request.url().to_string(),
                            status: status.as_u16(),
                            retries,
                        });
                    }
                    retries += 1;
                    let delay = retry_after(&response).unwrap_or_else(|| self.backoff(retries));
                    warn!(
                        url = %request.url(),
                        status = status.as_u16(),
                        retry = retries,
                        delay = ?delay,
                        "transient server error, retrying"
                    );
                    delay
                }
                Ok(response) => return Ok(response),
                Err(err) if is_transient(&err) => {
                    if retries >= self.max_retries {
                        return Err(err.into());
                    }
                    retries += 1;
                    let delay = self.backoff(retries);
                    warn!(
                        url = %request.url(),
                        error = %err,
                        retry = retries,
                        delay = ?delay,
                        "transport error, retrying"
                    );
                    delay
                }
                Err(err) => return Err(err.into()),
            };

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

/// `Retry-After` in seconds, honoured on 503 only.
fn retry_after(response: &Response) -> Option<Duration> {
    if response.status() != StatusCode::SERVICE_UNAVAILABLE {
        return None;
    }
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::GET;
    use httpmock::MockServer;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            backoff_factor: Duration::ZERO,
            https_only: false,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn backoff_grows_exponentially_after_first_retry() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=5).map(|n| policy.backoff(n).as_secs()).collect();
        assert_eq!(delays, vec![0, 2, 4, 8, 16]);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(30), Duration::from_secs(120));
        assert_eq!(policy.backoff(40), Duration::from_secs(120));
    }

    #[test]
    fn only_gateway_errors_are_retryable() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(policy.is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(policy.is_retryable_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(!policy.is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!policy.is_retryable_status(StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn exhausts_budget_on_persistent_503() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/busy");
            then.status(503);
        });

        let http = reqwest::Client::new();
        let err = fast_policy()
            .send(http.get(server.url("/busy")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::RetriesExhausted {
                status: 503,
                retries: 5,
                ..
            }
        ));
        mock.assert_hits(6);
    }

    #[tokio::test]
    async fn does_not_retry_other_errors() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/boom");
            then.status(500);
        });

        let http = reqwest::Client::new();
        let response = fast_policy()
            .send(http.get(server.url("/boom")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn plain_http_is_not_retried_by_default() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/busy");
            then.status(502);
        });

        let http = reqwest::Client::new();
        let response = RetryPolicy::default()
            .send(http.get(server.url("/busy")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn retry_after_overrides_backoff_on_503() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/busy");
            then.status(503).header("Retry-After", "1");
        });

        let policy = RetryPolicy {
            max_retries: 2,
            ..fast_policy()
        };
        let http = reqwest::Client::new();
        let started = std::time::Instant::now();
        let err = policy
            .send(http.get(server.url("/busy")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::RetriesExhausted {
                status: 503,
                retries: 2,
                ..
            }
        ));
        mock.assert_hits(3);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn connection_failures_exhaust_budget_as_request_error() {
        let http = reqwest::Client::new();
        let err = fast_policy()
            .send(http.get("http://127.0.0.1:1/unreachable"))
            .await
            .unwrap_err();

        match err {
            Error::Request(inner) => assert!(inner.is_connect()),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
