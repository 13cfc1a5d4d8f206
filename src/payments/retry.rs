//! Backoff for payment processor calls.
//!
//! Transport failures (refused connections, timeouts) are retried with a
//! doubling delay. Any HTTP response, error statuses included, goes straight
//! back to the caller.

use std::future::Future;
use std::time::Duration;

use super::PaymentError;

#[derive(Clone, Copy, Debug)]
pub(crate) struct Backoff {
    retries: u32,
    base_delay: Duration,
}

impl Default for Backoff {
    /// Three retries: 200ms, 400ms, 800ms.
    fn default() -> Self {
        Self { retries: 3, base_delay: Duration::from_millis(200) }
    }
}

impl Backoff {
    #[cfg(test)]
    pub(crate) fn new(retries: u32, base_delay: Duration) -> Self {
        Self { retries, base_delay }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }

    /// Run `send` until it yields a response or the retries are spent.
    /// `operation` names the processor call in logs and in the error.
    pub(crate) async fn send<F, Fut>(&self, operation: &'static str, send: F) -> Result<reqwest::Response, PaymentError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempt = 0;
        loop {
            match send().await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < self.retries && is_transient(&e) => {
                    let delay = self.delay(attempt);
                    attempt += 1;
                    tracing::warn!(operation, attempt, retries = self.retries, ?delay, error = %e, "payment processor call failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(operation, attempts = attempt + 1, error = %e, "payment processor unreachable");
                    return Err(PaymentError::Unreachable(format!("{operation}: {e}")));
                }
            }
        }
    }
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout() || e.is_request()
}
