//! Bounded retry and reconnect around a single request
//!
//! Transient failures (timeouts, short reads) get a fixed number of retries
//! after a fixed delay. A broken connection gets a fixed number of full
//! reconnect cycles, each followed by one resend. Anything else goes
//! straight back to the caller.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::protocol::Request;

/// Something that can exchange one request for one response and re-establish
/// itself when the stream breaks.
pub trait Link {
    /// Write the request and read its response (single attempt)
    fn exchange(&mut self, request: &Request) -> impl Future<Output = Result<Value>> + Send;

    /// Tear down and re-open the stream, including the handshake
    fn reconnect(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// How many times each failure class may be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after a transient failure
    pub transient_retries: u32,
    /// Full reconnect cycles allowed after a broken connection
    pub reconnects: u32,
    /// Pause before a transient retry
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// Policy used for ordinary commands
    pub fn commands(retry_delay: Duration) -> Self {
        Self {
            transient_retries: 1,
            reconnects: 1,
            retry_delay,
        }
    }

    /// Policy used for the handshake: a timeout gets one more go, but a
    /// broken stream is never reconnected from inside the handshake.
    pub fn handshake(retry_delay: Duration) -> Self {
        Self {
            transient_retries: 1,
            reconnects: 0,
            retry_delay,
        }
    }
}

/// Send a request over `link`, applying `policy` to failures
pub async fn send_with_policy<L: Link>(
    link: &mut L,
    request: &Request,
    policy: RetryPolicy,
) -> Result<Value> {
    let mut transient_failures = 0;
    let mut reconnects = 0;

    loop {
        let err = match link.exchange(request).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        if err.is_transient() {
            if transient_failures >= policy.transient_retries {
                warn!(
                    request = %request.kind,
                    error = %err,
                    "Request failed after retry"
                );
                return Err(err);
            }
            transient_failures += 1;
            debug!(
                request = %request.kind,
                error = %err,
                attempt = transient_failures,
                "Retrying request"
            );
            tokio::time::sleep(policy.retry_delay).await;
            continue;
        }

        if err.is_broken() {
            if reconnects >= policy.reconnects {
                return Err(err);
            }
            reconnects += 1;
            // A fresh stream starts a fresh run of transient retries
            transient_failures = 0;
            warn!(request = %request.kind, "Connection broken, reconnecting");
            link.reconnect().await?;
            continue;
        }

        return Err(err);
    }
}
