// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded retry of batch sends.
//!
//! Only [`LogStreamClient::send_batch`] is retried, and only while the
//! destination flags the failure as retryable. Token queries and resource
//! creation are never retried here; their failures go straight to recovery.

use std::time::Instant;
use tracing::{debug, error};

use crate::client::{BatchRequest, LogStreamClient, SequenceToken};
use crate::config::{Delay, ShipperConfig};
use crate::error::DestinationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryStrategy {
    /// Retries after the first attempt. 0 disables retrying.
    pub max_retries: u32,
    pub delay: Delay,
}

impl RetryStrategy {
    #[must_use]
    pub fn new(max_retries: u32, delay: Delay) -> Self {
        Self { max_retries, delay }
    }
}

impl From<&ShipperConfig> for RetryStrategy {
    fn from(config: &ShipperConfig) -> Self {
        Self::new(config.retryable_max, config.retryable_delay)
    }
}

/// Sends `request`, re-attempting retryable failures up to `strategy.max_retries` times.
///
/// Non-retryable failures, and the last retryable one once the cap is reached,
/// are returned unmodified.
pub async fn send_with_retry(
    client: &dyn LogStreamClient,
    request: BatchRequest<'_>,
    strategy: RetryStrategy,
) -> Result<SequenceToken, DestinationError> {
    let mut retries = 0;

    loop {
        let time = Instant::now();
        match client.send_batch(request).await {
            Ok(token) => return Ok(token),
            Err(e) if e.retryable && retries < strategy.max_retries => {
                retries += 1;
                debug!(
                    "SHIPPER | Retryable failure sending {} events after {} ms, retry {}/{}: {}",
                    request.events.len(),
                    time.elapsed().as_millis(),
                    retries,
                    strategy.max_retries,
                    e
                );
                strategy.delay.wait().await;
            }
            Err(e) => {
                if e.retryable {
                    error!(
                        "SHIPPER | Giving up sending {} events after {} attempts: {}",
                        request.events.len(),
                        retries + 1,
                        e
                    );
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::client::QueryError;
    use crate::error::DestinationErrorKind;
    use crate::event::LogEvent;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers sends from a script, then succeeds with token "final".
    struct ScriptedClient {
        sends: AtomicUsize,
        script: Mutex<VecDeque<DestinationError>>,
    }

    impl ScriptedClient {
        fn new(script: Vec<DestinationError>) -> Self {
            Self {
                sends: AtomicUsize::new(0),
                script: Mutex::new(script.into()),
            }
        }

        fn failing_retryably(times: usize) -> Self {
            Self::new(
                (0..times)
                    .map(|_| {
                        DestinationError::retryable(DestinationErrorKind::Throttled, "slow down")
                    })
                    .collect(),
            )
        }
    }

    #[async_trait]
    impl LogStreamClient for ScriptedClient {
        async fn query_stream_token(&self, _: &str, _: &str) -> Result<SequenceToken, QueryError> {
            unreachable!("only sends are retried")
        }

        async fn create_group(&self, _: &str) -> Result<(), DestinationError> {
            unreachable!("only sends are retried")
        }

        async fn create_stream(&self, _: &str, _: &str) -> Result<(), DestinationError> {
            unreachable!("only sends are retried")
        }

        async fn send_batch(&self, _: BatchRequest<'_>) -> Result<SequenceToken, DestinationError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().unwrap().pop_front() {
                Some(error) => Err(error),
                None => Ok(SequenceToken::new("final")),
            }
        }
    }

    async fn send(
        client: &ScriptedClient,
        strategy: RetryStrategy,
    ) -> Result<SequenceToken, DestinationError> {
        let events = vec![LogEvent::new("message", 0)];
        let token = SequenceToken::new("start");
        let request = BatchRequest {
            group_id: "group",
            stream_id: "stream",
            token: &token,
            events: &events,
        };
        send_with_retry(client, request, strategy).await
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let client = ScriptedClient::new(vec![]);

        let result = send(&client, RetryStrategy::new(3, Delay::Immediate)).await;

        assert_eq!(result.unwrap(), SequenceToken::new("final"));
        assert_eq!(client.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_until_success_within_cap() {
        let client = ScriptedClient::failing_retryably(3);

        let result = send(&client, RetryStrategy::new(3, Delay::Immediate)).await;

        assert!(result.is_ok());
        assert_eq!(client.sends.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_gives_up_when_cap_is_reached() {
        let client = ScriptedClient::failing_retryably(5);

        let result = send(&client, RetryStrategy::new(2, Delay::Immediate)).await;

        let error = result.unwrap_err();
        assert!(error.retryable);
        assert_eq!(error.kind, DestinationErrorKind::Throttled);
        assert_eq!(client.sends.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_disables_retrying() {
        let client = ScriptedClient::failing_retryably(1);

        let result = send(&client, RetryStrategy::new(0, Delay::Immediate)).await;

        assert!(result.is_err());
        assert_eq!(client.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_retryable_is_not_retried() {
        let client = ScriptedClient::new(vec![DestinationError::new(
            DestinationErrorKind::Other,
            "access denied",
        )]);

        let result = send(&client, RetryStrategy::new(100, Delay::Immediate)).await;

        assert_eq!(result.unwrap_err().message, "access denied");
        assert_eq!(client.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_between_attempts() {
        let client = ScriptedClient::failing_retryably(2);
        let start = tokio::time::Instant::now();

        let result = send(&client, RetryStrategy::new(5, Delay::from_millis(150))).await;

        assert!(result.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn test_strategy_from_config() {
        let config = ShipperConfig::new("group", "stream");
        let strategy = RetryStrategy::from(&config);

        assert_eq!(strategy.max_retries, 100);
        assert_eq!(strategy.delay, Delay::from_millis(150));
    }
}
