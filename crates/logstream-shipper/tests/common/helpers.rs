// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use logstream_shipper::{
    Delay, DeliveryState, LogEvent, Notification, PipelineSnapshot, RecoveryHook, Resume,
    ShipError, ShipperConfig, ShipperHandle, ShipperService, Strategies,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::mocks::MockClient;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A recovery hook invocation captured by [`channel_recovery`].
pub type Failure = (ShipError, Option<Vec<LogEvent>>, Resume);

/// Config with immediate retries so tests never sleep.
pub fn test_config() -> ShipperConfig {
    ShipperConfig {
        retryable_delay: Delay::Immediate,
        ..ShipperConfig::new("app-logs", "instance-1")
    }
}

/// Spawns a shipper and subscribes to its notifications.
pub fn start_shipper(
    config: ShipperConfig,
    strategies: Strategies,
    client: Arc<MockClient>,
) -> (ShipperHandle, mpsc::UnboundedReceiver<Notification>, JoinHandle<()>) {
    let (mut service, handle) =
        ShipperService::new(config, strategies, client).expect("failed to create shipper");
    let notifications = service.subscribe();
    let task = tokio::spawn(service.run());
    (handle, notifications, task)
}

/// Recovery hook forwarding each failure to the test, which decides later.
pub fn channel_recovery() -> (RecoveryHook, mpsc::UnboundedReceiver<Failure>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let hook: RecoveryHook = Arc::new(
        move |error: ShipError, events: Option<Vec<LogEvent>>, resume: Resume| {
            let _ = tx.send((error, events, resume));
        },
    );
    (hook, rx)
}

pub async fn next_failure(rx: &mut mpsc::UnboundedReceiver<Failure>) -> Failure {
    timeout(TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for recovery hook")
        .expect("recovery channel closed")
}

pub async fn next_notification(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Notification {
    timeout(TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("notification channel closed")
}

/// Messages of the next delivered batch, skipping other notifications.
pub async fn next_delivery(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Vec<String> {
    loop {
        if let Notification::BatchDelivered { events } = next_notification(rx).await {
            return messages(&events);
        }
    }
}

/// Polls the shipper until it reports `state`.
pub async fn wait_for_state(handle: &ShipperHandle, state: DeliveryState) -> PipelineSnapshot {
    timeout(TIMEOUT, async {
        loop {
            let snapshot = handle.snapshot().await.expect("shipper not running");
            if snapshot.state == state {
                return snapshot;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {state:?}"))
}

pub fn messages(events: &[LogEvent]) -> Vec<String> {
    events.iter().map(|e| e.message.clone()).collect()
}
