// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Observability notifications emitted by the shipper.
//!
//! Within a delivery cycle notifications follow the order
//! `GroupCreated`, `StreamCreated`, `BatchDelivered`, then `Fatal` if the
//! shipper stops. None of them are needed for correct delivery.

use tokio::sync::mpsc;

use crate::error::ShipError;
use crate::event::LogEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The missing log group was created.
    GroupCreated { group_id: String },

    /// The missing log stream was created.
    StreamCreated { group_id: String, stream_id: String },

    /// A batch was accepted by the destination. Carries exactly the events sent.
    BatchDelivered { events: Vec<LogEvent> },

    /// The shipper stopped permanently.
    Fatal { error: ShipError },
}

/// Optional sender side of the notification channel.
#[derive(Debug, Clone, Default)]
pub(crate) struct Notifier {
    tx: Option<mpsc::UnboundedSender<Notification>>,
}

impl Notifier {
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = Some(tx);
        rx
    }

    pub fn notify(&self, notification: Notification) {
        if let Some(tx) = &self.tx {
            // A dropped receiver only means nobody is listening anymore.
            let _ = tx.send(notification);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_without_subscriber() {
        Notifier::default().notify(Notification::GroupCreated {
            group_id: "group".to_string(),
        });
    }

    #[test]
    fn test_notify_reaches_subscriber_in_order() {
        let mut notifier = Notifier::default();
        let mut rx = notifier.subscribe();

        notifier.notify(Notification::GroupCreated {
            group_id: "g".to_string(),
        });
        notifier.clone().notify(Notification::StreamCreated {
            group_id: "g".to_string(),
            stream_id: "s".to_string(),
        });

        assert!(matches!(rx.try_recv().unwrap(), Notification::GroupCreated { .. }));
        assert!(matches!(rx.try_recv().unwrap(), Notification::StreamCreated { .. }));
    }

    #[test]
    fn test_notify_after_receiver_dropped() {
        let mut notifier = Notifier::default();
        drop(notifier.subscribe());

        notifier.notify(Notification::BatchDelivered { events: vec![] });
    }
}
