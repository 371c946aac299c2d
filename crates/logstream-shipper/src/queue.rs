// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Event queue and batch planning.
//!
//! The queue is a FIFO of [`LogEvent`]s that only ever changes at its ends:
//!
//! ```text
//!   requeue (recovery)        append (ingestion)
//!          │                         │
//!          v                         v
//!   ┌────┬────┬────┬────┬────┬────┬────┐
//!   │ e1 │ e2 │ e3 │ e4 │ e5 │ e6 │ .. │
//!   └────┴────┴────┴────┴────┴────┴────┘
//!   └──────── take_front(n) ───────┘
//!              (dispatch)
//! ```
//!
//! [`BatchPlanner`] decides `n`: the longest prefix that stays within the
//! destination's count and byte limits.

use std::collections::VecDeque;
use tracing::warn;

use crate::config::MessageSizeFn;
use crate::constants::EVENT_OVERHEAD_BYTES;
use crate::event::LogEvent;

/// FIFO of events awaiting delivery.
///
/// Unbounded: memory is the only limit. Events are never reordered.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<LogEvent>,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Appends an event at the tail.
    pub fn push_back(&mut self, event: LogEvent) {
        self.events.push_back(event);
    }

    /// Removes and returns the first `count` events (fewer if the queue is shorter).
    pub fn take_front(&mut self, count: usize) -> Vec<LogEvent> {
        let count = count.min(self.events.len());
        self.events.drain(..count).collect()
    }

    /// Puts `events` back at the head, ahead of everything already queued,
    /// keeping their relative order.
    pub fn requeue_front(&mut self, events: Vec<LogEvent>) {
        for event in events.into_iter().rev() {
            self.events.push_front(event);
        }
    }

    /// Detaches the whole queue, leaving it empty.
    pub fn take_all(&mut self) -> Vec<LogEvent> {
        std::mem::take(&mut self.events).into()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEvent> {
        self.events.iter()
    }
}

/// Computes batch boundaries under count and byte limits.
#[derive(Clone)]
pub struct BatchPlanner {
    max_count: usize,
    max_bytes: usize,
    message_size: MessageSizeFn,
}

impl BatchPlanner {
    #[must_use]
    pub fn new(max_count: usize, max_bytes: usize, message_size: MessageSizeFn) -> Self {
        Self {
            max_count,
            max_bytes,
            message_size,
        }
    }

    /// Size charged for one event: the measured message plus the fixed overhead.
    #[must_use]
    pub fn event_cost(&self, event: &LogEvent) -> usize {
        EVENT_OVERHEAD_BYTES + (self.message_size)(&event.message)
    }

    /// Length of the longest prefix of `events` within both limits.
    ///
    /// A first event that alone exceeds the byte limit still forms a batch of
    /// one, so an oversized event never blocks the events behind it. Returns 0
    /// only for an empty input.
    pub fn next_batch_size<'a>(&self, events: impl IntoIterator<Item = &'a LogEvent>) -> usize {
        let mut count = 0;
        let mut bytes = 0;

        for event in events.into_iter().take(self.max_count) {
            let cost = self.event_cost(event);
            if bytes + cost > self.max_bytes {
                if count == 0 {
                    warn!(
                        "SHIPPER | Log event of {} bytes exceeds the {} byte batch limit, sending it alone",
                        cost, self.max_bytes
                    );
                    return 1;
                }
                break;
            }
            bytes += cost;
            count += 1;
        }

        count
    }
}

impl std::fmt::Debug for BatchPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchPlanner")
            .field("max_count", &self.max_count)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}
