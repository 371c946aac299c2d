// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Recovery protocol for failed delivery attempts.
//!
//! Every unrecoverable failure (token query, resource creation, or a batch
//! send the retry engine gave up on) is handed to the [`RecoveryHook`] along
//! with the events that were in flight, if any, and a [`Resume`] handle. The
//! hook decides, now or later from another task, by consuming the handle:
//!
//! - [`Resume::resume`]: carry on, the failed events are dropped
//! - [`Resume::resume_with`]: carry on after putting events back at the head
//! - [`Resume::fail`]: stop permanently, discarding everything queued
//!
//! Each failure bumps the shipper's recovery epoch. A decision carrying an
//! older epoch is ignored, so only one decision takes effect per failure.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::ShipError;
use crate::event::LogEvent;

/// Called once per unrecoverable failure with `(error, failed_events, resume)`.
pub type RecoveryHook = Arc<dyn Fn(ShipError, Option<Vec<LogEvent>>, Resume) + Send + Sync>;

/// What a recovery hook decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeDecision {
    /// Continue delivery, first requeueing these events if any.
    Continue(Option<Vec<LogEvent>>),
    /// Stop delivery permanently.
    Fail(ShipError),
}

/// Message sent back to the shipper when a hook decides.
#[derive(Debug)]
pub(crate) struct ResumeSignal {
    pub epoch: u64,
    pub decision: ResumeDecision,
}

/// One-shot handle letting a recovery hook resume or stop the shipper.
#[derive(Debug)]
#[must_use = "the shipper stays in recovery until the handle is used"]
pub struct Resume {
    epoch: u64,
    tx: mpsc::UnboundedSender<ResumeSignal>,
}

impl Resume {
    pub(crate) fn new(epoch: u64, tx: mpsc::UnboundedSender<ResumeSignal>) -> Self {
        Self { epoch, tx }
    }

    /// Epoch of the failure this handle answers.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Resume delivery without the failed events.
    pub fn resume(self) {
        self.decide(ResumeDecision::Continue(None));
    }

    /// Resume delivery after inserting `events` ahead of everything queued.
    pub fn resume_with(self, events: Vec<LogEvent>) {
        self.decide(ResumeDecision::Continue(Some(events)));
    }

    /// Stop the shipper permanently.
    pub fn fail(self, error: ShipError) {
        self.decide(ResumeDecision::Fail(error));
    }

    fn decide(self, decision: ResumeDecision) {
        let signal = ResumeSignal {
            epoch: self.epoch,
            decision,
        };
        if self.tx.send(signal).is_err() {
            debug!("SHIPPER | Shipper stopped before recovery decision for epoch {}", self.epoch);
        }
    }
}

/// Default hook: every failure is fatal.
pub fn fail_on_error(error: ShipError, events: Option<Vec<LogEvent>>, resume: Resume) {
    error!(
        "SHIPPER | Log shipping failed ({} events in flight), stopping: {}",
        events.map_or(0, |e| e.len()),
        error
    );
    resume.fail(error);
}

/// Hook that keeps retrying forever: failed events are always put back.
pub fn requeue_on_error(error: ShipError, events: Option<Vec<LogEvent>>, resume: Resume) {
    error!("SHIPPER | Log shipping failed, requeueing and resuming: {}", error);
    match events {
        Some(events) => resume.resume_with(events),
        None => resume.resume(),
    }
}
