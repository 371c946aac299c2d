// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Actor-based shipper service: ingestion plus the delivery state machine.
//!
//! A single [`ShipperService`] task owns the queue, the sequence token and
//! the delivery state. Producers talk to it through cloneable
//! [`ShipperHandle`]s, so the queue is never touched concurrently:
//!
//! ```text
//!    ┌──────────────┐   commands    ┌──────────────┐  one task per   ┌─────────────┐
//!    │   Handles    │ ────────────> │   Service    │ ──────────────> │ Destination │
//!    │  (Clone)     │               │  (owns all   │  in-flight call │   client    │
//!    └──────────────┘               │   state)     │ <────────────── └─────────────┘
//!                                   └──────┬───────┘  cycle events
//!                                          │ failures
//!                                          v
//!                                   ┌──────────────┐
//!                                   │ Recovery hook│ ── Resume ──> back to service
//!                                   └──────────────┘
//! ```
//!
//! # Delivery states
//!
//! ```text
//!   Idle ──write──> Scheduled ──fire──┬─ empty queue ──────────────────> Idle
//!                      ^              ├─ no token ──> AcquiringToken ──┐
//!                      │              └─ token ───────────────────────┴─> Sending
//!                      │                                                   │
//!                      ├──────────── delivered, queue not empty ───────────┤
//!                      │                                                   │ failed
//!                      └────────── resume / resume_with ── Recovering <────┘
//!                                                              │ fail
//!                                                              v
//!                                                            Failed
//! ```
//!
//! At most one delivery cycle is in flight. While it is, writes only append
//! to the queue; the next cycle picks them up.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::client::{BatchRequest, LogStreamClient, SequenceToken};
use crate::config::{ShipperConfig, Strategies};
use crate::error::{ConfigError, DestinationError, DestinationErrorKind, ShipError, ShipperError};
use crate::event::{LogEvent, Record};
use crate::notification::{Notification, Notifier};
use crate::provision::acquire_token;
use crate::queue::{BatchPlanner, EventQueue};
use crate::recovery::{Resume, ResumeDecision, ResumeSignal};
use crate::retry::{send_with_retry, RetryStrategy};

/// Where the delivery state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Nothing scheduled; the next write schedules a cycle.
    Idle,
    /// A cycle will fire after the write interval.
    Scheduled,
    /// Querying the sequence token, creating the group/stream if missing.
    AcquiringToken,
    /// A batch send (with retries) is in flight.
    Sending,
    /// Waiting for the recovery hook's decision.
    Recovering,
    /// Stopped for good; writes are ignored.
    Failed,
}

/// Point-in-time view of the shipper, for inspection and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSnapshot {
    pub state: DeliveryState,
    pub queued: usize,
    pub has_token: bool,
    pub epoch: u64,
}

/// Commands that can be sent to the shipper service.
#[derive(Debug)]
pub enum ShipperCommand {
    /// Filter, convert and queue one record.
    Write(Record),
    /// Detach and return everything queued.
    ClearQueue(oneshot::Sender<Vec<LogEvent>>),
    Snapshot(oneshot::Sender<PipelineSnapshot>),
    /// Stop the service. Queued events are dropped.
    Shutdown,
}

/// Completions of the in-flight cycle, reported by spawned tasks.
#[derive(Debug)]
enum CycleEvent {
    Fire,
    TokenAcquired(Result<SequenceToken, ShipError>),
    BatchSent {
        events: Vec<LogEvent>,
        result: Result<SequenceToken, DestinationError>,
    },
}

/// Handle for sending commands to the shipper service.
///
/// Cloneable; every clone feeds the same queue.
#[derive(Clone, Debug)]
pub struct ShipperHandle {
    tx: mpsc::UnboundedSender<ShipperCommand>,
}

impl ShipperHandle {
    /// Queues a record for delivery without waiting for the network.
    ///
    /// Returns once the record is handed to the service. Records rejected by
    /// the filter, or written after the shipper failed, are silently dropped.
    pub fn write(&self, record: impl Into<Record>) -> Result<(), ShipperError> {
        self.send(ShipperCommand::Write(record.into()))
    }

    /// Removes and returns every queued event.
    pub async fn clear_queue(&self) -> Result<Vec<LogEvent>, ShipperError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(ShipperCommand::ClearQueue(response_tx))?;
        response_rx.await.map_err(|_| ShipperError::NoResponse)
    }

    pub async fn snapshot(&self) -> Result<PipelineSnapshot, ShipperError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(ShipperCommand::Snapshot(response_tx))?;
        response_rx.await.map_err(|_| ShipperError::NoResponse)
    }

    pub fn shutdown(&self) -> Result<(), ShipperError> {
        self.send(ShipperCommand::Shutdown)
    }

    fn send(&self, command: ShipperCommand) -> Result<(), ShipperError> {
        self.tx.send(command).map_err(|_| ShipperError::NotRunning)
    }
}

struct PipelineState {
    queue: EventQueue,
    token: Option<SequenceToken>,
    delivery: DeliveryState,
    epoch: u64,
}

/// Shipper service that owns the pipeline state and processes commands.
///
/// This service should be spawned as a tokio task and will process
/// commands until shutdown.
pub struct ShipperService {
    config: Arc<ShipperConfig>,
    strategies: Strategies,
    client: Arc<dyn LogStreamClient>,
    planner: BatchPlanner,
    retry: RetryStrategy,
    notifier: Notifier,
    state: PipelineState,
    rx: mpsc::UnboundedReceiver<ShipperCommand>,
    cycle_tx: mpsc::UnboundedSender<CycleEvent>,
    cycle_rx: mpsc::UnboundedReceiver<CycleEvent>,
    resume_tx: mpsc::UnboundedSender<ResumeSignal>,
    resume_rx: mpsc::UnboundedReceiver<ResumeSignal>,
}

impl ShipperService {
    /// Validates `config` and creates the service with its handle.
    ///
    /// Spawn [`ShipperService::run`] and use the handle to write records.
    pub fn new(
        config: ShipperConfig,
        strategies: Strategies,
        client: Arc<dyn LogStreamClient>,
    ) -> Result<(Self, ShipperHandle), ConfigError> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (cycle_tx, cycle_rx) = mpsc::unbounded_channel();
        let (resume_tx, resume_rx) = mpsc::unbounded_channel();

        let planner = BatchPlanner::new(
            config.max_batch_count,
            config.max_batch_size,
            Arc::clone(&strategies.message_size),
        );
        let retry = RetryStrategy::from(&config);

        let service = Self {
            config: Arc::new(config),
            strategies,
            client,
            planner,
            retry,
            notifier: Notifier::default(),
            state: PipelineState {
                queue: EventQueue::new(),
                token: None,
                delivery: DeliveryState::Idle,
                epoch: 0,
            },
            rx,
            cycle_tx,
            cycle_rx,
            resume_tx,
            resume_rx,
        };
        let handle = ShipperHandle { tx };

        Ok((service, handle))
    }

    /// Receiver for delivery notifications. Call before [`ShipperService::run`];
    /// a later call replaces the earlier receiver.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Notification> {
        self.notifier.subscribe()
    }

    /// Runs the service until shutdown or until every handle is dropped.
    ///
    /// [`ShipperHandle::shutdown`] stops right away. Once every handle is
    /// dropped instead, the service stops reading commands and keeps
    /// delivering until the queue is drained or the shipper has failed. A
    /// pending recovery decision is still awaited while draining.
    pub async fn run(mut self) {
        debug!(
            "SHIPPER | Shipper service started for {}/{}",
            self.config.group_id, self.config.stream_id
        );

        let mut draining = false;
        loop {
            if draining && self.is_settled() {
                break;
            }

            tokio::select! {
                command = self.rx.recv(), if !draining => match command {
                    Some(ShipperCommand::Shutdown) => break,
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!(
                            "SHIPPER | All handles dropped, draining {} queued events",
                            self.state.queue.len()
                        );
                        draining = true;
                    }
                },
                Some(event) = self.cycle_rx.recv() => self.handle_cycle_event(event),
                Some(signal) = self.resume_rx.recv() => self.handle_resume(signal),
            }
        }

        let dropped = self.state.queue.len();
        if dropped > 0 {
            warn!("SHIPPER | Shipper service stopping with {dropped} undelivered events");
        }
        debug!("SHIPPER | Shipper service stopped");
    }

    fn handle_command(&mut self, command: ShipperCommand) {
        match command {
            ShipperCommand::Write(record) => self.enqueue(record),
            ShipperCommand::ClearQueue(response_tx) => {
                let events = self.state.queue.take_all();
                if response_tx.send(events).is_err() {
                    error!("SHIPPER | Failed to send clear queue response - receiver dropped");
                }
            }
            ShipperCommand::Snapshot(response_tx) => {
                if response_tx.send(self.snapshot()).is_err() {
                    error!("SHIPPER | Failed to send snapshot response - receiver dropped");
                }
            }
            ShipperCommand::Shutdown => {}
        }
    }

    /// Nothing left to deliver: idle with an empty queue, or failed.
    fn is_settled(&self) -> bool {
        match self.state.delivery {
            DeliveryState::Idle => self.state.queue.is_empty(),
            DeliveryState::Failed => true,
            _ => false,
        }
    }

    fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            state: self.state.delivery,
            queued: self.state.queue.len(),
            has_token: self.state.token.is_some(),
            epoch: self.state.epoch,
        }
    }

    fn enqueue(&mut self, record: Record) {
        if !(self.strategies.filter)(&record) {
            debug!("SHIPPER | Log record rejected by filter");
            return;
        }

        let event = record.into_log_event(&*self.strategies.stringify);
        self.state.queue.push_back(event);

        if self.state.delivery == DeliveryState::Idle {
            self.schedule_cycle();
        }
    }

    fn schedule_cycle(&mut self) {
        self.state.delivery = DeliveryState::Scheduled;

        let delay = self.config.write_interval;
        let cycle_tx = self.cycle_tx.clone();
        tokio::spawn(async move {
            delay.wait().await;
            let _ = cycle_tx.send(CycleEvent::Fire);
        });
    }

    fn handle_cycle_event(&mut self, event: CycleEvent) {
        if self.state.delivery == DeliveryState::Failed {
            debug!("SHIPPER | Ignoring cycle event after failure: {event:?}");
            return;
        }

        match event {
            CycleEvent::Fire => self.start_cycle(),
            CycleEvent::TokenAcquired(Ok(token)) => {
                self.state.token = Some(token.clone());
                self.send_next_batch(token);
            }
            CycleEvent::TokenAcquired(Err(error)) => {
                self.state.token = None;
                self.enter_recovery(error, None);
            }
            CycleEvent::BatchSent { events, result } => self.complete_send(events, result),
        }
    }

    fn start_cycle(&mut self) {
        if self.state.queue.is_empty() {
            self.state.delivery = DeliveryState::Idle;
            return;
        }

        match self.state.token.clone() {
            Some(token) => self.send_next_batch(token),
            None => self.start_token_acquisition(),
        }
    }

    fn start_token_acquisition(&mut self) {
        self.state.delivery = DeliveryState::AcquiringToken;

        let client = Arc::clone(&self.client);
        let config = Arc::clone(&self.config);
        let notifier = self.notifier.clone();
        let cycle_tx = self.cycle_tx.clone();
        tokio::spawn(async move {
            let result =
                acquire_token(client.as_ref(), &config.group_id, &config.stream_id, &notifier)
                    .await;
            let _ = cycle_tx.send(CycleEvent::TokenAcquired(result));
        });
    }

    fn send_next_batch(&mut self, token: SequenceToken) {
        let count = self.planner.next_batch_size(self.state.queue.iter());
        if count == 0 {
            // Drained by clear_queue while the token was being acquired.
            self.state.delivery = DeliveryState::Idle;
            return;
        }
        self.state.delivery = DeliveryState::Sending;

        let events = self.state.queue.take_front(count);
        debug!("SHIPPER | Sending batch of {count} events");

        let client = Arc::clone(&self.client);
        let config = Arc::clone(&self.config);
        let retry = self.retry;
        let cycle_tx = self.cycle_tx.clone();
        tokio::spawn(async move {
            let request = BatchRequest {
                group_id: &config.group_id,
                stream_id: &config.stream_id,
                token: &token,
                events: &events,
            };
            let result = send_with_retry(client.as_ref(), request, retry).await;
            let _ = cycle_tx.send(CycleEvent::BatchSent { events, result });
        });
    }

    fn complete_send(
        &mut self,
        events: Vec<LogEvent>,
        result: Result<SequenceToken, DestinationError>,
    ) {
        match result {
            Ok(token) => self.complete_batch(events, Some(token)),
            Err(e)
                if e.kind == DestinationErrorKind::DataAlreadyAccepted
                    && self.config.ignore_data_already_accepted =>
            {
                debug!(
                    "SHIPPER | Batch of {} events was already accepted, treating as delivered",
                    events.len()
                );
                let token = e.expected_token.map(SequenceToken::new);
                self.complete_batch(events, token);
            }
            Err(e)
                if e.kind == DestinationErrorKind::InvalidSequenceToken
                    && self.config.retry_on_invalid_sequence_token =>
            {
                warn!(
                    "SHIPPER | Sequence token rejected, resending {} events: {}",
                    events.len(),
                    e.message
                );
                self.state.token = e.expected_token.map(SequenceToken::new);
                self.state.queue.requeue_front(events);
                self.schedule_cycle();
            }
            Err(source) => {
                self.state.token = None;
                let error = ShipError::Send {
                    group_id: self.config.group_id.clone(),
                    stream_id: self.config.stream_id.clone(),
                    count: events.len(),
                    source,
                };
                self.enter_recovery(error, Some(events));
            }
        }
    }

    fn complete_batch(&mut self, events: Vec<LogEvent>, token: Option<SequenceToken>) {
        self.state.token = token;
        debug!("SHIPPER | Delivered batch of {} events", events.len());
        self.notifier.notify(Notification::BatchDelivered { events });

        if self.state.queue.is_empty() {
            self.state.delivery = DeliveryState::Idle;
        } else {
            self.schedule_cycle();
        }
    }

    fn enter_recovery(&mut self, error: ShipError, events: Option<Vec<LogEvent>>) {
        self.state.delivery = DeliveryState::Recovering;
        self.state.epoch += 1;

        warn!(
            "SHIPPER | Delivery failed (epoch {}), invoking recovery: {}",
            self.state.epoch, error
        );
        let resume = Resume::new(self.state.epoch, self.resume_tx.clone());
        (self.strategies.recovery)(error, events, resume);
    }

    fn handle_resume(&mut self, signal: ResumeSignal) {
        if signal.epoch != self.state.epoch || self.state.delivery != DeliveryState::Recovering {
            debug!(
                "SHIPPER | Ignoring stale recovery decision for epoch {} (current {})",
                signal.epoch, self.state.epoch
            );
            return;
        }

        match signal.decision {
            ResumeDecision::Continue(events) => {
                if let Some(events) = events {
                    debug!("SHIPPER | Requeueing {} events after recovery", events.len());
                    self.state.queue.requeue_front(events);
                }
                self.schedule_cycle();
            }
            ResumeDecision::Fail(error) => self.fail_stop(error),
        }
    }

    fn fail_stop(&mut self, error: ShipError) {
        self.state.delivery = DeliveryState::Failed;
        self.strategies.filter = Arc::new(|_: &Record| false);

        error!("SHIPPER | Shipper stopped permanently: {error}");
        self.notifier.notify(Notification::Fatal { error });

        let dropped = self.state.queue.take_all();
        if !dropped.is_empty() {
            error!("SHIPPER | Dropped {} undelivered events", dropped.len());
        }
    }
}
