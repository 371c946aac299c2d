// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ordered, batched delivery of log records to a sequence-token log stream.
//!
//! Applications write records through a [`ShipperHandle`] without waiting on
//! the network. A single [`ShipperService`] task queues them, cuts batches
//! under count and byte limits, and appends each batch to the destination
//! with the stream's current sequence token, creating the group and stream
//! on first use:
//!
//! ```text
//!   write ─> filter ─> EventQueue ─> BatchPlanner ─> send_with_retry ─> LogStreamClient
//!                          ^                                 │
//!                          └──── Resume (recovery hook) <────┘ failure
//! ```
//!
//! Events reach the destination in write order, one batch in flight at a
//! time. Failures that retrying does not fix are handed to the recovery hook
//! in [`Strategies`], which decides whether to resume (optionally requeueing
//! the failed events) or stop the shipper for good.
//!
//! # Usage
//!
//! ```rust,ignore
//! use logstream_shipper::{logger, ShipperConfig, ShipperService, Strategies};
//!
//! logger::init(tracing::Level::INFO)?;
//! let config = ShipperConfig::from_env()?;
//! let (service, handle) = ShipperService::new(config, Strategies::default(), client)?;
//! tokio::spawn(service.run());
//!
//! handle.write("service started")?;
//! ```

#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod logger;
pub mod notification;
mod provision;
pub mod queue;
pub mod recovery;
pub mod retry;
pub mod service;

pub use client::{BatchRequest, LogStreamClient, QueryError, SequenceToken};
pub use config::{Delay, ShipperConfig, Strategies};
pub use error::{ConfigError, DestinationError, DestinationErrorKind, ShipError, ShipperError};
pub use event::{LogEvent, Record};
pub use notification::Notification;
pub use recovery::{fail_on_error, requeue_on_error, RecoveryHook, Resume};
pub use service::{DeliveryState, PipelineSnapshot, ShipperHandle, ShipperService};
