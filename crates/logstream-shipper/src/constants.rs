// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Limits and defaults for sequence-token log stream destinations.
//!
//! The destination enforces per-request caps on both the number of events and
//! the total payload size. Payload size is computed as the sum of all message
//! sizes plus a fixed overhead for every event in the request.

/// Fixed per-event overhead counted against [`MAX_BATCH_SIZE_BYTES`].
///
/// The destination charges 26 bytes per event on top of the message itself.
pub const EVENT_OVERHEAD_BYTES: usize = 26;

/// Smallest accepted value for `max_batch_count`.
pub const MIN_BATCH_COUNT: usize = 1;

/// Largest number of events the destination accepts in one request.
///
/// Also the default for `max_batch_count`.
pub const MAX_BATCH_COUNT: usize = 10_000;

/// Smallest accepted value for `max_batch_size`.
///
/// Anything lower cannot hold the overhead of a handful of short events.
pub const MIN_BATCH_SIZE_BYTES: usize = 256;

/// Largest request payload the destination accepts: 1MB (1,048,576 bytes).
///
/// Also the default for `max_batch_size`.
pub const MAX_BATCH_SIZE_BYTES: usize = 1_048_576;

/// Default number of retries for a batch send flagged as retryable.
pub const DEFAULT_RETRYABLE_MAX: u32 = 100;

/// Default wait before retrying a retryable batch send, in milliseconds.
pub const DEFAULT_RETRYABLE_DELAY_MS: u64 = 150;

/// Field of a structured record holding its explicit timestamp.
pub const TIMESTAMP_FIELD: &str = "time";
