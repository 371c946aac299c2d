// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for the log stream shipper.
//!
//! Errors fall into three groups:
//! - [`ConfigError`]: rejected options, returned once at construction
//! - [`DestinationError`] / [`ShipError`]: classified failures reported by the
//!   destination client, wrapped with the operation that produced them
//! - [`ShipperError`]: the shipper service is no longer reachable

/// Invalid shipper options.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0} cannot be empty")]
    Empty(&'static str),

    #[error("Invalid configuration: {field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("Invalid configuration: {field} is not a valid number: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Invalid configuration: {field} is not a valid delay: {value}")]
    InvalidDelay { field: &'static str, value: String },
}

/// How the destination classified a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationErrorKind {
    /// The group or stream does not exist.
    ResourceNotFound,
    /// A create call targeted a group or stream that already exists.
    ResourceAlreadyExists,
    /// The sequence token sent with a batch was not the one expected.
    InvalidSequenceToken,
    /// The batch was already accepted under the sequence token sent.
    DataAlreadyAccepted,
    /// The request was rejected for exceeding a rate quota.
    Throttled,
    /// Any other failure (transport, auth, validation, ...).
    Other,
}

/// A failure reported by the destination client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct DestinationError {
    pub kind: DestinationErrorKind,
    pub message: String,
    /// Set by the destination when the call may succeed if re-attempted.
    pub retryable: bool,
    /// Token the destination expected instead, when it reports one.
    pub expected_token: Option<String>,
}

impl DestinationError {
    #[must_use]
    pub fn new(kind: DestinationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: false,
            expected_token: None,
        }
    }

    /// A transient failure the retry engine may absorb.
    #[must_use]
    pub fn retryable(kind: DestinationErrorKind, message: impl Into<String>) -> Self {
        Self {
            retryable: true,
            ..Self::new(kind, message)
        }
    }

    #[must_use]
    pub fn with_expected_token(mut self, token: impl Into<String>) -> Self {
        self.expected_token = Some(token.into());
        self
    }
}

/// An unrecoverable failure of one delivery attempt, handed to the recovery hook.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShipError {
    #[error("failed to query sequence token for {group_id}/{stream_id}: {source}")]
    TokenQuery {
        group_id: String,
        stream_id: String,
        source: DestinationError,
    },

    #[error("failed to create log group {group_id}: {source}")]
    CreateGroup {
        group_id: String,
        source: DestinationError,
    },

    #[error("failed to create log stream {group_id}/{stream_id}: {source}")]
    CreateStream {
        group_id: String,
        stream_id: String,
        source: DestinationError,
    },

    #[error("failed to send batch of {count} events to {group_id}/{stream_id}: {source}")]
    Send {
        group_id: String,
        stream_id: String,
        count: usize,
        source: DestinationError,
    },

    /// Raised by a recovery hook that decides to stop for its own reasons.
    #[error("{0}")]
    Custom(String),
}

impl ShipError {
    /// The destination failure behind this error, if any.
    #[must_use]
    pub fn destination_error(&self) -> Option<&DestinationError> {
        match self {
            Self::TokenQuery { source, .. }
            | Self::CreateGroup { source, .. }
            | Self::CreateStream { source, .. }
            | Self::Send { source, .. } => Some(source),
            Self::Custom(_) => None,
        }
    }
}

/// The shipper service task has stopped and no longer accepts commands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShipperError {
    #[error("Shipper service is not running")]
    NotRunning,

    #[error("Shipper service dropped the response")]
    NoResponse,
}
