// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Destination client interface.
//!
//! The shipper drives a log stream service through [`LogStreamClient`]. The
//! concrete transport (HTTP API, SDK, ...) lives outside this crate; a client
//! is shared by the shipper and must not keep per-call state.

use async_trait::async_trait;

use crate::error::DestinationError;
use crate::event::LogEvent;

/// Cursor the destination requires to accept the next append to a stream.
///
/// A freshly created stream has no token yet; that known-empty state is
/// `SequenceToken::default()` and is distinct from not knowing the token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SequenceToken(Option<String>);

impl SequenceToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl From<Option<String>> for SequenceToken {
    fn from(token: Option<String>) -> Self {
        Self(token)
    }
}

/// Outcome of a failed token query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The log group does not exist (and so neither does the stream).
    GroupNotFound,
    /// The group exists but has no stream matching the prefix.
    StreamNotFound,
    Destination(DestinationError),
}

impl From<DestinationError> for QueryError {
    fn from(error: DestinationError) -> Self {
        QueryError::Destination(error)
    }
}

/// One append request. Borrowed for the duration of the call only.
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    pub group_id: &'a str,
    pub stream_id: &'a str,
    pub token: &'a SequenceToken,
    pub events: &'a [LogEvent],
}

#[async_trait]
pub trait LogStreamClient: Send + Sync {
    /// Looks up the stream whose name starts with `stream_prefix` and returns
    /// its current sequence token.
    async fn query_stream_token(
        &self,
        group_id: &str,
        stream_prefix: &str,
    ) -> Result<SequenceToken, QueryError>;

    async fn create_group(&self, group_id: &str) -> Result<(), DestinationError>;

    async fn create_stream(&self, group_id: &str, stream_id: &str) -> Result<(), DestinationError>;

    /// Appends the events in order and returns the token for the next append.
    async fn send_batch(
        &self,
        request: BatchRequest<'_>,
    ) -> Result<SequenceToken, DestinationError>;
}
