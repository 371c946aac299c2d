// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Scripted log stream destination for testing

use async_trait::async_trait;
use logstream_shipper::{
    BatchRequest, DestinationError, LogStreamClient, QueryError, SequenceToken,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// One call received by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Query,
    CreateGroup,
    CreateStream,
    Send {
        token: Option<String>,
        messages: Vec<String>,
    },
}

/// Destination that replays scripted results, then succeeds.
///
/// Unscripted queries report a fresh stream (known-empty token); unscripted
/// sends succeed and return `token-1`, `token-2`, ...
#[derive(Default)]
pub struct MockClient {
    queries: Mutex<VecDeque<Result<SequenceToken, QueryError>>>,
    sends: Mutex<VecDeque<Result<SequenceToken, DestinationError>>>,
    calls: Mutex<Vec<Call>>,
    next_token: AtomicU64,
    send_gate: Option<Arc<Semaphore>>,
}

#[allow(dead_code)]
impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_queries(mut self, queries: Vec<Result<SequenceToken, QueryError>>) -> Self {
        self.queries = Mutex::new(queries.into());
        self
    }

    pub fn with_sends(mut self, sends: Vec<Result<SequenceToken, DestinationError>>) -> Self {
        self.sends = Mutex::new(sends.into());
        self
    }

    /// Every send waits for one permit of `gate` before answering.
    pub fn with_send_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.send_gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sends(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send { messages, .. } => Some(messages),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl LogStreamClient for MockClient {
    async fn query_stream_token(
        &self,
        _group_id: &str,
        _stream_prefix: &str,
    ) -> Result<SequenceToken, QueryError> {
        self.record(Call::Query);
        self.queries
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SequenceToken::default()))
    }

    async fn create_group(&self, _group_id: &str) -> Result<(), DestinationError> {
        self.record(Call::CreateGroup);
        Ok(())
    }

    async fn create_stream(
        &self,
        _group_id: &str,
        _stream_id: &str,
    ) -> Result<(), DestinationError> {
        self.record(Call::CreateStream);
        Ok(())
    }

    async fn send_batch(
        &self,
        request: BatchRequest<'_>,
    ) -> Result<SequenceToken, DestinationError> {
        self.record(Call::Send {
            token: request.token.as_str().map(str::to_string),
            messages: request.events.iter().map(|e| e.message.clone()).collect(),
        });

        if let Some(gate) = &self.send_gate {
            gate.acquire().await.unwrap().forget();
        }

        let scripted = self.sends.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            let n = self.next_token.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(SequenceToken::new(format!("token-{n}")))
        })
    }
}
