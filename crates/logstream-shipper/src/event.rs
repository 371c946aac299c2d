// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log records as written by the application and log events as delivered.
//!
//! A [`Record`] is either plain text or a structured JSON value. Accepted
//! records are converted into an immutable [`LogEvent`]:
//!
//! - text records, and structured records holding a bare JSON string, become
//!   the message unchanged
//! - structured records are serialized to text by the stringify strategy
//! - the timestamp comes from the record's `time` field when it holds an
//!   RFC 3339 date or epoch milliseconds, otherwise from the current clock

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::constants::TIMESTAMP_FIELD;

/// A single message queued for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl LogEvent {
    #[must_use]
    pub fn new(message: impl Into<String>, timestamp: i64) -> Self {
        Self {
            message: message.into(),
            timestamp,
        }
    }
}

/// A log record handed to the shipper.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Text(String),
    Structured(Value),
}

impl Record {
    /// `true` for a JSON `null`, which stands in for an absent record.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Record::Structured(Value::Null))
    }

    /// Converts the record into a [`LogEvent`] using `stringify` for structured values.
    pub fn into_log_event(self, stringify: impl Fn(&Value) -> String) -> LogEvent {
        match self {
            Record::Text(message) | Record::Structured(Value::String(message)) => {
                LogEvent::new(message, now_millis())
            }
            Record::Structured(value) => {
                let timestamp = value
                    .get(TIMESTAMP_FIELD)
                    .and_then(parse_timestamp)
                    .unwrap_or_else(now_millis);
                LogEvent::new(stringify(&value), timestamp)
            }
        }
    }
}

impl From<String> for Record {
    fn from(value: String) -> Self {
        Record::Text(value)
    }
}

impl From<&str> for Record {
    fn from(value: &str) -> Self {
        Record::Text(value.to_string())
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Record::Structured(value)
    }
}

impl<T: Into<Record>> From<Option<T>> for Record {
    fn from(value: Option<T>) -> Self {
        value.map_or(Record::Structured(Value::Null), Into::into)
    }
}

/// Default serialization of structured records: compact JSON.
#[must_use]
pub fn stringify_json(value: &Value) -> String {
    value.to_string()
}

/// Current wall clock time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => Some(dt.timestamp_millis()),
            Err(e) => {
                debug!("SHIPPER | Ignoring unparseable record timestamp {s:?}: {e}");
                None
            }
        },
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}
