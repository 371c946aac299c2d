// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shipper configuration.
//!
//! [`ShipperConfig`] holds the plain options (destination, limits, delays) and
//! can be deserialized or read from `LOGSTREAM_*` environment variables.
//! [`Strategies`] holds the behaviors a host may override with closures.
//! Both are fixed once the shipper is constructed.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::env;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::constants;
use crate::error::ConfigError;
use crate::event::{stringify_json, Record};
use crate::recovery::{fail_on_error, RecoveryHook};

/// A wait between two steps of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delay {
    /// Yield to the runtime once, then continue.
    Immediate,
    /// Sleep for a fixed duration.
    Fixed(Duration),
}

impl Delay {
    #[must_use]
    pub fn from_millis(ms: u64) -> Self {
        Delay::Fixed(Duration::from_millis(ms))
    }

    pub async fn wait(self) {
        match self {
            Delay::Immediate => tokio::task::yield_now().await,
            Delay::Fixed(duration) => tokio::time::sleep(duration).await,
        }
    }

    fn parse(field: &'static str, value: &str) -> Result<Self, ConfigError> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("immediate") {
            return Ok(Delay::Immediate);
        }
        value
            .parse::<u64>()
            .map(Delay::from_millis)
            .map_err(|_| ConfigError::InvalidDelay {
                field,
                value: value.to_string(),
            })
    }
}

/// Accepts `"immediate"` or a number of milliseconds.
impl<'de> Deserialize<'de> for Delay {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Delay::parse("delay", &s).map_err(serde::de::Error::custom),
            Value::Number(n) => n
                .as_u64()
                .map(Delay::from_millis)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid delay: {n}"))),
            other => Err(serde::de::Error::custom(format!(
                "invalid delay, expected \"immediate\" or milliseconds, got: {other}"
            ))),
        }
    }
}

/// Destination and limits for one shipper instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShipperConfig {
    /// Log group receiving the events.
    pub group_id: String,
    /// Log stream inside the group receiving the events.
    pub stream_id: String,
    /// Wait before each scheduled delivery cycle.
    pub write_interval: Delay,
    /// Retries allowed for a retryable batch send. 0 disables retrying.
    pub retryable_max: u32,
    /// Wait before each retry of a retryable batch send.
    pub retryable_delay: Delay,
    /// Maximum number of events per batch.
    pub max_batch_count: usize,
    /// Maximum batch size in bytes, overhead included.
    pub max_batch_size: usize,
    /// Treat "data already accepted" send failures as delivered.
    pub ignore_data_already_accepted: bool,
    /// Requeue and resend a batch rejected for an invalid sequence token.
    pub retry_on_invalid_sequence_token: bool,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            group_id: String::new(),
            stream_id: String::new(),
            write_interval: Delay::Immediate,
            retryable_max: constants::DEFAULT_RETRYABLE_MAX,
            retryable_delay: Delay::from_millis(constants::DEFAULT_RETRYABLE_DELAY_MS),
            max_batch_count: constants::MAX_BATCH_COUNT,
            max_batch_size: constants::MAX_BATCH_SIZE_BYTES,
            ignore_data_already_accepted: false,
            retry_on_invalid_sequence_token: false,
        }
    }
}

impl ShipperConfig {
    #[must_use]
    pub fn new(group_id: impl Into<String>, stream_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            stream_id: stream_id.into(),
            ..Default::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// Unset variables keep their defaults; set but malformed variables are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(group_id) = env::var("LOGSTREAM_GROUP_ID") {
            config.group_id = group_id;
        }
        if let Ok(stream_id) = env::var("LOGSTREAM_STREAM_ID") {
            config.stream_id = stream_id;
        }
        if let Ok(value) = env::var("LOGSTREAM_WRITE_INTERVAL") {
            config.write_interval = Delay::parse("write_interval", &value)?;
        }
        if let Ok(value) = env::var("LOGSTREAM_RETRYABLE_DELAY") {
            config.retryable_delay = Delay::parse("retryable_delay", &value)?;
        }
        if let Ok(value) = env::var("LOGSTREAM_RETRYABLE_MAX") {
            config.retryable_max = parse_number("retryable_max", &value)?;
        }
        if let Ok(value) = env::var("LOGSTREAM_MAX_BATCH_COUNT") {
            config.max_batch_count = parse_number("max_batch_count", &value)?;
        }
        if let Ok(value) = env::var("LOGSTREAM_MAX_BATCH_SIZE") {
            config.max_batch_size = parse_number("max_batch_size", &value)?;
        }
        if let Ok(value) = env::var("LOGSTREAM_IGNORE_DATA_ALREADY_ACCEPTED") {
            config.ignore_data_already_accepted = value.eq_ignore_ascii_case("true");
        }
        if let Ok(value) = env::var("LOGSTREAM_RETRY_ON_INVALID_SEQUENCE_TOKEN") {
            config.retry_on_invalid_sequence_token = value.eq_ignore_ascii_case("true");
        }

        config.validate()?;
        debug!("SHIPPER | Loaded shipper configuration from environment: {config:?}");
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.group_id.trim().is_empty() {
            return Err(ConfigError::Empty("group_id"));
        }
        if self.stream_id.trim().is_empty() {
            return Err(ConfigError::Empty("stream_id"));
        }
        check_range(
            "max_batch_count",
            self.max_batch_count,
            constants::MIN_BATCH_COUNT,
            constants::MAX_BATCH_COUNT,
        )?;
        check_range(
            "max_batch_size",
            self.max_batch_size,
            constants::MIN_BATCH_SIZE_BYTES,
            constants::MAX_BATCH_SIZE_BYTES,
        )?;
        Ok(())
    }
}

fn check_range(
    field: &'static str,
    value: usize,
    min: usize,
    max: usize,
) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: value as u64,
            min: min as u64,
            max: max as u64,
        })
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// Decides whether a record is queued.
pub type FilterFn = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// Measures a message for batch size accounting, overhead excluded.
pub type MessageSizeFn = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Serializes a structured record into the event message.
pub type StringifyFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Overridable behaviors of the shipper.
#[derive(Clone)]
pub struct Strategies {
    pub filter: FilterFn,
    pub message_size: MessageSizeFn,
    pub stringify: StringifyFn,
    pub recovery: RecoveryHook,
}

impl Default for Strategies {
    fn default() -> Self {
        Self {
            filter: Arc::new(|record: &Record| !record.is_null()),
            message_size: Arc::new(utf16_len),
            stringify: Arc::new(stringify_json),
            recovery: Arc::new(fail_on_error),
        }
    }
}

impl Strategies {
    #[must_use]
    pub fn with_filter(mut self, filter: impl Fn(&Record) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    #[must_use]
    pub fn with_message_size(
        mut self,
        message_size: impl Fn(&str) -> usize + Send + Sync + 'static,
    ) -> Self {
        self.message_size = Arc::new(message_size);
        self
    }

    #[must_use]
    pub fn with_stringify(
        mut self,
        stringify: impl Fn(&Value) -> String + Send + Sync + 'static,
    ) -> Self {
        self.stringify = Arc::new(stringify);
        self
    }

    #[must_use]
    pub fn with_recovery(mut self, recovery: RecoveryHook) -> Self {
        self.recovery = recovery;
        self
    }
}

impl Debug for Strategies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Strategies")
    }
}

/// Default message size: UTF-16 code units.
///
/// This undercounts messages with multi-byte characters compared to their
/// encoded size on the wire.
#[must_use]
pub fn utf16_len(message: &str) -> usize {
    message.encode_utf16().count()
}
