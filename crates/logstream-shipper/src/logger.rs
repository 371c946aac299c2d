// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Console output for the shipper's own diagnostics.
//!
//! A host writing its application logs through the shipper usually also
//! prints the shipper's diagnostics to the same console. Every line gets a
//! fixed prefix so those lines are easy to tell apart (and to exclude from
//! shipping). Messages carry their own module tag after it:
//!
//! ```text
//! LOGSTREAM | LEVEL | [span_name{span_fields}:] SHIPPER | message {event_fields}
//! ```
//!
//! [`init`] installs the formatter as the global subscriber. Hosts that
//! already configure `tracing` can use [`Formatter`] with their own builder.

use std::fmt;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Level;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields, MakeWriter,
};
use tracing_subscriber::registry::LookupSpan;

/// Line prefix identifying shipper diagnostics.
pub const LOG_PREFIX: &str = "LOGSTREAM";

/// Subscriber printing events up to `max_level` with [`Formatter`] to `writer`.
pub fn subscriber<W>(max_level: Level, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .event_format(Formatter)
        .with_max_level(max_level)
        .with_writer(writer)
        .finish()
}

/// Installs a stderr [`subscriber`] as the global default.
///
/// Fails if the process already has a global subscriber.
pub fn init(max_level: Level) -> Result<(), SetGlobalDefaultError> {
    tracing::subscriber::set_global_default(subscriber(max_level, std::io::stderr))
}

#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        write!(&mut writer, "{LOG_PREFIX} | {} | ", metadata.level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}
