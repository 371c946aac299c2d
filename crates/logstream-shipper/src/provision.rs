// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sequence token handshake with lazy creation of the group and stream.
//!
//! ```text
//!   query token ──ok──────────────────────────────> token
//!        │
//!        ├─ group missing ─> create group ─> create stream ─┐
//!        ├─ stream missing ─────────────────> create stream ─┤
//!        │                                                   v
//!        │                                           query token again
//!        └─ other error ─────────────────────────────> ShipError
//! ```
//!
//! Provisioning runs at most once per handshake: a resource still reported
//! missing after being created is a query failure.

use tracing::debug;

use crate::client::{LogStreamClient, QueryError, SequenceToken};
use crate::error::{DestinationError, DestinationErrorKind, ShipError};
use crate::notification::{Notification, Notifier};

pub(crate) async fn acquire_token(
    client: &dyn LogStreamClient,
    group_id: &str,
    stream_id: &str,
    notifier: &Notifier,
) -> Result<SequenceToken, ShipError> {
    let mut provisioned = false;

    loop {
        let missing = match client.query_stream_token(group_id, stream_id).await {
            Ok(token) => {
                debug!(
                    "SHIPPER | Acquired sequence token for {group_id}/{stream_id}: {:?}",
                    token.as_str()
                );
                return Ok(token);
            }
            Err(QueryError::Destination(source)) => {
                return Err(ShipError::TokenQuery {
                    group_id: group_id.to_string(),
                    stream_id: stream_id.to_string(),
                    source,
                });
            }
            Err(missing) => missing,
        };

        if provisioned {
            return Err(ShipError::TokenQuery {
                group_id: group_id.to_string(),
                stream_id: stream_id.to_string(),
                source: DestinationError::new(
                    DestinationErrorKind::ResourceNotFound,
                    format!("{missing:?} after provisioning"),
                ),
            });
        }

        if missing == QueryError::GroupNotFound {
            create_group(client, group_id, notifier).await?;
        }
        create_stream(client, group_id, stream_id, notifier).await?;
        provisioned = true;
    }
}

async fn create_group(
    client: &dyn LogStreamClient,
    group_id: &str,
    notifier: &Notifier,
) -> Result<(), ShipError> {
    match client.create_group(group_id).await {
        Ok(()) => {
            debug!("SHIPPER | Created log group {group_id}");
            notifier.notify(Notification::GroupCreated {
                group_id: group_id.to_string(),
            });
            Ok(())
        }
        Err(e) if e.kind == DestinationErrorKind::ResourceAlreadyExists => {
            debug!("SHIPPER | Log group {group_id} already exists");
            Ok(())
        }
        Err(source) => Err(ShipError::CreateGroup {
            group_id: group_id.to_string(),
            source,
        }),
    }
}

async fn create_stream(
    client: &dyn LogStreamClient,
    group_id: &str,
    stream_id: &str,
    notifier: &Notifier,
) -> Result<(), ShipError> {
    match client.create_stream(group_id, stream_id).await {
        Ok(()) => {
            debug!("SHIPPER | Created log stream {group_id}/{stream_id}");
            notifier.notify(Notification::StreamCreated {
                group_id: group_id.to_string(),
                stream_id: stream_id.to_string(),
            });
            Ok(())
        }
        Err(e) if e.kind == DestinationErrorKind::ResourceAlreadyExists => {
            debug!("SHIPPER | Log stream {group_id}/{stream_id} already exists");
            Ok(())
        }
        Err(source) => Err(ShipError::CreateStream {
            group_id: group_id.to_string(),
            stream_id: stream_id.to_string(),
            source,
        }),
    }
}
