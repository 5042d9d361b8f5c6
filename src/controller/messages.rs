// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Actix message definitions used to communicate with the [`Controller`].
//!
//! Entity commands and webhook events are sent with the host messages
//! [`CallEntity`](crate::host::CallEntity) and [`WebhookReceived`](crate::host::WebhookReceived)
//! and routed to the owning integration actor.

#[allow(unused_imports)] // used for doc links
use crate::controller::Controller;
use crate::errors::ServiceError;
use crate::host::{Domain, EntityState};
use actix::prelude::Message;
use serde::Serialize;

/// Set up a configured entry. Also used to retry a failed setup.
#[derive(Debug, Message)]
#[rtype(result = "Result<(), ServiceError>")]
pub struct SetupEntry {
    pub entry_id: String,
}

/// Get the states of all entities.
#[derive(Debug, Default, Message)]
#[rtype(result = "Vec<EntityState>")]
pub struct GetStates;

#[derive(Debug, Message)]
#[rtype(result = "Result<EntityState, ServiceError>")]
pub struct GetEntityState {
    pub entity_id: String,
}

/// Configuration entry overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryInfo {
    pub entry_id: String,
    pub domain: Domain,
    pub title: String,
    /// Lifecycle state, e.g. `loaded` or `setup_retry`.
    pub state: &'static str,
    pub entities: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Message)]
#[rtype(result = "Vec<EntryInfo>")]
pub struct GetEntries;

/// Stop all entities of an entry. The entry stays configured.
#[derive(Debug, Message)]
#[rtype(result = "Result<(), ServiceError>")]
pub struct UnloadEntry {
    pub entry_id: String,
}

/// Unload and delete an entry, including external resources created for it.
#[derive(Debug, Message)]
#[rtype(result = "Result<(), ServiceError>")]
pub struct RemoveEntry {
    pub entry_id: String,
}
