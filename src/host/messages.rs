// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Actix messages between the host controller and the integration actors.

use crate::errors::ServiceError;
use crate::host::EntityState;
use actix::dev::ToEnvelope;
use actix::prelude::{Actor, Addr, Handler, Message, Recipient};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Entity state update published by an entity actor.
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct StateChanged(pub EntityState);

/// Command for an entity, e.g. `open` for a cover or `arm_away` for an alarm panel.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityCommand {
    #[serde(default)]
    pub entity_id: String,
    pub cmd_id: String,
    pub params: Option<Map<String, Value>>,
}

impl EntityCommand {
    pub fn new(entity_id: impl Into<String>, cmd_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            cmd_id: cmd_id.into(),
            params: None,
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Get a required percentage parameter in the range 0..=100.
    pub fn percent_param(&self, key: &str) -> Result<u8, ServiceError> {
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| ServiceError::BadRequest("Missing params object".into()))?;
        match params.get(key).and_then(|v| v.as_u64()) {
            Some(value @ 0..=100) => Ok(value as u8),
            Some(value) => Err(ServiceError::BadRequest(format!(
                "Invalid {key} value: {value}. Valid range: 0..100"
            ))),
            None => Err(ServiceError::BadRequest(format!("Missing param: {key}"))),
        }
    }
}

/// Call a command on an entity actor.
#[derive(Debug, Message)]
#[rtype(result = "Result<(), ServiceError>")]
pub struct CallEntity(pub EntityCommand);

/// Force an entity to refresh its state from the vendor.
#[derive(Debug, Default, Message)]
#[rtype(result = "Result<(), ServiceError>")]
pub struct Refresh;

/// Stop an integration actor when its configuration entry is unloaded.
#[derive(Debug, Default, Message)]
#[rtype(result = "()")]
pub struct Shutdown;

/// Webhook push message from a vendor cloud.
#[derive(Debug, Message)]
#[rtype(result = "Result<(), ServiceError>")]
pub struct WebhookReceived {
    pub webhook_id: String,
    pub payload: Value,
}

/// Host side functionality available to the integrations.
#[derive(Clone)]
pub struct HostContext {
    state_sink: Recipient<StateChanged>,
}

impl HostContext {
    pub fn new(state_sink: Recipient<StateChanged>) -> Self {
        Self { state_sink }
    }

    /// Publish a new entity state to the host. Best-effort only.
    pub fn publish(&self, state: EntityState) {
        self.state_sink.do_send(StateChanged(state));
    }
}

/// Address of a started entity actor.
#[derive(Clone)]
pub struct EntityHandle {
    pub entity_id: String,
    pub call: Recipient<CallEntity>,
    pub shutdown: Recipient<Shutdown>,
}

impl EntityHandle {
    pub fn new<A>(entity_id: impl Into<String>, addr: &Addr<A>) -> Self
    where
        A: Actor + Handler<CallEntity> + Handler<Shutdown>,
        A::Context: ToEnvelope<A, CallEntity> + ToEnvelope<A, Shutdown>,
    {
        Self {
            entity_id: entity_id.into(),
            call: addr.clone().recipient(),
            shutdown: addr.clone().recipient(),
        }
    }
}

/// Parse an entity command identifier into the entity specific command enum.
pub fn cmd_from_str<T: std::str::FromStr + strum::VariantNames>(
    cmd: &str,
) -> Result<T, ServiceError> {
    T::from_str(cmd).map_err(|_| {
        ServiceError::BadRequest(format!(
            "Invalid cmd_id: {cmd}. Valid commands: {}",
            T::VARIANTS.to_vec().join(",")
        ))
    })
}
