// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Entity state store and routing of entity commands and webhook events.

use crate::controller::{Controller, EntryLifecycleState, GetEntityState, GetStates};
use crate::errors::ServiceError;
use crate::host::{CallEntity, EntityState, StateChanged, WebhookReceived};
use actix::{Handler, MessageResult, ResponseFuture, fut};
use log::debug;

impl Handler<StateChanged> for Controller {
    type Result = ();

    fn handle(&mut self, msg: StateChanged, _ctx: &mut Self::Context) -> Self::Result {
        let state = msg.0;
        // entities publish their initial state while the setup is still in progress
        let active = self.entries.get(&state.entry_id).is_some_and(|e| {
            matches!(
                e.machine.state(),
                EntryLifecycleState::SetupInProgress | EntryLifecycleState::Loaded
            )
        });
        if !active {
            debug!(
                "[{}] Ignoring state of inactive entry: {}",
                state.entry_id, state.entity_id
            );
            return;
        }
        self.states.insert(state.entity_id.clone(), state);
    }
}

impl Handler<GetStates> for Controller {
    type Result = MessageResult<GetStates>;

    fn handle(&mut self, _: GetStates, _ctx: &mut Self::Context) -> Self::Result {
        let mut states: Vec<EntityState> = self.states.values().cloned().collect();
        states.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        MessageResult(states)
    }
}

impl Handler<GetEntityState> for Controller {
    type Result = Result<EntityState, ServiceError>;

    fn handle(&mut self, msg: GetEntityState, _ctx: &mut Self::Context) -> Self::Result {
        self.states
            .get(&msg.entity_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Unknown entity: {}", msg.entity_id)))
    }
}

/// Forward an entity command to the entity actor.
impl Handler<CallEntity> for Controller {
    type Result = ResponseFuture<Result<(), ServiceError>>;

    fn handle(&mut self, msg: CallEntity, _ctx: &mut Self::Context) -> Self::Result {
        let Some(entity) = self.runtime.entity(&msg.0.entity_id) else {
            return Box::pin(fut::ready(Err(ServiceError::NotFound(format!(
                "Unknown entity: {}",
                msg.0.entity_id
            )))));
        };
        debug!("[{}] command: {}", msg.0.entity_id, msg.0.cmd_id);
        let recipient = entity.call.clone();
        Box::pin(async move { recipient.send(msg).await? })
    }
}

/// Forward a vendor webhook event to the receiver registered for the webhook id.
impl Handler<WebhookReceived> for Controller {
    type Result = ResponseFuture<Result<(), ServiceError>>;

    fn handle(&mut self, msg: WebhookReceived, _ctx: &mut Self::Context) -> Self::Result {
        let Some(receiver) = self.runtime.webhook(&msg.webhook_id) else {
            return Box::pin(fut::ready(Err(ServiceError::NotFound(format!(
                "Unknown webhook: {}",
                msg.webhook_id
            )))));
        };
        let receiver = receiver.clone();
        Box::pin(async move { receiver.send(msg).await? })
    }
}
