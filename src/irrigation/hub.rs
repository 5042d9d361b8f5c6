// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Webhook receiver of a Rachio entry, dispatching push events to the controller switches.

use crate::errors::ServiceError;
use crate::host::{Shutdown, WebhookReceived};
use crate::irrigation::webhook::{ControllerEvent, WebhookEvent};
use actix::prelude::{Actor, ActorContext, Context, Handler, Recipient};
use log::{debug, warn};
use std::collections::HashMap;

pub struct IrrigationHub {
    entry_id: String,
    /// Auth token of the current session, part of the webhook external id.
    token: String,
    /// Switches by controller id.
    controllers: HashMap<String, Vec<Recipient<ControllerEvent>>>,
}

impl IrrigationHub {
    pub fn new(entry_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            token: token.into(),
            controllers: HashMap::new(),
        }
    }

    pub fn add_listener(&mut self, controller_id: &str, listener: Recipient<ControllerEvent>) {
        self.controllers
            .entry(controller_id.to_string())
            .or_default()
            .push(listener);
    }
}

impl Actor for IrrigationHub {
    type Context = Context<Self>;
}

impl Handler<WebhookReceived> for IrrigationHub {
    type Result = Result<(), ServiceError>;

    fn handle(&mut self, msg: WebhookReceived, _ctx: &mut Self::Context) -> Self::Result {
        let event: WebhookEvent = serde_json::from_value(msg.payload)
            .map_err(|e| ServiceError::BadRequest(format!("Invalid webhook payload: {e}")))?;

        if !event.is_authorized(&self.token) {
            warn!(
                "[{}] Rejected webhook event with invalid external id",
                self.entry_id
            );
            return Err(ServiceError::Unauthorized("Invalid webhook token".into()));
        }

        let Some(update) = event.update() else {
            debug!(
                "[{}] Ignoring event {} {}",
                self.entry_id, event.event_type, event.sub_type
            );
            return Ok(());
        };

        match self.controllers.get(&event.device_id) {
            Some(listeners) => {
                for listener in listeners {
                    listener.do_send(ControllerEvent(update.clone()));
                }
            }
            None => debug!(
                "[{}] Event for unknown controller {}",
                self.entry_id, event.device_id
            ),
        }
        Ok(())
    }
}

impl Handler<Shutdown> for IrrigationHub {
    type Result = ();

    fn handle(&mut self, _: Shutdown, ctx: &mut Self::Context) -> Self::Result {
        ctx.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::IrrigationHub;
    use crate::errors::ServiceError;
    use crate::host::WebhookReceived;
    use crate::irrigation::webhook::{ControllerEvent, ControllerUpdate};
    use actix::prelude::{Actor, Context, Handler, Message};
    use serde_json::json;

    #[derive(Default)]
    struct Listener {
        events: Vec<ControllerUpdate>,
    }

    impl Actor for Listener {
        type Context = Context<Self>;
    }

    impl Handler<ControllerEvent> for Listener {
        type Result = ();

        fn handle(&mut self, msg: ControllerEvent, _ctx: &mut Self::Context) -> Self::Result {
            self.events.push(msg.0);
        }
    }

    #[derive(Message)]
    #[rtype(result = "Vec<ControllerUpdate>")]
    struct TakeEvents;

    impl Handler<TakeEvents> for Listener {
        type Result = Vec<ControllerUpdate>;

        fn handle(&mut self, _: TakeEvents, _ctx: &mut Self::Context) -> Self::Result {
            std::mem::take(&mut self.events)
        }
    }

    fn webhook(external_id: &str, device_id: &str) -> WebhookReceived {
        WebhookReceived {
            webhook_id: "hook".into(),
            payload: json!({
                "externalId": external_id,
                "type": "DEVICE_STATUS",
                "subType": "SLEEP_MODE_ON",
                "deviceId": device_id
            }),
        }
    }

    #[actix::test]
    async fn event_is_dispatched_to_controller_switches() {
        let c1 = Listener::default().start();
        let c2 = Listener::default().start();
        let mut hub = IrrigationHub::new("r1", "secret");
        hub.add_listener("c1", c1.clone().recipient());
        hub.add_listener("c2", c2.clone().recipient());
        let hub = hub.start();

        hub.send(webhook("intg-vendors.rachio:secret", "c1"))
            .await
            .expect("hub running")
            .expect("event accepted");

        assert_eq!(
            vec![ControllerUpdate::Standby(true)],
            c1.send(TakeEvents).await.expect("listener running")
        );
        assert!(c2.send(TakeEvents).await.expect("listener running").is_empty());
    }

    #[actix::test]
    async fn invalid_token_is_unauthorized() {
        let c1 = Listener::default().start();
        let mut hub = IrrigationHub::new("r1", "secret");
        hub.add_listener("c1", c1.clone().recipient());
        let hub = hub.start();

        let result = hub
            .send(webhook("intg-vendors.rachio:guess", "c1"))
            .await
            .expect("hub running");

        assert!(matches!(result, Err(ServiceError::Unauthorized(_))));
        assert!(c1.send(TakeEvents).await.expect("listener running").is_empty());
    }

    #[actix::test]
    async fn malformed_payload_is_bad_request() {
        let hub = IrrigationHub::new("r1", "secret").start();

        let result = hub
            .send(WebhookReceived {
                webhook_id: "hook".into(),
                payload: json!({ "subType": "ONLINE" }),
            })
            .await
            .expect("hub running");

        assert!(matches!(result, Err(ServiceError::BadRequest(_))));
    }
}
