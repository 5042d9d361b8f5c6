// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Switch entities of a Rachio controller: standby mode and manual zone runs.

use crate::errors::ServiceError;
use crate::host::{CallEntity, EntityState, EntityType, HostContext, Shutdown, cmd_from_str};
use crate::irrigation::client::{RachioApi, RachioController, RachioZone};
use crate::irrigation::webhook::{ControllerEvent, ControllerUpdate};
use crate::util::try_fut;
use actix::prelude::{
    Actor, ActorContext, ActorFutureExt, Context, Handler, ResponseActFuture, WrapFuture,
};
use log::{debug, info};
use serde_json::Value;
use std::rc::Rc;
use std::time::Duration;
use strum::{Display, EnumString, VariantNames};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum SwitchCommand {
    TurnOn,
    TurnOff,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwitchKind {
    /// On while the controller is in standby mode.
    Standby,
    /// On while the zone is watering.
    Zone { zone_id: String, zone_number: u32 },
}

pub struct RachioSwitch {
    entity_id: String,
    entry_id: String,
    name: String,
    controller_id: String,
    kind: SwitchKind,
    available: bool,
    is_on: bool,
    manual_run: Duration,
    api: Rc<dyn RachioApi>,
    host: HostContext,
}

impl RachioSwitch {
    pub fn standby(
        entry_id: impl Into<String>,
        controller: &RachioController,
        api: Rc<dyn RachioApi>,
        host: HostContext,
    ) -> Self {
        Self {
            entity_id: format!("switch.{}_standby", controller.id),
            entry_id: entry_id.into(),
            name: format!("{} in standby mode", controller.name),
            controller_id: controller.id.clone(),
            kind: SwitchKind::Standby,
            available: controller.is_online(),
            is_on: !controller.on,
            manual_run: Duration::ZERO,
            api,
            host,
        }
    }

    /// Zone switch. `watering` is the zone's current run state.
    pub fn zone(
        entry_id: impl Into<String>,
        controller: &RachioController,
        zone: &RachioZone,
        watering: bool,
        manual_run: Duration,
        api: Rc<dyn RachioApi>,
        host: HostContext,
    ) -> Self {
        Self {
            entity_id: format!("switch.{}", zone.id),
            entry_id: entry_id.into(),
            name: zone.name.clone(),
            controller_id: controller.id.clone(),
            kind: SwitchKind::Zone {
                zone_id: zone.id.clone(),
                zone_number: zone.zone_number,
            },
            available: controller.is_online(),
            is_on: watering,
            manual_run,
            api,
            host,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn publish(&self) {
        let mut state =
            EntityState::new(&self.entity_id, EntityType::Switch, &self.entry_id, &self.name);
        state.available = self.available;
        state.state = if self.is_on { "on" } else { "off" }.to_string();
        state.features = SwitchCommand::VARIANTS
            .iter()
            .map(|f| f.to_string())
            .collect();
        if let SwitchKind::Zone { zone_number, .. } = &self.kind {
            state
                .attributes
                .insert("zone_number".into(), Value::from(*zone_number));
        }
        self.host.publish(state);
    }

    /// Apply a controller update. Returns true if the switch state changed.
    fn apply(&mut self, update: &ControllerUpdate) -> bool {
        let (field, value) = match (update, &self.kind) {
            (ControllerUpdate::Online(online), _) => (&mut self.available, *online),
            (ControllerUpdate::Standby(on), SwitchKind::Standby) => (&mut self.is_on, *on),
            (
                ControllerUpdate::Zone { zone_id, watering },
                SwitchKind::Zone {
                    zone_id: own_zone, ..
                },
            ) if zone_id == own_zone => (&mut self.is_on, *watering),
            _ => return false,
        };
        let changed = *field != value;
        *field = value;
        changed
    }
}

impl Actor for RachioSwitch {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        debug!("[{}] started", self.entity_id);
        self.publish();
    }
}

impl Handler<CallEntity> for RachioSwitch {
    type Result = ResponseActFuture<Self, Result<(), ServiceError>>;

    fn handle(&mut self, msg: CallEntity, _ctx: &mut Self::Context) -> Self::Result {
        let command: SwitchCommand = try_fut!(cmd_from_str(&msg.0.cmd_id));
        info!("[{}] {command}", self.entity_id);

        let api = self.api.clone();
        let controller_id = self.controller_id.clone();
        let kind = self.kind.clone();
        let manual_run = self.manual_run;
        Box::pin(
            async move {
                match (kind, command) {
                    // standby mode is the controller's "off" state
                    (SwitchKind::Standby, SwitchCommand::TurnOn) => {
                        api.device_off(&controller_id).await
                    }
                    (SwitchKind::Standby, SwitchCommand::TurnOff) => {
                        api.device_on(&controller_id).await
                    }
                    (SwitchKind::Zone { zone_id, .. }, SwitchCommand::TurnOn) => {
                        api.start_zone(&zone_id, manual_run).await
                    }
                    (SwitchKind::Zone { .. }, SwitchCommand::TurnOff) => {
                        api.stop_water(&controller_id).await
                    }
                }
            }
            .into_actor(self)
            .map(move |result, act, _ctx| -> Result<(), ServiceError> {
                result?;
                act.is_on = command == SwitchCommand::TurnOn;
                act.publish();
                Ok(())
            }),
        )
    }
}

impl Handler<ControllerEvent> for RachioSwitch {
    type Result = ();

    fn handle(&mut self, msg: ControllerEvent, _ctx: &mut Self::Context) -> Self::Result {
        if self.apply(&msg.0) {
            debug!("[{}] {:?}", self.entity_id, msg.0);
            self.publish();
        }
    }
}

impl Handler<Shutdown> for RachioSwitch {
    type Result = ();

    fn handle(&mut self, _: Shutdown, ctx: &mut Self::Context) -> Self::Result {
        ctx.stop();
    }
}
