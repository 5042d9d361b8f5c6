// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Alarm control panel entity actor.

use crate::alarm::client::{AlarmDevice, HiveApi};
use crate::errors::ServiceError;
use crate::host::{
    CallEntity, EntityState, EntityType, HostContext, Refresh, Shutdown, cmd_from_str,
};
use crate::util::try_fut;
use actix::prelude::{
    Actor, ActorContext, ActorFutureExt, AsyncContext, Context, Handler, ResponseActFuture,
    WrapFuture,
};
use log::{debug, info, warn};
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;
use strum::{Display, EnumString, VariantNames};

/// Hive alarm modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AlarmMode {
    Home,
    Asleep,
    Away,
}

/// Alarm control panel states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AlarmState {
    Disarmed,
    ArmedNight,
    ArmedAway,
    Triggered,
    Unknown,
}

impl From<AlarmMode> for AlarmState {
    fn from(mode: AlarmMode) -> Self {
        match mode {
            AlarmMode::Home => AlarmState::Disarmed,
            AlarmMode::Asleep => AlarmState::ArmedNight,
            AlarmMode::Away => AlarmState::ArmedAway,
        }
    }
}

/// Alarm control panel commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum AlarmCommand {
    Disarm,
    ArmNight,
    ArmAway,
}

impl AlarmCommand {
    pub fn mode(self) -> AlarmMode {
        match self {
            AlarmCommand::Disarm => AlarmMode::Home,
            AlarmCommand::ArmNight => AlarmMode::Asleep,
            AlarmCommand::ArmAway => AlarmMode::Away,
        }
    }
}

/// Map the reported device data to the panel state. The triggered flag overrides any mode.
///
/// Returns `None` for an unknown mode.
pub fn alarm_state(device: &AlarmDevice) -> Option<AlarmState> {
    if device.triggered {
        return Some(AlarmState::Triggered);
    }
    AlarmMode::from_str(&device.mode).ok().map(AlarmState::from)
}

pub const ALARM_FEATURES: [&str; 2] = ["arm_night", "arm_away"];

pub struct AlarmEntity {
    entity_id: String,
    entry_id: String,
    name: String,
    device_id: String,
    available: bool,
    state: AlarmState,
    api: Rc<dyn HiveApi>,
    host: HostContext,
    scan_interval: Duration,
}

impl AlarmEntity {
    pub fn new(
        entry_id: impl Into<String>,
        device: &AlarmDevice,
        api: Rc<dyn HiveApi>,
        host: HostContext,
        scan_interval: Duration,
    ) -> Self {
        Self {
            entity_id: format!("alarm_control_panel.{}", device.id),
            entry_id: entry_id.into(),
            name: device.name.clone(),
            device_id: device.id.clone(),
            available: device.online,
            state: AlarmState::Unknown,
            api,
            host,
            scan_interval,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn publish(&self) {
        let mut state = EntityState::new(
            &self.entity_id,
            EntityType::AlarmControlPanel,
            &self.entry_id,
            &self.name,
        );
        state.available = self.available;
        state.state = self.state.to_string();
        state.features = ALARM_FEATURES.iter().map(|f| f.to_string()).collect();
        self.host.publish(state);
    }

    fn update_from_device(&mut self, device: &AlarmDevice) {
        self.available = device.online;
        if !self.available {
            return;
        }
        self.state = match alarm_state(device) {
            Some(state) => state,
            None => {
                warn!("[{}] Unknown alarm mode: {}", self.entity_id, device.mode);
                AlarmState::Unknown
            }
        };
    }
}

impl Actor for AlarmEntity {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        debug!("[{}] started", self.entity_id);
        ctx.notify(Refresh);
        ctx.run_interval(self.scan_interval, |_, ctx| ctx.notify(Refresh));
    }
}

impl Handler<CallEntity> for AlarmEntity {
    type Result = ResponseActFuture<Self, Result<(), ServiceError>>;

    fn handle(&mut self, msg: CallEntity, _ctx: &mut Self::Context) -> Self::Result {
        let command: AlarmCommand = try_fut!(cmd_from_str(&msg.0.cmd_id));
        let mode = command.mode();
        info!("[{}] {command}: set mode {mode}", self.entity_id);

        let api = self.api.clone();
        let device_id = self.device_id.clone();
        Box::pin(
            async move { api.set_mode(&device_id, &mode.to_string()).await }
                .into_actor(self)
                .map(|result, _act, _ctx| result.map_err(ServiceError::from)),
        )
    }
}

impl Handler<Refresh> for AlarmEntity {
    type Result = ResponseActFuture<Self, Result<(), ServiceError>>;

    fn handle(&mut self, _: Refresh, _ctx: &mut Self::Context) -> Self::Result {
        let api = self.api.clone();
        let device_id = self.device_id.clone();
        Box::pin(
            async move { api.get_alarm(&device_id).await }
                .into_actor(self)
                .map(|result, act, _ctx| -> Result<(), ServiceError> {
                    match result {
                        Ok(device) => act.update_from_device(&device),
                        Err(e) => {
                            warn!("[{}] Update failed: {e}", act.entity_id);
                            act.available = false;
                            act.publish();
                            return Err(e.into());
                        }
                    }
                    act.publish();
                    Ok(())
                }),
        )
    }
}

impl Handler<Shutdown> for AlarmEntity {
    type Result = ();

    fn handle(&mut self, _: Shutdown, ctx: &mut Self::Context) -> Self::Result {
        ctx.stop();
    }
}
