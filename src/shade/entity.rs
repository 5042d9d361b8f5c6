// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Cover entity actor of a PowerView shade.

use crate::errors::ServiceError;
use crate::host::{
    CallEntity, EntityCommand, EntityState, EntityType, HostContext, Refresh, Shutdown,
    cmd_from_str,
};
use crate::shade::client::{HubInfo, PowerviewApi, RawShade};
use crate::shade::data::SharedShadeData;
use crate::shade::kind::{CoverFeature, ShadeKind, ShadeMove};
use crate::shade::position::{ShadePositions, transition_duration};
use crate::shade::timer::TransitionTimer;
use crate::util::{return_fut_err, try_fut};
use actix::prelude::{
    Actor, ActorContext, ActorFutureExt, AsyncContext, Context, Handler, Message,
    ResponseActFuture, WrapFuture,
};
use log::{debug, info, warn};
use serde_json::{Map, Value, json};
use std::rc::Rc;
use std::time::Duration;
use strum::{Display, EnumString, VariantNames};

/// Cover entity commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum CoverCommand {
    Open,
    Close,
    Stop,
    /// Params: `position`: 0..=100
    Position,
    OpenTilt,
    CloseTilt,
    StopTilt,
    /// Params: `tilt_position`: 0..=100
    TiltPosition,
}

impl From<CoverCommand> for CoverFeature {
    fn from(cmd: CoverCommand) -> Self {
        match cmd {
            CoverCommand::Open => CoverFeature::Open,
            CoverCommand::Close => CoverFeature::Close,
            CoverCommand::Stop => CoverFeature::Stop,
            CoverCommand::Position => CoverFeature::Position,
            CoverCommand::OpenTilt => CoverFeature::OpenTilt,
            CoverCommand::CloseTilt => CoverFeature::CloseTilt,
            CoverCommand::StopTilt => CoverFeature::StopTilt,
            CoverCommand::TiltPosition => CoverFeature::TiltPosition,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    Opening,
    Closing,
    Stopped,
}

/// Coordinator broadcast: new hub-wide shade data is available in the position cache.
#[derive(Debug, Clone, Copy, Message)]
#[rtype(result = "()")]
pub struct ShadeGroupUpdate;

/// Shared context of all shade entities of one hub.
#[derive(Clone)]
pub struct ShadeContext {
    pub api: Rc<dyn PowerviewApi>,
    pub data: SharedShadeData,
    pub host: HostContext,
    pub hub: HubInfo,
    /// Polling interval of hard-wired shades.
    pub poll_interval: Duration,
    /// Delay of the second refresh after a transition poll.
    pub resync_delay: Duration,
}

pub struct ShadeEntity {
    entity_id: String,
    entry_id: String,
    name: String,
    shade_id: u32,
    kind: ShadeKind,
    room_name: String,
    hard_wired: bool,
    features: Vec<CoverFeature>,
    available: bool,
    motion: Motion,
    timer: TransitionTimer,
    shared: ShadeContext,
}

impl ShadeEntity {
    pub fn new(
        entry_id: impl Into<String>,
        shade: &RawShade,
        kind: ShadeKind,
        room_name: impl Into<String>,
        shared: ShadeContext,
    ) -> Self {
        let (id_suffix, name_suffix) = kind.rail_suffix().unwrap_or_default();
        Self {
            entity_id: format!("cover.{}{id_suffix}", shade.id),
            entry_id: entry_id.into(),
            name: format!("{}{name_suffix}", shade.display_name()),
            shade_id: shade.id,
            kind,
            room_name: room_name.into(),
            hard_wired: shade.is_hard_wired(),
            features: kind.features(shared.hub.stop_supported()),
            available: true,
            motion: Motion::Stopped,
            timer: TransitionTimer::new(),
            shared,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn positions(&self) -> ShadePositions {
        self.shared.data.borrow().positions(self.shade_id)
    }

    fn entity_state(&self) -> EntityState {
        let positions = self.positions();
        let mut state = EntityState::new(
            &self.entity_id,
            EntityType::Cover,
            &self.entry_id,
            &self.name,
        );
        state.available = self.available;
        state.state = match self.motion {
            Motion::Opening => "opening",
            Motion::Closing => "closing",
            Motion::Stopped if self.kind.is_closed(&positions) => "closed",
            Motion::Stopped => "open",
        }
        .into();
        state.features = self.features.iter().map(ToString::to_string).collect();

        let mut attributes = Map::new();
        attributes.insert(
            "position".into(),
            json!(self.kind.current_position(&positions)),
        );
        if let Some(tilt) = self.kind.current_tilt_position(&positions) {
            attributes.insert("tilt_position".into(), json!(tilt));
        }
        attributes.insert("room_name".into(), Value::String(self.room_name.clone()));
        // the hub frequently reports wrong state for battery powered shades
        attributes.insert("assumed_state".into(), Value::Bool(!self.hard_wired));
        state.attributes = attributes;
        state
    }

    fn publish(&self) {
        self.shared.host.publish(self.entity_state());
    }

    fn cancel_scheduled_update(&mut self, ctx: &mut Context<Self>) {
        if let Some(handle) = self.timer.cancel() {
            ctx.cancel_future(handle);
        }
    }

    /// Schedule a forced refresh at the estimated end of the movement.
    fn schedule_update_for_transition(&mut self, steps: i32, ctx: &mut Context<Self>) {
        let delay = transition_duration(steps);
        debug!(
            "[{}] Estimated time to complete transition of {steps} steps: {}s",
            self.entity_id,
            delay.as_secs()
        );

        let handle = ctx.run_later(delay, |act, ctx| act.complete_scheduled_update(ctx));
        if let Some(previous) = self.timer.arm_transition(handle) {
            ctx.cancel_future(previous);
        }
    }

    fn complete_scheduled_update(&mut self, ctx: &mut Context<Self>) {
        if !self.timer.transition_fired() {
            return;
        }
        debug!("[{}] Processing scheduled update", self.entity_id);

        let refresh = self.force_refresh().map(|result, act, ctx| {
            if let Err(e) = result {
                warn!("[{}] Scheduled update failed: {e}", act.entity_id);
            }
            // a new movement may have been started in the meantime
            if act.timer.is_idle() {
                let delay = act.shared.resync_delay;
                let handle = ctx.run_later(delay, |act, ctx| act.force_resync(ctx));
                act.timer.arm_resync(handle);
            }
        });
        ctx.spawn(refresh);
    }

    /// Refresh again after a transition, since the hub may have reported stale state.
    fn force_resync(&mut self, ctx: &mut Context<Self>) {
        if !self.timer.resync_fired() {
            return;
        }
        debug!("[{}] Force resync", self.entity_id);
        let refresh = self.force_refresh().map(|result, act, _ctx| {
            if let Err(e) = result {
                warn!("[{}] Resync failed: {e}", act.entity_id);
            }
        });
        ctx.spawn(refresh);
    }

    /// Refresh the shade state, bypassing the hub's cached shade data.
    fn force_refresh(&mut self) -> ResponseActFuture<Self, Result<(), ServiceError>> {
        let api = self.shared.api.clone();
        let shade_id = self.shade_id;

        Box::pin(
            async move { api.refresh(shade_id).await }
                .into_actor(self)
                .map(|result, act, _ctx| -> Result<(), ServiceError> {
                    let shade = match result {
                        Ok(shade) => shade,
                        Err(e) => {
                            if act.available {
                                info!("[{}] Shade became unavailable: {e}", act.entity_id);
                                act.available = false;
                                act.publish();
                            }
                            return Err(e.into());
                        }
                    };
                    act.shared.data.borrow_mut().update_from_shade(&shade);
                    act.available = true;
                    act.motion = Motion::Stopped;
                    act.publish();
                    Ok(())
                }),
        )
    }

    /// Schedule the transition update, send the move request and process the response.
    fn execute_move(
        &mut self,
        steps: i32,
        shade_move: ShadeMove,
        motion: Option<Motion>,
        ctx: &mut Context<Self>,
    ) -> ResponseActFuture<Self, Result<(), ServiceError>> {
        self.schedule_update_for_transition(steps, ctx);

        let api = self.shared.api.clone();
        let shade_id = self.shade_id;
        let request = shade_move.request.clone();

        Box::pin(
            async move { api.move_shade(shade_id, &request).await }
                .into_actor(self)
                .map(move |result, act, _ctx| -> Result<(), ServiceError> {
                    let response = result?;
                    {
                        let mut data = act.shared.data.borrow_mut();
                        // positions we know will change, the hub won't return them
                        for (kind, position) in shade_move.new_positions {
                            data.set_position(act.shade_id, kind, position);
                        }
                        data.update_from_shade(&response);
                    }
                    if let Some(motion) = motion {
                        act.motion = motion;
                    }
                    act.publish();
                    Ok(())
                }),
        )
    }

    fn stop(&mut self, ctx: &mut Context<Self>) -> ResponseActFuture<Self, Result<(), ServiceError>> {
        self.cancel_scheduled_update(ctx);

        let api = self.shared.api.clone();
        let shade_id = self.shade_id;

        Box::pin(
            async move { api.stop(shade_id).await }
                .into_actor(self)
                .then(|result, act, _ctx| {
                    let refresh: ResponseActFuture<Self, Result<(), ServiceError>> = match result {
                        Ok(response) => {
                            act.shared.data.borrow_mut().update_from_shade(&response);
                            act.force_refresh()
                        }
                        Err(e) => Box::pin(actix::fut::ready(Err(ServiceError::from(e)))),
                    };
                    refresh
                }),
        )
    }

    fn handle_command(
        &mut self,
        cmd: EntityCommand,
        ctx: &mut Context<Self>,
    ) -> ResponseActFuture<Self, Result<(), ServiceError>> {
        let command: CoverCommand = try_fut!(cmd_from_str(&cmd.cmd_id));
        if !self.features.contains(&command.into()) {
            return_fut_err!(ServiceError::BadRequest(format!(
                "Command {command} not supported by {}",
                self.entity_id
            )));
        }

        let kind = self.kind;
        let positions = self.positions();
        let steps = kind.transition_steps(&positions);

        match command {
            CoverCommand::Open => {
                self.execute_move(100 - steps, kind.open_move(), Some(Motion::Opening), ctx)
            }
            CoverCommand::Close => {
                self.execute_move(steps, kind.close_move(), Some(Motion::Closing), ctx)
            }
            CoverCommand::Stop | CoverCommand::StopTilt => self.stop(ctx),
            CoverCommand::Position => {
                let target = try_fut!(cmd.percent_param("position"));
                let target = kind.clamp(target, &positions);
                let current = kind.current_position(&positions);
                let motion = if target > current {
                    Motion::Opening
                } else if target < current {
                    Motion::Closing
                } else {
                    Motion::Stopped
                };
                let steps = (current as i32 - target as i32).abs();
                self.execute_move(
                    steps,
                    kind.position_move(target, &positions),
                    Some(motion),
                    ctx,
                )
            }
            CoverCommand::OpenTilt => {
                let shade_move = try_fut!(tilt_move(kind.open_tilt_move()));
                self.execute_move(100 - steps, shade_move, None, ctx)
            }
            CoverCommand::CloseTilt => {
                let shade_move = try_fut!(tilt_move(kind.close_tilt_move()));
                self.execute_move(steps, shade_move, None, ctx)
            }
            CoverCommand::TiltPosition => {
                let target = try_fut!(cmd.percent_param("tilt_position"));
                let final_position = kind.current_position(&positions) as i32 + target as i32;
                let shade_move = try_fut!(tilt_move(kind.tilt_move(target)));
                self.execute_move((steps - final_position).abs(), shade_move, None, ctx)
            }
        }
    }
}

fn tilt_move(shade_move: Option<ShadeMove>) -> Result<ShadeMove, ServiceError> {
    shade_move.ok_or_else(|| ServiceError::BadRequest("Shade doesn't support tilting".into()))
}

impl Actor for ShadeEntity {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        debug!("[{}] started: {:?}", self.entity_id, self.kind);
        self.publish();

        // battery powered shades must not be polled, it would drain their batteries in days
        if self.hard_wired {
            ctx.run_interval(self.shared.poll_interval, |act, ctx| {
                ctx.notify(Refresh);
                debug!("[{}] polling shade state", act.entity_id);
            });
        }
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        self.cancel_scheduled_update(ctx);
        debug!("[{}] stopped", self.entity_id);
    }
}

impl Handler<CallEntity> for ShadeEntity {
    type Result = ResponseActFuture<Self, Result<(), ServiceError>>;

    fn handle(&mut self, msg: CallEntity, ctx: &mut Self::Context) -> Self::Result {
        debug!("[{}] command: {}", self.entity_id, msg.0.cmd_id);
        self.handle_command(msg.0, ctx)
    }
}

impl Handler<Refresh> for ShadeEntity {
    type Result = ResponseActFuture<Self, Result<(), ServiceError>>;

    fn handle(&mut self, _: Refresh, _ctx: &mut Self::Context) -> Self::Result {
        if self.timer.in_progress() {
            // the update will likely time out while a movement is in progress
            debug!("[{}] skipping refresh: transition in progress", self.entity_id);
            return Box::pin(actix::fut::ready(Ok(())));
        }
        self.force_refresh()
    }
}

impl Handler<ShadeGroupUpdate> for ShadeEntity {
    type Result = ();

    fn handle(&mut self, _: ShadeGroupUpdate, _ctx: &mut Self::Context) -> Self::Result {
        if self.timer.in_progress() {
            // the group data is stale while a transition is in progress
            return;
        }
        if self
            .shared
            .data
            .borrow_mut()
            .update_from_group_data(self.shade_id)
        {
            self.publish();
        }
    }
}

impl Handler<Shutdown> for ShadeEntity {
    type Result = ();

    fn handle(&mut self, _: Shutdown, ctx: &mut Self::Context) -> Self::Result {
        ctx.stop();
    }
}
