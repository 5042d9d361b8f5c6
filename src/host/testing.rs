// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Test helpers for integration actor tests.

use crate::host::{EntityState, HostContext, StateChanged};
use actix::prelude::{Actor, Addr, Context, Handler, Message};

/// Collects all published entity states.
#[derive(Default)]
pub struct StateRecorder {
    states: Vec<EntityState>,
}

impl Actor for StateRecorder {
    type Context = Context<Self>;
}

impl Handler<StateChanged> for StateRecorder {
    type Result = ();

    fn handle(&mut self, msg: StateChanged, _ctx: &mut Self::Context) -> Self::Result {
        self.states.push(msg.0);
    }
}

/// Take all states recorded so far.
///
/// Messages are processed in order, so all states published before this message was sent are
/// included.
#[derive(Message)]
#[rtype(result = "Vec<EntityState>")]
pub struct TakeStates;

impl Handler<TakeStates> for StateRecorder {
    type Result = Vec<EntityState>;

    fn handle(&mut self, _: TakeStates, _ctx: &mut Self::Context) -> Self::Result {
        std::mem::take(&mut self.states)
    }
}

pub fn recording_host() -> (HostContext, Addr<StateRecorder>) {
    let recorder = StateRecorder::default().start();
    (HostContext::new(recorder.clone().recipient()), recorder)
}

/// Take the last recorded state of the given entity.
pub async fn last_state(recorder: &Addr<StateRecorder>, entity_id: &str) -> Option<EntityState> {
    recorder
        .send(TakeStates)
        .await
        .expect("recorder running")
        .into_iter()
        .rev()
        .find(|s| s.entity_id == entity_id)
}
