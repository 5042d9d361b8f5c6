// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Hub-wide shade data update coordinator.

use crate::errors::VendorError;
use crate::host::Shutdown;
use crate::shade::client::PowerviewApi;
use crate::shade::data::SharedShadeData;
use crate::shade::entity::ShadeGroupUpdate;
use actix::prelude::{
    Actor, ActorContext, ActorFutureExt, AsyncContext, Context, Handler, Message, Recipient,
    ResponseActFuture, WrapFuture,
};
use log::{debug, warn};
use std::rc::Rc;
use std::time::Duration;

/// Fetch the data of all shades from the hub.
#[derive(Debug, Default, Message)]
#[rtype(result = "Result<(), VendorError>")]
pub struct UpdateShades;

/// Periodically fetches all shades of a hub into the shared position cache and notifies the
/// shade entities.
pub struct ShadeCoordinator {
    entry_id: String,
    api: Rc<dyn PowerviewApi>,
    data: SharedShadeData,
    listeners: Vec<Recipient<ShadeGroupUpdate>>,
    scan_interval: Duration,
}

impl ShadeCoordinator {
    pub fn new(
        entry_id: impl Into<String>,
        api: Rc<dyn PowerviewApi>,
        data: SharedShadeData,
        listeners: Vec<Recipient<ShadeGroupUpdate>>,
        scan_interval: Duration,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            api,
            data,
            listeners,
            scan_interval,
        }
    }
}

impl Actor for ShadeCoordinator {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        debug!(
            "[{}] shade coordinator started, interval: {:?}",
            self.entry_id, self.scan_interval
        );
        ctx.run_interval(self.scan_interval, |_, ctx| {
            ctx.notify(UpdateShades);
        });
    }
}

impl Handler<UpdateShades> for ShadeCoordinator {
    type Result = ResponseActFuture<Self, Result<(), VendorError>>;

    fn handle(&mut self, _: UpdateShades, _ctx: &mut Self::Context) -> Self::Result {
        let api = self.api.clone();

        Box::pin(
            async move { api.shades().await }
                .into_actor(self)
                .map(|result, act, _ctx| {
                    let shades = match result {
                        Ok(shades) => shades,
                        Err(e) => {
                            warn!("[{}] Error fetching shade data: {e}", act.entry_id);
                            return Err(e);
                        }
                    };
                    act.data.borrow_mut().set_group_data(&shades);
                    for listener in &act.listeners {
                        listener.do_send(ShadeGroupUpdate);
                    }
                    Ok(())
                }),
        )
    }
}

impl Handler<Shutdown> for ShadeCoordinator {
    type Result = ();

    fn handle(&mut self, _: Shutdown, ctx: &mut Self::Context) -> Self::Result {
        ctx.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::{ShadeCoordinator, UpdateShades};
    use crate::shade::client::PowerviewApi;
    use crate::shade::data::ShadeData;
    use crate::shade::entity::ShadeGroupUpdate;
    use crate::shade::position::{PositionKind, RawPositions};
    use crate::shade::testing::{FakeHub, raw_shade};
    use actix::prelude::{Actor, Context, Handler, Message};
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Default)]
    struct Listener {
        updates: u32,
    }

    impl Actor for Listener {
        type Context = Context<Self>;
    }

    impl Handler<ShadeGroupUpdate> for Listener {
        type Result = ();

        fn handle(&mut self, _: ShadeGroupUpdate, _: &mut Self::Context) {
            self.updates += 1;
        }
    }

    #[derive(Message)]
    #[rtype(result = "u32")]
    struct Count;

    impl Handler<Count> for Listener {
        type Result = u32;

        fn handle(&mut self, _: Count, _: &mut Self::Context) -> u32 {
            self.updates
        }
    }

    #[actix::test]
    async fn update_stores_group_data_and_notifies_listeners() {
        let hub = Rc::new(FakeHub::with_shades(vec![raw_shade(
            3,
            0,
            Some(RawPositions::single(PositionKind::Primary, 777)),
        )]));
        let api: Rc<dyn PowerviewApi> = hub;
        let data = ShadeData::new_shared();
        let listener = Listener::default().start();
        let coordinator = ShadeCoordinator::new(
            "pv1",
            api,
            data.clone(),
            vec![listener.clone().recipient()],
            Duration::from_secs(3600),
        )
        .start();

        coordinator
            .send(UpdateShades)
            .await
            .expect("coordinator running")
            .expect("update succeeds");

        assert_eq!(1, listener.send(Count).await.expect("listener running"));
        assert!(data.borrow_mut().update_from_group_data(3));
        assert_eq!(777, data.borrow().positions(3).primary);
    }
}
