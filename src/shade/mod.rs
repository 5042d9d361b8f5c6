// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Hunter Douglas PowerView shade integration.
//!
//! Every shade of a hub is a cover entity. Top-down/bottom-up shades are split into a top and a
//! bottom cover entity sharing the same motor positions in the hub's [`ShadeData`] cache.

mod client;
mod coordinator;
mod data;
mod entity;
mod kind;
mod position;
#[cfg(test)]
mod testing;
mod timer;

pub use client::{HubInfo, PowerviewApi, PowerviewHub, RawRoom, RawShade};
pub use coordinator::ShadeCoordinator;
pub use data::{ShadeData, SharedShadeData};
pub use entity::{CoverCommand, ShadeContext, ShadeEntity};
pub use kind::{ShadeCapabilities, ShadeKind};
pub use position::{hd_position_to_percent, percent_to_hd_position};

use crate::configuration::PowerviewSettings;
use crate::errors::{SetupError, VendorError};
use crate::host::{ConfigEntry, EntityHandle, HostContext, LoadedEntry};
use crate::shade::position::RESYNC_DELAY;
use actix::Actor;
use log::{info, warn};
use std::collections::HashMap;
use std::rc::Rc;

/// Entry data key of the hub address.
pub const CONF_HOST: &str = "host";

/// Set up a PowerView hub entry with the hub address from the entry data.
pub async fn setup_entry(
    entry: &ConfigEntry,
    settings: &PowerviewSettings,
    host: HostContext,
) -> Result<LoadedEntry, SetupError> {
    let address = entry.required_str(CONF_HOST)?;
    let hub = PowerviewHub::new(address, settings.request_timeout)?;
    setup_with_api(entry, Rc::new(hub), settings, host).await
}

/// A local hub which can't be reached yet is not ready.
fn hub_error(e: VendorError) -> SetupError {
    match e {
        VendorError::Timeout | VendorError::Request(_) => SetupError::NotReady(e.to_string()),
        e => e.into(),
    }
}

pub async fn setup_with_api(
    entry: &ConfigEntry,
    api: Rc<dyn PowerviewApi>,
    settings: &PowerviewSettings,
    host: HostContext,
) -> Result<LoadedEntry, SetupError> {
    let hub = api.hub_info().await.map_err(hub_error)?;
    let rooms: HashMap<u32, String> = api
        .rooms()
        .await
        .map_err(hub_error)?
        .into_iter()
        .map(|r| (r.id, r.name.unwrap_or_default()))
        .collect();
    let shades = api.shades().await.map_err(hub_error)?;
    info!(
        "[{}] Connected to {} ({}), found {} shades",
        entry.entry_id,
        hub.name,
        hub.model,
        shades.len()
    );

    let data = ShadeData::new_shared();
    data.borrow_mut().set_group_data(&shades);
    let shared = ShadeContext {
        api: api.clone(),
        data: data.clone(),
        host,
        hub,
        poll_interval: settings.poll_interval,
        resync_delay: RESYNC_DELAY,
    };

    let mut loaded = LoadedEntry::default();
    let mut listeners = Vec::new();
    for raw_shade in shades {
        // the shade may be out of sync with the hub
        let name_before_refresh = raw_shade.display_name();
        let shade = match actix::clock::timeout(
            settings.setup_refresh_timeout,
            api.refresh(raw_shade.id),
        )
        .await
        {
            Ok(Ok(shade)) => RawShade {
                name: raw_shade.name.clone(),
                ..shade
            },
            Ok(Err(e)) => {
                warn!(
                    "[{}] Refreshing shade {name_before_refresh} failed: {e}",
                    entry.entry_id
                );
                raw_shade
            }
            Err(_) => raw_shade,
        };

        if !data.borrow_mut().update_from_shade(&shade) {
            info!(
                "[{}] The {name_before_refresh} shade was skipped because it is missing position data",
                entry.entry_id
            );
            continue;
        }

        let room_name = shade
            .room_id
            .and_then(|id| rooms.get(&id).cloned())
            .unwrap_or_default();
        let capabilities = ShadeCapabilities::from_shade(&shade);
        for kind in ShadeKind::for_capabilities(capabilities) {
            let entity = ShadeEntity::new(
                &entry.entry_id,
                &shade,
                kind,
                room_name.clone(),
                shared.clone(),
            );
            let entity_id = entity.entity_id().to_string();
            let addr = entity.start();
            listeners.push(addr.clone().recipient());
            loaded.entities.push(EntityHandle::new(entity_id, &addr));
        }
    }

    let coordinator =
        ShadeCoordinator::new(&entry.entry_id, api, data, listeners, settings.scan_interval)
            .start();
    loaded.services.push(coordinator.recipient());

    Ok(loaded)
}
