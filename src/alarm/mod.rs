// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Hive alarm integration: one alarm control panel entity per alarm of the Hive account.

mod client;
mod entity;
#[cfg(test)]
mod testing;

pub use client::{AlarmDevice, HiveApi, HiveClient};
pub use entity::{AlarmCommand, AlarmEntity, AlarmMode, AlarmState, alarm_state};

use crate::configuration::HiveSettings;
use crate::errors::SetupError;
use crate::host::{ConfigEntry, EntityHandle, HostContext, LoadedEntry};
use actix::Actor;
use log::info;
use std::rc::Rc;

/// Entry data key of the Hive session token.
pub const CONF_TOKEN: &str = "token";

pub async fn setup_entry(
    entry: &ConfigEntry,
    settings: &HiveSettings,
    host: HostContext,
) -> Result<LoadedEntry, SetupError> {
    let token = entry.required_str(CONF_TOKEN)?;
    let client = HiveClient::new(settings.url.clone(), token, settings.request_timeout);
    setup_with_api(entry, Rc::new(client), settings, host).await
}

pub async fn setup_with_api(
    entry: &ConfigEntry,
    api: Rc<dyn HiveApi>,
    settings: &HiveSettings,
    host: HostContext,
) -> Result<LoadedEntry, SetupError> {
    let devices = api.list_alarms().await?;
    info!("[{}] Found {} Hive alarms", entry.entry_id, devices.len());

    let mut loaded = LoadedEntry::default();
    for device in devices {
        let entity = AlarmEntity::new(
            &entry.entry_id,
            &device,
            api.clone(),
            host.clone(),
            settings.scan_interval,
        );
        let entity_id = entity.entity_id().to_string();
        let addr = entity.start();
        loaded.entities.push(EntityHandle::new(entity_id, &addr));
    }

    Ok(loaded)
}
