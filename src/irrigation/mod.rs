// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Rachio irrigation integration.
//!
//! State changes are pushed by the Rachio cloud to a webhook registered for every controller of
//! the account. Each controller provides a standby switch and a switch per enabled zone.

mod client;
mod hub;
mod relay;
mod switch;
#[cfg(test)]
mod testing;
mod webhook;

pub use client::{RachioApi, RachioClient, RachioController, RachioPerson, RachioZone};
pub use hub::IrrigationHub;
pub use relay::{CloudRelay, HttpCloudRelay, RelayError};
pub use switch::{RachioSwitch, SwitchCommand, SwitchKind};
pub use webhook::{CONF_CLOUDHOOK_URL, CONF_WEBHOOK_ID, ControllerEvent, WebhookEvent};

use crate::configuration::RachioSettings;
use crate::errors::{SetupError, VendorError};
use crate::host::{ConfigEntry, EntityHandle, HostContext, LoadedEntry};
use crate::util::json::copy_entry;
use actix::Actor;
use log::{error, info, warn};
use serde_json::Value;
use std::rc::Rc;
use std::time::Duration;
use url::Url;

/// Entry data key of the Rachio API key.
pub const CONF_API_KEY: &str = "api_key";
/// Entry option key of the manual zone run time in minutes.
pub const CONF_MANUAL_RUN_MINS: &str = "manual_run_mins";
pub const DEFAULT_MANUAL_RUN_MINS: u64 = 10;

fn cloud_relay(settings: &RachioSettings) -> Option<HttpCloudRelay> {
    settings
        .cloud_relay
        .clone()
        .map(|url| HttpCloudRelay::new(url, settings.request_timeout))
}

/// Set up a Rachio account entry.
///
/// `base_url` is the externally reachable URL of this service, used for the webhook URL if no
/// cloud relay is configured. Generated webhook data and migrated options are stored in `entry`,
/// also if the setup fails afterwards.
pub async fn setup_entry(
    entry: &mut ConfigEntry,
    settings: &RachioSettings,
    base_url: &Url,
    host: HostContext,
) -> Result<LoadedEntry, SetupError> {
    let api_key = entry.required_str(CONF_API_KEY)?.to_string();
    let api = RachioClient::new(settings.url.clone(), api_key, settings.request_timeout);
    let relay = cloud_relay(settings);
    let relay = relay.as_ref().map(|r| r as &dyn CloudRelay);
    setup_with_api(entry, Rc::new(api), relay, base_url, host).await
}

/// Options created before the option existed only have the run time in the entry data.
fn migrate_manual_run_mins(entry: &mut ConfigEntry) {
    if entry.options.contains_key(CONF_MANUAL_RUN_MINS) {
        return;
    }
    if !copy_entry(&entry.data, &mut entry.options, CONF_MANUAL_RUN_MINS) {
        entry.options.insert(
            CONF_MANUAL_RUN_MINS.into(),
            Value::from(DEFAULT_MANUAL_RUN_MINS),
        );
    }
}

fn account_error(entry_id: &str, e: VendorError) -> SetupError {
    match e {
        VendorError::Auth(msg) => {
            error!("[{entry_id}] Rachio API key rejected: {msg}");
            SetupError::AuthFailed(msg)
        }
        VendorError::Timeout | VendorError::Http(_) | VendorError::Request(_) => {
            SetupError::NotReady(format!("Rachio API error: {e}"))
        }
        e => e.into(),
    }
}

pub async fn setup_with_api(
    entry: &mut ConfigEntry,
    api: Rc<dyn RachioApi>,
    relay: Option<&dyn CloudRelay>,
    base_url: &Url,
    host: HostContext,
) -> Result<LoadedEntry, SetupError> {
    migrate_manual_run_mins(entry);
    let entry_id = entry.entry_id.clone();
    let token = webhook::generate_token();
    let (webhook_id, url) = webhook::get_or_create_webhook(entry, relay, base_url).await?;

    let person_id = api
        .person_id()
        .await
        .map_err(|e| account_error(&entry_id, e))?;
    let person = api
        .person(&person_id)
        .await
        .map_err(|e| account_error(&entry_id, e))?;
    let event_types = api
        .webhook_event_types()
        .await
        .map_err(|e| account_error(&entry_id, e))?;
    let event_type_ids = webhook::subscribed_event_types(&event_types);

    let mut controllers = Vec::with_capacity(person.devices.len());
    for controller in person.devices {
        // shared controllers can't be managed with this account
        if let Err(e) = api.list_webhooks(&controller.id).await {
            if e == VendorError::Timeout {
                return Err(account_error(&entry_id, e));
            }
            error!(
                "[{entry_id}] Failed to add rachio controller '{}' because of an error: {e}",
                controller.name
            );
            continue;
        }

        webhook::register_webhook(api.as_ref(), &controller, &token, &url, &event_type_ids)
            .await
            .map_err(|e| account_error(&entry_id, e))?;

        let current_zone = match api.current_zone(&controller.id).await {
            Ok(zone) => zone,
            Err(e) => {
                warn!("[{entry_id}] Failed to get current schedule of {}: {e}", controller.name);
                None
            }
        };
        controllers.push((controller, current_zone));
    }

    if controllers.is_empty() {
        error!(
            "[{entry_id}] No Rachio devices found in account {}",
            person.username
        );
        return Err(SetupError::NoDevices(person.username));
    }

    info!(
        "[{entry_id}] {} Rachio device(s) found; The url {url} must be accessible from the internet in order to receive updates",
        controllers.len()
    );

    let manual_run = Duration::from_secs(
        entry
            .option_u64(CONF_MANUAL_RUN_MINS)
            .unwrap_or(DEFAULT_MANUAL_RUN_MINS)
            * 60,
    );
    let mut hub = IrrigationHub::new(&entry_id, token);
    let mut loaded = LoadedEntry::default();

    for (controller, current_zone) in &controllers {
        let standby = RachioSwitch::standby(&entry_id, controller, api.clone(), host.clone());
        let entity_id = standby.entity_id().to_string();
        let addr = standby.start();
        hub.add_listener(&controller.id, addr.clone().recipient());
        loaded.entities.push(EntityHandle::new(entity_id, &addr));

        for zone in controller.zones.iter().filter(|z| z.enabled) {
            let watering = current_zone.as_deref() == Some(zone.id.as_str());
            let switch = RachioSwitch::zone(
                &entry_id,
                controller,
                zone,
                watering,
                manual_run,
                api.clone(),
                host.clone(),
            );
            let entity_id = switch.entity_id().to_string();
            let addr = switch.start();
            hub.add_listener(&controller.id, addr.clone().recipient());
            loaded.entities.push(EntityHandle::new(entity_id, &addr));
        }
    }

    let hub = hub.start();
    loaded.services.push(hub.clone().recipient());
    loaded.webhook = Some((webhook_id, hub.recipient()));
    Ok(loaded)
}

/// Clean up external resources of a removed entry: the cloudhook created for its webhook.
pub async fn remove_entry(entry: &ConfigEntry, settings: &RachioSettings) -> Result<(), RelayError> {
    let relay = cloud_relay(settings);
    remove_cloudhook(entry, relay.as_ref().map(|r| r as &dyn CloudRelay)).await
}

async fn remove_cloudhook(
    entry: &ConfigEntry,
    relay: Option<&dyn CloudRelay>,
) -> Result<(), RelayError> {
    let (Some(relay), Some(webhook_id)) = (relay, entry.data_str(CONF_WEBHOOK_ID)) else {
        return Ok(());
    };
    if entry.data_str(CONF_CLOUDHOOK_URL).is_none() {
        return Ok(());
    }
    info!("[{}] Deleting cloudhook", entry.entry_id);
    relay.delete_cloudhook(webhook_id).await
}
