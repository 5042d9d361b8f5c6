// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Rachio webhook registration and push event parsing.

use crate::errors::{SetupError, VendorError};
use crate::host::ConfigEntry;
use crate::irrigation::client::{NewWebhook, RachioApi, RachioController, WebhookEventType};
use crate::irrigation::relay::CloudRelay;
use actix::Message;
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

/// Entry data key of the local webhook id.
pub const CONF_WEBHOOK_ID: &str = "webhook_id";
/// Entry data key of the public relay URL of the webhook.
pub const CONF_CLOUDHOOK_URL: &str = "cloudhook_url";

/// External id prefix of all webhooks registered by this service.
pub const WEBHOOK_CONST_ID: &str = "intg-vendors.rachio:";

/// Vendor event types the webhook subscribes to.
pub const LISTEN_EVENT_TYPES: [&str; 5] = [
    "DEVICE_STATUS_EVENT",
    "ZONE_STATUS_EVENT",
    "RAIN_DELAY_EVENT",
    "RAIN_SENSOR_DETECTION_EVENT",
    "SCHEDULE_STATUS_EVENT",
];

/// Generate a random token of 64 hex characters from two v4 UUIDs (244 random bits).
pub fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Get the webhook id and URL of the entry, or create and store them in the entry data.
///
/// An active cloud relay provides a public URL for the webhook. Otherwise the URL is derived
/// from `base_url`, which must be reachable by the vendor cloud.
pub async fn get_or_create_webhook(
    entry: &mut ConfigEntry,
    relay: Option<&dyn CloudRelay>,
    base_url: &Url,
) -> Result<(String, Url), SetupError> {
    let webhook_id = match entry.data_str(CONF_WEBHOOK_ID) {
        Some(id) => id.to_string(),
        None => {
            let id = generate_token();
            debug!("[{}] Created new webhook id", entry.entry_id);
            entry.data.insert(CONF_WEBHOOK_ID.into(), Value::from(id.as_str()));
            id
        }
    };

    if let Some(relay) = relay.filter(|r| r.is_active()) {
        let existing = entry
            .data_str(CONF_CLOUDHOOK_URL)
            .and_then(|url| Url::parse(url).ok());
        let url = match existing {
            Some(url) => url,
            None => {
                let url = relay.create_cloudhook(&webhook_id).await?;
                info!("[{}] Created cloudhook: {url}", entry.entry_id);
                entry
                    .data
                    .insert(CONF_CLOUDHOOK_URL.into(), Value::from(url.as_str()));
                url
            }
        };
        return Ok((webhook_id, url));
    }

    let url = local_webhook_url(base_url, &webhook_id)?;
    Ok((webhook_id, url))
}

fn local_webhook_url(base_url: &Url, webhook_id: &str) -> Result<Url, SetupError> {
    let url = format!(
        "{}/api/webhook/{webhook_id}",
        base_url.as_str().trim_end_matches('/')
    );
    Url::parse(&url).map_err(|e| SetupError::Failed(format!("Invalid webhook URL {url}: {e}")))
}

/// Ids of the event types to subscribe to.
pub fn subscribed_event_types(event_types: &[WebhookEventType]) -> Vec<String> {
    event_types
        .iter()
        .filter(|t| LISTEN_EVENT_TYPES.contains(&t.name.as_str()))
        .map(|t| t.id.clone())
        .collect()
}

/// Replace the webhooks registered by us for a controller with a new one for `url`.
pub async fn register_webhook(
    api: &dyn RachioApi,
    controller: &RachioController,
    token: &str,
    url: &Url,
    event_type_ids: &[String],
) -> Result<(), VendorError> {
    for webhook in api.list_webhooks(&controller.id).await? {
        if webhook.external_id.starts_with(WEBHOOK_CONST_ID) || webhook.url == url.as_str() {
            debug!("[{}] Deleting old webhook {}", controller.id, webhook.id);
            api.delete_webhook(&webhook.id).await?;
        }
    }

    api.add_webhook(&NewWebhook {
        device_id: controller.id.clone(),
        external_id: format!("{WEBHOOK_CONST_ID}{token}"),
        url: url.to_string(),
        event_type_ids: event_type_ids.to_vec(),
    })
    .await
}

/// Push event payload posted by the vendor cloud.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(default)]
    pub external_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub sub_type: String,
    #[serde(default)]
    pub device_id: String,
    pub zone_id: Option<String>,
}

impl WebhookEvent {
    /// The event carries the auth token of the current session.
    pub fn is_authorized(&self, token: &str) -> bool {
        self.external_id.strip_prefix(WEBHOOK_CONST_ID) == Some(token)
    }

    /// State change of the controller's switches announced by this event.
    pub fn update(&self) -> Option<ControllerUpdate> {
        match (self.event_type.as_str(), self.sub_type.as_str()) {
            ("DEVICE_STATUS", "SLEEP_MODE_ON") => Some(ControllerUpdate::Standby(true)),
            ("DEVICE_STATUS", "SLEEP_MODE_OFF") => Some(ControllerUpdate::Standby(false)),
            ("DEVICE_STATUS", "ONLINE") => Some(ControllerUpdate::Online(true)),
            ("DEVICE_STATUS", "OFFLINE") => Some(ControllerUpdate::Online(false)),
            ("ZONE_STATUS", sub_type) => {
                let watering = match sub_type {
                    "ZONE_STARTED" => true,
                    "ZONE_STOPPED" | "ZONE_COMPLETED" | "ZONE_CYCLING_COMPLETED" => false,
                    _ => return None,
                };
                Some(ControllerUpdate::Zone {
                    zone_id: self.zone_id.clone()?,
                    watering,
                })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerUpdate {
    Standby(bool),
    Online(bool),
    Zone { zone_id: String, watering: bool },
}

/// Controller update dispatched to the controller's switches.
#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct ControllerEvent(pub ControllerUpdate);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Domain;
    use crate::irrigation::client::RegisteredWebhook;
    use crate::irrigation::testing::{FakeRachio, FakeRelay, rachio_controller};
    use rstest::rstest;
    use serde_json::json;

    fn entry() -> ConfigEntry {
        ConfigEntry::new("r1", Domain::Rachio, "Rachio").with_data("api_key", "key")
    }

    fn base_url() -> Url {
        Url::parse("https://home.example.com").expect("valid url")
    }

    #[test]
    fn token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(64, token.len());
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[actix::test]
    async fn new_webhook_id_is_stored_in_entry() {
        let mut entry = entry();

        let (webhook_id, url) = get_or_create_webhook(&mut entry, None, &base_url())
            .await
            .expect("webhook created");

        assert_eq!(Some(webhook_id.as_str()), entry.data_str(CONF_WEBHOOK_ID));
        assert_eq!(
            format!("https://home.example.com/api/webhook/{webhook_id}"),
            url.as_str()
        );
    }

    #[actix::test]
    async fn existing_webhook_id_is_reused() {
        let mut entry = entry().with_data(CONF_WEBHOOK_ID, "abc");

        let (webhook_id, _) = get_or_create_webhook(&mut entry, None, &base_url())
            .await
            .expect("webhook reused");

        assert_eq!("abc", webhook_id);
    }

    #[actix::test]
    async fn relay_creates_cloudhook_once() {
        let relay = FakeRelay::connected();
        let mut entry = entry().with_data(CONF_WEBHOOK_ID, "abc");

        let (_, url) = get_or_create_webhook(&mut entry, Some(&relay), &base_url())
            .await
            .expect("cloudhook created");
        let (_, reused) = get_or_create_webhook(&mut entry, Some(&relay), &base_url())
            .await
            .expect("cloudhook reused");

        assert_eq!("https://relay.example.com/hooks/abc", url.as_str());
        assert_eq!(url, reused);
        assert_eq!(Some(url.as_str()), entry.data_str(CONF_CLOUDHOOK_URL));
        assert_eq!(vec!["abc".to_string()], *relay.created.borrow());
    }

    #[actix::test]
    async fn disconnected_relay_is_not_ready() {
        let relay = FakeRelay::disconnected();
        let mut entry = entry();

        let result = get_or_create_webhook(&mut entry, Some(&relay), &base_url()).await;

        assert!(matches!(result, Err(SetupError::NotReady(_))));
    }

    #[actix::test]
    async fn inactive_relay_uses_local_url() {
        let relay = FakeRelay {
            active: false,
            ..FakeRelay::connected()
        };
        let mut entry = entry().with_data(CONF_WEBHOOK_ID, "abc");

        let (_, url) = get_or_create_webhook(&mut entry, Some(&relay), &base_url())
            .await
            .expect("local webhook");

        assert_eq!("https://home.example.com/api/webhook/abc", url.as_str());
        assert!(relay.created.borrow().is_empty());
    }

    #[actix::test]
    async fn registration_replaces_own_webhooks_only() {
        let rachio = FakeRachio::default();
        rachio.webhooks.borrow_mut().insert(
            "c1".into(),
            vec![
                RegisteredWebhook {
                    id: "old".into(),
                    external_id: format!("{WEBHOOK_CONST_ID}stale"),
                    url: "https://old.example.com".into(),
                },
                RegisteredWebhook {
                    id: "foreign".into(),
                    external_id: "other-app".into(),
                    url: "https://other.example.com".into(),
                },
            ],
        );
        let url = base_url();

        register_webhook(
            &rachio,
            &rachio_controller("c1"),
            "token",
            &url,
            &["5".to_string()],
        )
        .await
        .expect("registration succeeds");

        assert_eq!(vec!["old".to_string()], *rachio.deleted.borrow());
        let added = rachio.added.borrow();
        assert_eq!(1, added.len());
        assert_eq!("intg-vendors.rachio:token", added[0].external_id);
        assert_eq!(vec!["5".to_string()], added[0].event_type_ids);
    }

    #[test]
    fn only_listened_event_types_are_subscribed() {
        let types = vec![
            WebhookEventType {
                id: "5".into(),
                name: "DEVICE_STATUS_EVENT".into(),
            },
            WebhookEventType {
                id: "6".into(),
                name: "WEATHER_INTELLIGENCE_EVENT".into(),
            },
        ];
        assert_eq!(vec!["5".to_string()], subscribed_event_types(&types));
    }

    #[rstest]
    #[case("intg-vendors.rachio:secret", true)]
    #[case("intg-vendors.rachio:other", false)]
    #[case("secret", false)]
    #[case("", false)]
    fn event_authorization(#[case] external_id: &str, #[case] authorized: bool) {
        let event: WebhookEvent = serde_json::from_value(json!({
            "externalId": external_id,
            "type": "DEVICE_STATUS",
            "subType": "ONLINE",
            "deviceId": "c1"
        }))
        .expect("valid event");
        assert_eq!(authorized, event.is_authorized("secret"));
    }

    #[rstest]
    #[case("DEVICE_STATUS", "SLEEP_MODE_ON", Some(ControllerUpdate::Standby(true)))]
    #[case("DEVICE_STATUS", "SLEEP_MODE_OFF", Some(ControllerUpdate::Standby(false)))]
    #[case("DEVICE_STATUS", "OFFLINE", Some(ControllerUpdate::Online(false)))]
    #[case("DEVICE_STATUS", "COLD_REBOOT", None)]
    #[case("ZONE_STATUS", "ZONE_STARTED", Some(ControllerUpdate::Zone { zone_id: "z1".into(), watering: true }))]
    #[case("ZONE_STATUS", "ZONE_COMPLETED", Some(ControllerUpdate::Zone { zone_id: "z1".into(), watering: false }))]
    #[case("RAIN_DELAY", "RAIN_DELAY_ON", None)]
    fn event_update(
        #[case] event_type: &str,
        #[case] sub_type: &str,
        #[case] expected: Option<ControllerUpdate>,
    ) {
        let event = WebhookEvent {
            external_id: String::new(),
            event_type: event_type.into(),
            sub_type: sub_type.into(),
            device_id: "c1".into(),
            zone_id: Some("z1".into()),
        };
        assert_eq!(expected, event.update());
    }
}
