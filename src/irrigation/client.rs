// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Rachio public REST API client.

use crate::errors::VendorError;
use crate::util::{checked_body, json_response, new_http_client};
use async_trait::async_trait;
use awc::ClientRequest;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RachioPerson {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub devices: Vec<RachioController>,
}

/// Rachio irrigation controller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RachioController {
    pub id: String,
    pub name: String,
    /// `ONLINE` or `OFFLINE`
    #[serde(default)]
    pub status: String,
    /// The controller is not in standby mode.
    #[serde(default)]
    pub on: bool,
    #[serde(default)]
    pub zones: Vec<RachioZone>,
}

impl RachioController {
    pub fn is_online(&self) -> bool {
        self.status == "ONLINE"
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RachioZone {
    pub id: String,
    pub name: String,
    pub zone_number: u32,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookEventType {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredWebhook {
    pub id: String,
    #[serde(default)]
    pub external_id: String,
    #[serde(default)]
    pub url: String,
}

/// Webhook registration request for a controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWebhook {
    pub device_id: String,
    pub external_id: String,
    pub url: String,
    pub event_type_ids: Vec<String>,
}

/// Rachio cloud API.
#[async_trait(?Send)]
pub trait RachioApi {
    /// Id of the person owning the API key.
    async fn person_id(&self) -> Result<String, VendorError>;

    async fn person(&self, person_id: &str) -> Result<RachioPerson, VendorError>;

    async fn webhook_event_types(&self) -> Result<Vec<WebhookEventType>, VendorError>;

    async fn list_webhooks(&self, device_id: &str) -> Result<Vec<RegisteredWebhook>, VendorError>;

    async fn delete_webhook(&self, webhook_id: &str) -> Result<(), VendorError>;

    async fn add_webhook(&self, webhook: &NewWebhook) -> Result<(), VendorError>;

    /// Leave standby mode.
    async fn device_on(&self, device_id: &str) -> Result<(), VendorError>;

    /// Enter standby mode.
    async fn device_off(&self, device_id: &str) -> Result<(), VendorError>;

    async fn start_zone(&self, zone_id: &str, duration: Duration) -> Result<(), VendorError>;

    async fn stop_water(&self, device_id: &str) -> Result<(), VendorError>;

    /// Id of the currently watering zone of a controller.
    async fn current_zone(&self, device_id: &str) -> Result<Option<String>, VendorError>;
}

#[derive(Deserialize)]
struct PersonInfo {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentSchedule {
    zone_id: Option<String>,
}

/// HTTP client of the Rachio public API, authenticated with the account's API key.
pub struct RachioClient {
    client: awc::Client,
    base_url: Url,
    api_key: String,
}

impl RachioClient {
    pub fn new(base_url: Url, api_key: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            client: new_http_client(request_timeout),
            base_url,
            api_key: api_key.into(),
        }
    }

    fn request(&self, method: awc::http::Method, path: &str) -> ClientRequest {
        let url = format!("{}/{path}", self.base_url.as_str().trim_end_matches('/'));
        debug!("[rachio] {method} {url}");
        self.client
            .request(method, url)
            .bearer_auth(&self.api_key)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, VendorError> {
        let mut response = self.request(awc::http::Method::GET, path).send().await?;
        json_response("rachio", &mut response).await
    }

    async fn put(&self, path: &str, body: &serde_json::Value) -> Result<(), VendorError> {
        let mut response = self
            .request(awc::http::Method::PUT, path)
            .send_json(body)
            .await?;
        checked_body("rachio", &mut response).await?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl RachioApi for RachioClient {
    async fn person_id(&self) -> Result<String, VendorError> {
        let info: PersonInfo = self.get("person/info").await?;
        Ok(info.id)
    }

    async fn person(&self, person_id: &str) -> Result<RachioPerson, VendorError> {
        self.get(&format!("person/{person_id}")).await
    }

    async fn webhook_event_types(&self) -> Result<Vec<WebhookEventType>, VendorError> {
        self.get("notification/webhook_event_type").await
    }

    async fn list_webhooks(&self, device_id: &str) -> Result<Vec<RegisteredWebhook>, VendorError> {
        self.get(&format!("notification/{device_id}/webhook")).await
    }

    async fn delete_webhook(&self, webhook_id: &str) -> Result<(), VendorError> {
        let mut response = self
            .request(
                awc::http::Method::DELETE,
                &format!("notification/webhook/{webhook_id}"),
            )
            .send()
            .await?;
        checked_body("rachio", &mut response).await?;
        Ok(())
    }

    async fn add_webhook(&self, webhook: &NewWebhook) -> Result<(), VendorError> {
        let event_types: Vec<_> = webhook
            .event_type_ids
            .iter()
            .map(|id| json!({ "id": id }))
            .collect();
        let body = json!({
            "device": { "id": webhook.device_id },
            "externalId": webhook.external_id,
            "url": webhook.url,
            "eventTypes": event_types,
        });
        let mut response = self
            .request(awc::http::Method::POST, "notification/webhook")
            .send_json(&body)
            .await?;
        checked_body("rachio", &mut response).await?;
        Ok(())
    }

    async fn device_on(&self, device_id: &str) -> Result<(), VendorError> {
        self.put("device/on", &json!({ "id": device_id })).await
    }

    async fn device_off(&self, device_id: &str) -> Result<(), VendorError> {
        self.put("device/off", &json!({ "id": device_id })).await
    }

    async fn start_zone(&self, zone_id: &str, duration: Duration) -> Result<(), VendorError> {
        self.put(
            "zone/start",
            &json!({ "id": zone_id, "duration": duration.as_secs() }),
        )
        .await
    }

    async fn stop_water(&self, device_id: &str) -> Result<(), VendorError> {
        self.put("device/stop_water", &json!({ "id": device_id }))
            .await
    }

    async fn current_zone(&self, device_id: &str) -> Result<Option<String>, VendorError> {
        let schedule: CurrentSchedule = self
            .get(&format!("device/{device_id}/current_schedule"))
            .await?;
        Ok(schedule.zone_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{CurrentSchedule, RachioPerson};
    use serde_json::json;

    #[test]
    fn person_with_controllers() {
        let person: RachioPerson = serde_json::from_value(json!({
            "id": "p1",
            "username": "gardener",
            "fullName": "Green Thumb",
            "devices": [{
                "id": "c1",
                "name": "Front yard",
                "status": "ONLINE",
                "on": true,
                "zones": [
                    { "id": "z1", "name": "Lawn", "zoneNumber": 1, "enabled": true },
                    { "id": "z2", "name": "Zone 2", "zoneNumber": 2, "enabled": false }
                ]
            }]
        }))
        .expect("valid person");

        assert_eq!("gardener", person.username);
        let controller = &person.devices[0];
        assert!(controller.is_online());
        assert!(controller.on);
        assert_eq!(2, controller.zones.len());
        assert!(!controller.zones[1].enabled);
    }

    #[test]
    fn idle_controller_has_no_current_zone() {
        let schedule: CurrentSchedule = serde_json::from_value(json!({})).expect("valid schedule");
        assert_eq!(None, schedule.zone_id);
    }
}
