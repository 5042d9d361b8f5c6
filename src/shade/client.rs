// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! PowerView hub v2 REST client.

use crate::errors::VendorError;
use crate::shade::position::RawPositions;
use crate::util::{json_response, new_http_client};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::time::Duration;
use url::Url;

/// Hub model of the first generation hub without stop support.
pub const LEGACY_HUB_MODEL: &str = "PowerView Hub";

/// `batteryKind` value of shades with a hardwired power supply.
pub const BATTERY_KIND_HARDWIRED: u8 = 1;

/// Shade data returned by the hub.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawShade {
    pub id: u32,
    /// Decoded shade name.
    #[serde(default, deserialize_with = "deserialize_base64_name")]
    pub name: Option<String>,
    pub room_id: Option<u32>,
    #[serde(rename = "type", default)]
    pub shade_type: u16,
    pub capabilities: Option<u8>,
    pub battery_kind: Option<u8>,
    pub positions: Option<RawPositions>,
}

impl RawShade {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| format!("Shade {}", self.id))
    }

    /// Hard-wired shades can be polled without draining a battery.
    pub fn is_hard_wired(&self) -> bool {
        self.battery_kind == Some(BATTERY_KIND_HARDWIRED)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawRoom {
    pub id: u32,
    #[serde(default, deserialize_with = "deserialize_base64_name")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HubInfo {
    pub name: String,
    pub serial_number: Option<String>,
    pub model: String,
}

impl HubInfo {
    /// The legacy hub doesn't support stopping a shade.
    pub fn stop_supported(&self) -> bool {
        self.model != LEGACY_HUB_MODEL
    }
}

/// PowerView hub API.
#[async_trait(?Send)]
pub trait PowerviewApi {
    async fn hub_info(&self) -> Result<HubInfo, VendorError>;

    async fn rooms(&self) -> Result<Vec<RawRoom>, VendorError>;

    async fn shades(&self) -> Result<Vec<RawShade>, VendorError>;

    /// Force the hub to query the shade and return its current data.
    async fn refresh(&self, shade_id: u32) -> Result<RawShade, VendorError>;

    async fn move_shade(
        &self,
        shade_id: u32,
        positions: &RawPositions,
    ) -> Result<RawShade, VendorError>;

    async fn stop(&self, shade_id: u32) -> Result<RawShade, VendorError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShadesResponse {
    shade_data: Vec<RawShade>,
}

#[derive(Deserialize)]
struct ShadeResponse {
    shade: RawShade,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomsResponse {
    room_data: Vec<RawRoom>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDataResponse {
    user_data: UserData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserData {
    #[serde(default, deserialize_with = "deserialize_base64_name")]
    hub_name: Option<String>,
    serial_number: Option<String>,
    firmware: Option<Firmware>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Firmware {
    main_processor: Option<MainProcessor>,
}

#[derive(Deserialize)]
struct MainProcessor {
    name: Option<String>,
}

#[derive(Serialize)]
struct MoveRequest<'a> {
    shade: MoveBody<'a>,
}

#[derive(Serialize)]
struct MoveBody<'a> {
    positions: &'a RawPositions,
}

/// Shade and room names are base64 encoded by the hub.
fn deserialize_base64_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.map(|v| match STANDARD.decode(&v) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => v,
    }))
}

/// HTTP client of a PowerView hub in the local network.
pub struct PowerviewHub {
    client: awc::Client,
    base_url: Url,
}

impl PowerviewHub {
    /// Create a new hub client from the hub's IP address or host name.
    pub fn new(host: &str, request_timeout: Duration) -> Result<Self, VendorError> {
        let base_url = Url::parse(&format!("http://{host}/api/"))
            .map_err(|e| VendorError::Request(format!("Invalid hub address {host}: {e}")))?;
        Ok(Self {
            client: new_http_client(request_timeout),
            base_url,
        })
    }

    fn url(&self, path: &str) -> Result<Url, VendorError> {
        self.base_url
            .join(path)
            .map_err(|e| VendorError::Request(e.to_string()))
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, VendorError> {
        let url = self.url(path)?;
        debug!("[powerview] GET {url}");
        let mut response = self.client.get(url.as_str()).send().await?;
        json_response("powerview", &mut response).await
    }

    async fn put<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, VendorError> {
        let url = self.url(path)?;
        debug!("[powerview] PUT {url}");
        let mut response = self.client.put(url.as_str()).send_json(body).await?;
        json_response("powerview", &mut response).await
    }
}

#[async_trait(?Send)]
impl PowerviewApi for PowerviewHub {
    async fn hub_info(&self) -> Result<HubInfo, VendorError> {
        let response: UserDataResponse = self.get("userdata").await?;
        let data = response.user_data;
        let model = data
            .firmware
            .and_then(|f| f.main_processor)
            .and_then(|p| p.name)
            .unwrap_or_else(|| LEGACY_HUB_MODEL.to_string());
        Ok(HubInfo {
            name: data.hub_name.unwrap_or_else(|| "PowerView Hub".into()),
            serial_number: data.serial_number,
            model,
        })
    }

    async fn rooms(&self) -> Result<Vec<RawRoom>, VendorError> {
        let response: RoomsResponse = self.get("rooms").await?;
        Ok(response.room_data)
    }

    async fn shades(&self) -> Result<Vec<RawShade>, VendorError> {
        let response: ShadesResponse = self.get("shades").await?;
        Ok(response.shade_data)
    }

    async fn refresh(&self, shade_id: u32) -> Result<RawShade, VendorError> {
        let response: ShadeResponse = self.get(&format!("shades/{shade_id}?refresh=true")).await?;
        Ok(response.shade)
    }

    async fn move_shade(
        &self,
        shade_id: u32,
        positions: &RawPositions,
    ) -> Result<RawShade, VendorError> {
        let request = MoveRequest {
            shade: MoveBody { positions },
        };
        let response: ShadeResponse = self.put(&format!("shades/{shade_id}"), &request).await?;
        Ok(response.shade)
    }

    async fn stop(&self, shade_id: u32) -> Result<RawShade, VendorError> {
        let request = json!({ "shade": { "motion": "stop" } });
        let response: ShadeResponse = self.put(&format!("shades/{shade_id}"), &request).await?;
        Ok(response.shade)
    }
}
