// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Hive cloud API client.

use crate::errors::VendorError;
use crate::util::{checked_body, json_response, new_http_client};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

/// Alarm device as reported by the Hive account.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmDevice {
    pub id: String,
    pub name: String,
    pub online: bool,
    /// Vendor mode: `home`, `asleep` or `away`.
    pub mode: String,
    /// The alarm has been triggered.
    pub triggered: bool,
}

/// Hive alarm API.
#[async_trait(?Send)]
pub trait HiveApi {
    async fn list_alarms(&self) -> Result<Vec<AlarmDevice>, VendorError>;

    async fn get_alarm(&self, device_id: &str) -> Result<AlarmDevice, VendorError>;

    async fn set_mode(&self, device_id: &str, mode: &str) -> Result<(), VendorError>;
}

#[derive(Deserialize)]
struct Product {
    id: String,
    #[serde(rename = "type")]
    product_type: String,
    #[serde(default)]
    state: ProductState,
    #[serde(default)]
    props: ProductProps,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductState {
    name: Option<String>,
    #[serde(default)]
    mode: String,
    #[serde(default)]
    alarm_active: bool,
}

#[derive(Default, Deserialize)]
struct ProductProps {
    #[serde(default)]
    online: bool,
}

const PRODUCT_TYPE_ALARM: &str = "alarm";

impl From<Product> for AlarmDevice {
    fn from(product: Product) -> Self {
        Self {
            name: product
                .state
                .name
                .unwrap_or_else(|| format!("Hive alarm {}", product.id)),
            id: product.id,
            online: product.props.online,
            mode: product.state.mode,
            triggered: product.state.alarm_active,
        }
    }
}

fn alarms(products: Vec<Product>) -> Vec<AlarmDevice> {
    products
        .into_iter()
        .filter(|p| p.product_type == PRODUCT_TYPE_ALARM)
        .map(AlarmDevice::from)
        .collect()
}

/// HTTP client of the Hive beekeeper API, authenticated with a session token.
pub struct HiveClient {
    client: awc::Client,
    base_url: Url,
    token: String,
}

impl HiveClient {
    pub fn new(base_url: Url, token: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            client: new_http_client(request_timeout),
            base_url,
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.as_str().trim_end_matches('/'))
    }
}

#[async_trait(?Send)]
impl HiveApi for HiveClient {
    async fn list_alarms(&self) -> Result<Vec<AlarmDevice>, VendorError> {
        let url = self.url("products");
        debug!("[hive] GET {url}");
        let mut response = self
            .client
            .get(url)
            .insert_header(("authorization", self.token.as_str()))
            .send()
            .await?;
        let products: Vec<Product> = json_response("hive", &mut response).await?;
        Ok(alarms(products))
    }

    async fn get_alarm(&self, device_id: &str) -> Result<AlarmDevice, VendorError> {
        self.list_alarms()
            .await?
            .into_iter()
            .find(|d| d.id == device_id)
            .ok_or_else(|| VendorError::NotFound(device_id.to_string()))
    }

    async fn set_mode(&self, device_id: &str, mode: &str) -> Result<(), VendorError> {
        let url = self.url(&format!("nodes/{PRODUCT_TYPE_ALARM}/{device_id}"));
        debug!("[hive] POST {url} mode={mode}");
        let mut response = self
            .client
            .post(url)
            .insert_header(("authorization", self.token.as_str()))
            .send_json(&json!({ "mode": mode }))
            .await?;
        checked_body("hive", &mut response).await?;
        Ok(())
    }
}
