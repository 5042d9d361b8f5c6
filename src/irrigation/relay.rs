// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Cloud relay providing public webhook URLs ("cloudhooks") for a local webhook id.

use crate::errors::{SetupError, VendorError};
use crate::util::{checked_body, json_response, new_http_client};
use async_trait::async_trait;
use awc::error::{ConnectError, SendRequestError};
use derive_more::Display;
use log::debug;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

#[derive(Debug, Display, Clone, PartialEq)]
pub enum RelayError {
    #[display("Cloud relay is not connected")]
    NotConnected,
    #[display("Cloud relay error: {_0}")]
    Failed(String),
}

impl From<RelayError> for SetupError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::NotConnected => SetupError::NotReady(e.to_string()),
            RelayError::Failed(msg) => SetupError::Failed(msg),
        }
    }
}

impl From<VendorError> for RelayError {
    fn from(e: VendorError) -> Self {
        RelayError::Failed(e.to_string())
    }
}

impl From<SendRequestError> for RelayError {
    fn from(e: SendRequestError) -> Self {
        match e {
            SendRequestError::Connect(ConnectError::Timeout)
            | SendRequestError::Connect(ConnectError::Io(_))
            | SendRequestError::Connect(ConnectError::Resolver(_))
            | SendRequestError::Timeout => RelayError::NotConnected,
            e => RelayError::Failed(e.to_string()),
        }
    }
}

#[async_trait(?Send)]
pub trait CloudRelay {
    /// The relay subscription is active and cloudhooks can be used.
    fn is_active(&self) -> bool;

    /// Create a public URL forwarding to the given local webhook id.
    async fn create_cloudhook(&self, webhook_id: &str) -> Result<Url, RelayError>;

    async fn delete_cloudhook(&self, webhook_id: &str) -> Result<(), RelayError>;
}

#[derive(Deserialize)]
struct Cloudhook {
    url: Url,
}

/// HTTP client of the cloud relay service.
pub struct HttpCloudRelay {
    client: awc::Client,
    base_url: Url,
}

impl HttpCloudRelay {
    pub fn new(base_url: Url, request_timeout: Duration) -> Self {
        Self {
            client: new_http_client(request_timeout),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.as_str().trim_end_matches('/'))
    }
}

#[async_trait(?Send)]
impl CloudRelay for HttpCloudRelay {
    fn is_active(&self) -> bool {
        true
    }

    async fn create_cloudhook(&self, webhook_id: &str) -> Result<Url, RelayError> {
        let url = self.url("cloudhooks");
        debug!("[relay] POST {url} webhook_id={webhook_id}");
        let mut response = self
            .client
            .post(url)
            .send_json(&json!({ "webhook_id": webhook_id }))
            .await?;
        let hook: Cloudhook = json_response("relay", &mut response).await?;
        Ok(hook.url)
    }

    async fn delete_cloudhook(&self, webhook_id: &str) -> Result<(), RelayError> {
        let url = self.url(&format!("cloudhooks/{webhook_id}"));
        debug!("[relay] DELETE {url}");
        let mut response = self.client.delete(url).send().await?;
        checked_body("relay", &mut response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::RelayError;
    use crate::errors::SetupError;

    #[test]
    fn disconnected_relay_is_retryable() {
        assert!(SetupError::from(RelayError::NotConnected).is_retryable());
        assert!(!SetupError::from(RelayError::Failed("HTTP 500".into())).is_retryable());
    }
}
