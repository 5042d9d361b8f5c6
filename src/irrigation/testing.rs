// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! In-memory Rachio account and cloud relay for tests.

use crate::errors::VendorError;
use crate::irrigation::client::{
    NewWebhook, RachioApi, RachioController, RachioPerson, RachioZone, RegisteredWebhook,
    WebhookEventType,
};
use crate::irrigation::relay::{CloudRelay, RelayError};
use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

#[derive(Default)]
pub struct FakeRachio {
    pub person: Option<RachioPerson>,
    /// Error returned by the person info request.
    pub error: Option<VendorError>,
    pub webhooks: RefCell<HashMap<String, Vec<RegisteredWebhook>>>,
    pub webhook_errors: HashMap<String, VendorError>,
    pub added: RefCell<Vec<NewWebhook>>,
    pub deleted: RefCell<Vec<String>>,
    /// Device commands, e.g. `device_off c1` or `start_zone z1 600`.
    pub calls: RefCell<Vec<String>>,
    pub current_zone: Option<String>,
}

impl FakeRachio {
    pub fn with_controllers(devices: Vec<RachioController>) -> Self {
        Self {
            person: Some(RachioPerson {
                id: "p1".into(),
                username: "gardener".into(),
                devices,
            }),
            ..Default::default()
        }
    }

    fn call(&self, call: String) -> Result<(), VendorError> {
        self.calls.borrow_mut().push(call);
        Ok(())
    }
}

/// Online controller with an enabled zone `z1` and a disabled zone `z2`.
pub fn rachio_controller(id: &str) -> RachioController {
    RachioController {
        id: id.into(),
        name: "Front yard".into(),
        status: "ONLINE".into(),
        on: true,
        zones: vec![
            RachioZone {
                id: "z1".into(),
                name: "Lawn".into(),
                zone_number: 1,
                enabled: true,
            },
            RachioZone {
                id: "z2".into(),
                name: "Zone 2".into(),
                zone_number: 2,
                enabled: false,
            },
        ],
    }
}

#[async_trait(?Send)]
impl RachioApi for FakeRachio {
    async fn person_id(&self) -> Result<String, VendorError> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        self.person
            .as_ref()
            .map(|p| p.id.clone())
            .ok_or(VendorError::Http(404))
    }

    async fn person(&self, person_id: &str) -> Result<RachioPerson, VendorError> {
        self.person
            .clone()
            .filter(|p| p.id == person_id)
            .ok_or_else(|| VendorError::NotFound(person_id.to_string()))
    }

    async fn webhook_event_types(&self) -> Result<Vec<WebhookEventType>, VendorError> {
        Ok(vec![
            WebhookEventType {
                id: "5".into(),
                name: "DEVICE_STATUS_EVENT".into(),
            },
            WebhookEventType {
                id: "10".into(),
                name: "ZONE_STATUS_EVENT".into(),
            },
            WebhookEventType {
                id: "11".into(),
                name: "WEATHER_INTELLIGENCE_EVENT".into(),
            },
        ])
    }

    async fn list_webhooks(&self, device_id: &str) -> Result<Vec<RegisteredWebhook>, VendorError> {
        if let Some(e) = self.webhook_errors.get(device_id) {
            return Err(e.clone());
        }
        Ok(self
            .webhooks
            .borrow()
            .get(device_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_webhook(&self, webhook_id: &str) -> Result<(), VendorError> {
        self.deleted.borrow_mut().push(webhook_id.to_string());
        Ok(())
    }

    async fn add_webhook(&self, webhook: &NewWebhook) -> Result<(), VendorError> {
        self.added.borrow_mut().push(webhook.clone());
        Ok(())
    }

    async fn device_on(&self, device_id: &str) -> Result<(), VendorError> {
        self.call(format!("device_on {device_id}"))
    }

    async fn device_off(&self, device_id: &str) -> Result<(), VendorError> {
        self.call(format!("device_off {device_id}"))
    }

    async fn start_zone(&self, zone_id: &str, duration: Duration) -> Result<(), VendorError> {
        self.call(format!("start_zone {zone_id} {}", duration.as_secs()))
    }

    async fn stop_water(&self, device_id: &str) -> Result<(), VendorError> {
        self.call(format!("stop_water {device_id}"))
    }

    async fn current_zone(&self, _device_id: &str) -> Result<Option<String>, VendorError> {
        Ok(self.current_zone.clone())
    }
}

pub struct FakeRelay {
    pub active: bool,
    pub connected: bool,
    pub created: RefCell<Vec<String>>,
    pub deleted: RefCell<Vec<String>>,
}

impl FakeRelay {
    pub fn connected() -> Self {
        Self {
            active: true,
            connected: true,
            created: RefCell::new(Vec::new()),
            deleted: RefCell::new(Vec::new()),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::connected()
        }
    }
}

#[async_trait(?Send)]
impl CloudRelay for FakeRelay {
    fn is_active(&self) -> bool {
        self.active
    }

    async fn create_cloudhook(&self, webhook_id: &str) -> Result<Url, RelayError> {
        if !self.connected {
            return Err(RelayError::NotConnected);
        }
        self.created.borrow_mut().push(webhook_id.to_string());
        Url::parse(&format!("https://relay.example.com/hooks/{webhook_id}"))
            .map_err(|e| RelayError::Failed(e.to_string()))
    }

    async fn delete_cloudhook(&self, webhook_id: &str) -> Result<(), RelayError> {
        if !self.connected {
            return Err(RelayError::NotConnected);
        }
        self.deleted.borrow_mut().push(webhook_id.to_string());
        Ok(())
    }
}
