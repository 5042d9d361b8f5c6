// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! In-memory Hive account for tests.

use crate::alarm::client::{AlarmDevice, HiveApi};
use crate::errors::VendorError;
use async_trait::async_trait;
use std::cell::RefCell;

#[derive(Default)]
pub struct FakeHive {
    pub devices: RefCell<Vec<AlarmDevice>>,
    pub modes: RefCell<Vec<(String, String)>>,
    pub error: Option<VendorError>,
}

impl FakeHive {
    pub fn with_alarm(device: AlarmDevice) -> Self {
        Self {
            devices: RefCell::new(vec![device]),
            ..Default::default()
        }
    }
}

pub fn alarm_device(mode: &str, online: bool, triggered: bool) -> AlarmDevice {
    AlarmDevice {
        id: "alarm1".into(),
        name: "House alarm".into(),
        online,
        mode: mode.into(),
        triggered,
    }
}

#[async_trait(?Send)]
impl HiveApi for FakeHive {
    async fn list_alarms(&self) -> Result<Vec<AlarmDevice>, VendorError> {
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(self.devices.borrow().clone()),
        }
    }

    async fn get_alarm(&self, device_id: &str) -> Result<AlarmDevice, VendorError> {
        self.list_alarms()
            .await?
            .into_iter()
            .find(|d| d.id == device_id)
            .ok_or_else(|| VendorError::NotFound(device_id.to_string()))
    }

    async fn set_mode(&self, device_id: &str, mode: &str) -> Result<(), VendorError> {
        self.modes
            .borrow_mut()
            .push((device_id.to_string(), mode.to_string()));
        Ok(())
    }
}
