// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! In-memory PowerView hub for tests.

use crate::errors::VendorError;
use crate::shade::client::{HubInfo, PowerviewApi, RawRoom, RawShade};
use crate::shade::position::RawPositions;
use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

#[derive(Default)]
pub struct FakeHub {
    pub model: String,
    pub rooms: Vec<RawRoom>,
    pub shades: RefCell<HashMap<u32, RawShade>>,
    /// Shades failing or timing out a refresh request.
    pub refresh_errors: RefCell<HashMap<u32, VendorError>>,
    pub moves: RefCell<Vec<(u32, RawPositions)>>,
    pub refreshes: Cell<u32>,
    pub stops: Cell<u32>,
}

impl FakeHub {
    pub fn with_shades(shades: Vec<RawShade>) -> Self {
        Self {
            model: "PV Hub2.0".into(),
            shades: RefCell::new(shades.into_iter().map(|s| (s.id, s)).collect()),
            ..Default::default()
        }
    }

    fn shade(&self, shade_id: u32) -> Result<RawShade, VendorError> {
        self.shades
            .borrow()
            .get(&shade_id)
            .cloned()
            .ok_or_else(|| VendorError::NotFound(shade_id.to_string()))
    }
}

pub fn raw_shade(id: u32, capabilities: u8, positions: Option<RawPositions>) -> RawShade {
    RawShade {
        id,
        name: Some(format!("Shade {id}")),
        room_id: Some(1),
        shade_type: 5,
        capabilities: Some(capabilities),
        battery_kind: Some(2),
        positions,
    }
}

#[async_trait(?Send)]
impl PowerviewApi for FakeHub {
    async fn hub_info(&self) -> Result<HubInfo, VendorError> {
        Ok(HubInfo {
            name: "Test hub".into(),
            serial_number: Some("1234".into()),
            model: self.model.clone(),
        })
    }

    async fn rooms(&self) -> Result<Vec<RawRoom>, VendorError> {
        Ok(self.rooms.clone())
    }

    async fn shades(&self) -> Result<Vec<RawShade>, VendorError> {
        Ok(self.shades.borrow().values().cloned().collect())
    }

    async fn refresh(&self, shade_id: u32) -> Result<RawShade, VendorError> {
        self.refreshes.set(self.refreshes.get() + 1);
        if let Some(e) = self.refresh_errors.borrow().get(&shade_id) {
            return Err(e.clone());
        }
        self.shade(shade_id)
    }

    async fn move_shade(
        &self,
        shade_id: u32,
        positions: &RawPositions,
    ) -> Result<RawShade, VendorError> {
        self.moves.borrow_mut().push((shade_id, positions.clone()));
        let mut shade = self.shade(shade_id)?;
        // the hub only echoes the requested motor positions
        shade.positions = Some(positions.clone());
        Ok(shade)
    }

    async fn stop(&self, shade_id: u32) -> Result<RawShade, VendorError> {
        self.stops.set(self.stops.get() + 1);
        self.shade(shade_id)
    }
}
