// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Position cache of all shades of one hub.

use crate::shade::client::RawShade;
use crate::shade::position::{PositionKind, RawPositions, ShadePositions};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared position cache of a hub entry, used by the coordinator and the shade entities.
///
/// All actors of an entry run on the same arbiter.
pub type SharedShadeData = Rc<RefCell<ShadeData>>;

#[derive(Debug, Default)]
pub struct ShadeData {
    positions: HashMap<u32, ShadePositions>,
    /// Last shade data fetched by the coordinator.
    group_data: HashMap<u32, RawPositions>,
}

impl ShadeData {
    pub fn new_shared() -> SharedShadeData {
        Rc::new(RefCell::new(ShadeData::default()))
    }

    pub fn positions(&self, shade_id: u32) -> ShadePositions {
        self.positions.get(&shade_id).copied().unwrap_or_default()
    }

    pub fn update_shade_position(&mut self, shade_id: u32, raw: &RawPositions) {
        self.positions.entry(shade_id).or_default().update(raw);
    }

    /// Set a single motor position which the hub doesn't report back after a move.
    pub fn set_position(&mut self, shade_id: u32, kind: PositionKind, position: u16) {
        self.positions.entry(shade_id).or_default().set(kind, position);
    }

    /// Update the cache from shade data returned by the hub. Returns false without position data.
    pub fn update_from_shade(&mut self, shade: &RawShade) -> bool {
        match &shade.positions {
            Some(raw) => {
                self.update_shade_position(shade.id, raw);
                true
            }
            None => false,
        }
    }

    /// Store the latest hub-wide shade data.
    pub fn set_group_data(&mut self, shades: &[RawShade]) {
        self.group_data = shades
            .iter()
            .filter_map(|s| s.positions.clone().map(|p| (s.id, p)))
            .collect();
    }

    /// Apply the shade's entry of the hub-wide data to its positions.
    pub fn update_from_group_data(&mut self, shade_id: u32) -> bool {
        match self.group_data.get(&shade_id).cloned() {
            Some(raw) => {
                self.update_shade_position(shade_id, &raw);
                true
            }
            None => false,
        }
    }
}
