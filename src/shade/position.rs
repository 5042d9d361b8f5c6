// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! PowerView position ranges and conversion between hub positions and percentages.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MIN_POSITION: u16 = 0;
pub const MAX_POSITION: u16 = 65535;
/// Vane range of Silhouette shades.
pub const SILHOUETTE_MAX_TILT: u16 = 32767;

/// Rail positions at or below 0.75 % of the range are closed.
///
/// Some shades report a position a little above 0 although they are clearly closed.
/// This currently equals 491.5125.
pub const CLOSED_POSITION: f64 = 0.75 / 100.0 * (MAX_POSITION - MIN_POSITION) as f64;

/// Estimated time in seconds a full transition from one end to the other takes.
pub const TRANSITION_COMPLETE_DURATION: i64 = 40;

/// Delay of the second state refresh after a transition, since the hub may report stale state.
pub const RESYNC_DELAY: Duration = Duration::from_secs(60);

/// Convert a hub position to a percentage, rounding to the nearest value.
pub fn hd_position_to_percent(position: u16, max: u16) -> u8 {
    let percent = (position as f64 / max as f64 * 100.0).round();
    percent.min(100.0) as u8
}

/// Convert a percentage to a hub position, truncating the fractional part.
pub fn percent_to_hd_position(percent: u8, max: u16) -> u16 {
    (percent.min(100) as f64 / 100.0 * max as f64) as u16
}

pub fn is_closed_position(position: u16) -> bool {
    position as f64 <= CLOSED_POSITION
}

/// Estimated transition duration for moving the given number of percentage steps:
/// `1 + floor(40 * steps / 100)` seconds.
///
/// Steps may be negative for open commands of shades with two motors; the delay is then zero.
pub fn transition_duration(steps: i32) -> Duration {
    let seconds = 1 + TRANSITION_COMPLETE_DURATION * steps as i64 / 100;
    Duration::from_secs(seconds.max(0) as u64)
}

/// Motor of a shade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionKind {
    /// Bottom rail.
    Primary = 1,
    /// Top rail of top-down/bottom-up shades.
    Secondary = 2,
    Vane = 3,
}

impl PositionKind {
    pub fn from_raw(kind: u8) -> Option<Self> {
        match kind {
            1 => Some(PositionKind::Primary),
            2 => Some(PositionKind::Secondary),
            3 => Some(PositionKind::Vane),
            _ => None,
        }
    }
}

/// Position data as used by the hub in shade data and move requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPositions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos_kind1: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position1: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos_kind2: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position2: Option<u16>,
}

impl RawPositions {
    pub fn single(kind: PositionKind, position: u16) -> Self {
        Self {
            pos_kind1: Some(kind as u8),
            position1: Some(position),
            ..Default::default()
        }
    }

    /// Request for both rails of a top-down/bottom-up shade.
    pub fn rails(primary: u16, secondary: u16) -> Self {
        Self {
            pos_kind1: Some(PositionKind::Primary as u8),
            position1: Some(primary),
            pos_kind2: Some(PositionKind::Secondary as u8),
            position2: Some(secondary),
        }
    }

    /// Iterate the valid (kind, position) pairs.
    pub fn entries(&self) -> impl Iterator<Item = (PositionKind, u16)> {
        [
            (self.pos_kind1, self.position1),
            (self.pos_kind2, self.position2),
        ]
        .into_iter()
        .filter_map(|(kind, position)| {
            Some((PositionKind::from_raw(kind?)?, position?))
        })
    }
}

/// Current motor positions of one physical shade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShadePositions {
    pub primary: u16,
    pub secondary: u16,
    pub vane: u16,
}

impl ShadePositions {
    pub fn set(&mut self, kind: PositionKind, position: u16) {
        match kind {
            PositionKind::Primary => self.primary = position,
            PositionKind::Secondary => self.secondary = position,
            PositionKind::Vane => self.vane = position,
        }
    }

    pub fn update(&mut self, raw: &RawPositions) {
        for (kind, position) in raw.entries() {
            self.set(kind, position);
        }
    }
}
