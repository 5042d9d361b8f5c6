// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Shade subtype specific position logic.
//!
//! The subtype is selected once per device from its capabilities. Top-down/bottom-up shades are
//! split into two logical entities sharing one set of motor positions.

use crate::shade::client::RawShade;
use crate::shade::position::{
    MAX_POSITION, MIN_POSITION, PositionKind, RawPositions, SILHOUETTE_MAX_TILT, ShadePositions,
    hd_position_to_percent, is_closed_position, percent_to_hd_position,
};
use strum::{Display, EnumString, VariantNames};

/// Shade type ids of Silhouette shades with the reduced vane range.
const SILHOUETTE_TYPES: &[u16] = &[23];
/// Shade type ids of top-down/bottom-up shades, used if the hub doesn't report capabilities.
const TDBU_TYPES: &[u16] = &[8, 33, 47];

/// Capability descriptor of a physical shade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadeCapabilities {
    pub can_tilt: bool,
    /// Number of rail motors: 2 for top-down/bottom-up shades.
    pub rail_count: u8,
    pub vane_max: u16,
}

impl ShadeCapabilities {
    pub fn from_shade(shade: &RawShade) -> Self {
        let tdbu = shade.capabilities == Some(7)
            || (shade.capabilities.is_none() && TDBU_TYPES.contains(&shade.shade_type));
        let silhouette = SILHOUETTE_TYPES.contains(&shade.shade_type);
        let can_tilt = silhouette || matches!(shade.capabilities, Some(1 | 2 | 4 | 5 | 9));
        Self {
            can_tilt: can_tilt && !tdbu,
            rail_count: if tdbu { 2 } else { 1 },
            vane_max: if silhouette {
                SILHOUETTE_MAX_TILT
            } else {
                MAX_POSITION
            },
        }
    }
}

/// Shade subtype of a logical cover entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadeKind {
    Plain,
    /// Bottom-up shade with a vane motor.
    Tilt,
    /// Tilt shade with the reduced Silhouette vane range.
    Silhouette,
    /// Top rail of a top-down/bottom-up shade.
    TdbuTop,
    /// Bottom rail of a top-down/bottom-up shade.
    TdbuBottom,
}

/// Cover entity features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum CoverFeature {
    Open,
    Close,
    Stop,
    Position,
    OpenTilt,
    CloseTilt,
    StopTilt,
    TiltPosition,
}

/// A move request with the positions the hub won't report back in its response.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadeMove {
    pub request: RawPositions,
    pub new_positions: Vec<(PositionKind, u16)>,
}

impl ShadeMove {
    fn new(request: RawPositions) -> Self {
        Self {
            request,
            new_positions: Vec::new(),
        }
    }

    fn with_new_position(mut self, kind: PositionKind, position: u16) -> Self {
        self.new_positions.push((kind, position));
        self
    }
}

impl ShadeKind {
    /// Select the logical entities for a physical shade.
    pub fn for_capabilities(caps: ShadeCapabilities) -> Vec<ShadeKind> {
        if caps.rail_count == 2 {
            vec![ShadeKind::TdbuTop, ShadeKind::TdbuBottom]
        } else if caps.can_tilt && caps.vane_max == SILHOUETTE_MAX_TILT {
            vec![ShadeKind::Silhouette]
        } else if caps.can_tilt {
            vec![ShadeKind::Tilt]
        } else {
            vec![ShadeKind::Plain]
        }
    }

    /// Suffix of the entity id and name for the logical halves of a dual-rail shade.
    pub fn rail_suffix(self) -> Option<(&'static str, &'static str)> {
        match self {
            ShadeKind::TdbuTop => Some(("_top", " Top")),
            ShadeKind::TdbuBottom => Some(("_bottom", " Bottom")),
            _ => None,
        }
    }

    /// Vane range of tilt capable shades.
    pub fn vane_max(self) -> Option<u16> {
        match self {
            ShadeKind::Tilt => Some(MAX_POSITION),
            ShadeKind::Silhouette => Some(SILHOUETTE_MAX_TILT),
            _ => None,
        }
    }

    pub fn can_tilt(self) -> bool {
        self.vane_max().is_some()
    }

    pub fn features(self, stop_supported: bool) -> Vec<CoverFeature> {
        let mut features = vec![
            CoverFeature::Open,
            CoverFeature::Close,
            CoverFeature::Position,
        ];
        if stop_supported {
            features.push(CoverFeature::Stop);
        }
        if self.can_tilt() {
            features.extend([
                CoverFeature::OpenTilt,
                CoverFeature::CloseTilt,
                CoverFeature::TiltPosition,
            ]);
            if stop_supported {
                features.push(CoverFeature::StopTilt);
            }
        }
        features
    }

    /// Rail position of this entity in percent.
    pub fn current_position(self, positions: &ShadePositions) -> u8 {
        match self {
            ShadeKind::TdbuTop => hd_position_to_percent(positions.secondary, MAX_POSITION),
            _ => hd_position_to_percent(positions.primary, MAX_POSITION),
        }
    }

    pub fn current_tilt_position(self, positions: &ShadePositions) -> Option<u8> {
        self.vane_max()
            .map(|max| hd_position_to_percent(positions.vane, max))
    }

    pub fn is_closed(self, positions: &ShadePositions) -> bool {
        match self {
            ShadeKind::TdbuTop => is_closed_position(positions.secondary),
            _ => is_closed_position(positions.primary),
        }
    }

    /// Number of percentage steps currently "travelled" by the motors of this entity.
    pub fn transition_steps(self, positions: &ShadePositions) -> i32 {
        let primary = hd_position_to_percent(positions.primary, MAX_POSITION) as i32;
        match self {
            ShadeKind::Plain => primary,
            ShadeKind::TdbuTop | ShadeKind::TdbuBottom => {
                primary + hd_position_to_percent(positions.secondary, MAX_POSITION) as i32
            }
            ShadeKind::Tilt | ShadeKind::Silhouette => {
                primary + self.current_tilt_position(positions).unwrap_or_default() as i32
            }
        }
    }

    /// Don't allow a rail to move into an impossible position past its coupled rail.
    pub fn clamp(self, target: u8, positions: &ShadePositions) -> u8 {
        match self {
            ShadeKind::TdbuBottom => {
                let top = hd_position_to_percent(positions.secondary, MAX_POSITION);
                target.min(100 - top)
            }
            ShadeKind::TdbuTop => {
                let bottom = hd_position_to_percent(positions.primary, MAX_POSITION);
                target.min(100 - bottom)
            }
            _ => target,
        }
    }

    /// Move request for a target rail position in percent.
    ///
    /// Dual-rail shades always send both rail positions, keeping the other rail unchanged.
    pub fn position_move(self, target: u8, positions: &ShadePositions) -> ShadeMove {
        let target = percent_to_hd_position(target, MAX_POSITION);
        match self {
            ShadeKind::Plain => ShadeMove::new(RawPositions::single(PositionKind::Primary, target)),
            ShadeKind::Tilt | ShadeKind::Silhouette => {
                ShadeMove::new(RawPositions::single(PositionKind::Primary, target))
                    .with_new_position(PositionKind::Vane, MIN_POSITION)
            }
            ShadeKind::TdbuBottom => {
                ShadeMove::new(RawPositions::rails(target, positions.secondary))
            }
            ShadeKind::TdbuTop => ShadeMove::new(RawPositions::rails(positions.primary, target)),
        }
    }

    pub fn open_move(self) -> ShadeMove {
        match self {
            ShadeKind::Plain => ShadeMove::new(RawPositions::single(
                PositionKind::Primary,
                MAX_POSITION,
            )),
            ShadeKind::Tilt | ShadeKind::Silhouette => ShadeMove::new(RawPositions::single(
                PositionKind::Primary,
                MAX_POSITION,
            ))
            .with_new_position(PositionKind::Vane, MIN_POSITION),
            ShadeKind::TdbuBottom => {
                ShadeMove::new(RawPositions::rails(MAX_POSITION, MIN_POSITION))
            }
            ShadeKind::TdbuTop => ShadeMove::new(RawPositions::rails(MIN_POSITION, MAX_POSITION)),
        }
    }

    pub fn close_move(self) -> ShadeMove {
        match self {
            ShadeKind::Plain => ShadeMove::new(RawPositions::single(
                PositionKind::Primary,
                MIN_POSITION,
            )),
            ShadeKind::Tilt | ShadeKind::Silhouette => ShadeMove::new(RawPositions::single(
                PositionKind::Primary,
                MIN_POSITION,
            ))
            .with_new_position(PositionKind::Vane, MIN_POSITION),
            ShadeKind::TdbuTop | ShadeKind::TdbuBottom => {
                ShadeMove::new(RawPositions::rails(MIN_POSITION, MIN_POSITION))
            }
        }
    }

    /// Move request for a target vane position in percent. The rail closes while tilting.
    pub fn tilt_move(self, target: u8) -> Option<ShadeMove> {
        let max = self.vane_max()?;
        Some(self.vane_move(percent_to_hd_position(target, max)))
    }

    pub fn open_tilt_move(self) -> Option<ShadeMove> {
        self.vane_max().map(|max| self.vane_move(max))
    }

    pub fn close_tilt_move(self) -> Option<ShadeMove> {
        self.vane_max().map(|_| self.vane_move(MIN_POSITION))
    }

    fn vane_move(self, vane: u16) -> ShadeMove {
        ShadeMove::new(RawPositions::single(PositionKind::Vane, vane))
            .with_new_position(PositionKind::Primary, MIN_POSITION)
    }
}
