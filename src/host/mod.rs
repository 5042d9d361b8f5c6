// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Host entity abstraction shared by all vendor integrations.
//!
//! The integrations don't know about the [`Controller`](crate::Controller) and only interact with
//! it through the types in this module: they publish [`StateChanged`] messages, receive
//! [`CallEntity`] commands, and hand back a [`LoadedEntry`] after a successful setup.

mod entry;
mod messages;
mod runtime_data;
#[cfg(test)]
pub(crate) mod testing;

pub use entry::*;
pub use messages::*;
pub use runtime_data::*;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString, VariantNames};

/// Entity platforms provided by the integrations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, VariantNames, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    AlarmControlPanel,
    Cover,
    Switch,
}

/// Host representation of an entity state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub entry_id: String,
    pub name: String,
    pub available: bool,
    /// Entity type specific state value, e.g. `open`, `armed_away` or `on`.
    pub state: String,
    pub features: Vec<String>,
    pub attributes: Map<String, Value>,
}

pub const STATE_UNAVAILABLE: &str = "unavailable";
pub const STATE_UNKNOWN: &str = "unknown";

impl EntityState {
    pub fn new(
        entity_id: impl Into<String>,
        entity_type: EntityType,
        entry_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_type,
            entry_id: entry_id.into(),
            name: name.into(),
            available: true,
            state: STATE_UNKNOWN.into(),
            features: Vec::new(),
            attributes: Map::new(),
        }
    }

    /// Value reported to the host: an unavailable entity always reports `unavailable`.
    pub fn reported_state(&self) -> &str {
        if self.available {
            &self.state
        } else {
            STATE_UNAVAILABLE
        }
    }
}
