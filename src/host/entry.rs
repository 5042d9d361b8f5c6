// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Integration configuration entries.

use crate::errors::SetupError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Vendor integration of a configuration entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum Domain {
    #[strum(serialize = "hive")]
    #[serde(rename = "hive")]
    Hive,
    #[strum(serialize = "hunterdouglas_powerview")]
    #[serde(rename = "hunterdouglas_powerview")]
    Powerview,
    #[strum(serialize = "rachio")]
    #[serde(rename = "rachio")]
    Rachio,
}

/// A configured integration instance, e.g. one PowerView hub or one Rachio account.
///
/// `data` holds the connection data (host, api key, access token, webhook id). Setup may add
/// generated values which are then persisted. `options` holds user preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub entry_id: String,
    pub domain: Domain,
    pub title: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl ConfigEntry {
    pub fn new(entry_id: impl Into<String>, domain: Domain, title: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            domain,
            title: title.into(),
            data: Map::new(),
            options: Map::new(),
        }
    }

    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Get a mandatory string value from the entry data.
    ///
    /// A missing value is a permanent setup failure.
    pub fn required_str(&self, key: &str) -> Result<&str, SetupError> {
        self.data_str(key).ok_or_else(|| {
            SetupError::Failed(format!("[{}] missing entry data: {key}", self.entry_id))
        })
    }

    pub fn option_u64(&self, key: &str) -> Option<u64> {
        self.options.get(key).and_then(|v| v.as_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigEntry, Domain};
    use crate::errors::SetupError;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn domain_from_entry_json() {
        let entry: ConfigEntry = serde_json::from_value(json!({
            "entry_id": "pv1",
            "domain": "hunterdouglas_powerview",
            "title": "Living room hub",
            "data": { "host": "192.168.1.20" }
        }))
        .expect("valid entry");

        assert_eq!(Domain::Powerview, entry.domain);
        assert_eq!(Some("192.168.1.20"), entry.data_str("host"));
        assert!(entry.options.is_empty());
        assert_eq!(Ok(Domain::Rachio), Domain::from_str("rachio"));
    }

    #[test]
    fn empty_required_value_is_a_setup_failure() {
        let entry = ConfigEntry::new("r1", Domain::Rachio, "Rachio").with_data("api_key", "");
        assert!(matches!(
            entry.required_str("api_key"),
            Err(SetupError::Failed(_))
        ));
    }
}
