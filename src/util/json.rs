// Copyright (c) 2022 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

use serde_json::{Map, Value};

/// Copy (and clone) a value from one entry map to another.
///
/// Returns `false` if the key doesn't exist in `source`, `dest` is left untouched.
pub fn copy_entry(source: &Map<String, Value>, dest: &mut Map<String, Value>, key: &str) -> bool {
    match source.get(key) {
        Some(value) => {
            dest.insert(key.to_string(), value.clone());
            true
        }
        None => false,
    }
}
