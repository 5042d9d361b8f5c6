// Copyright (c) 2023 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

use std::env;
use std::ffi::OsStr;

/// Retrieves a boolean flag from the given environment variable, e.g. the vendor message tracing
/// switch.
///
/// `true` and `1` enable the flag, case-insensitive. Any other value or an undefined variable
/// disables it.
pub fn bool_from_env<K: AsRef<OsStr>>(key: K) -> bool {
    env::var(key).is_ok_and(|v| is_enabled(&v))
}

fn is_enabled(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}
