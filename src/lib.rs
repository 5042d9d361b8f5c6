// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

pub mod alarm;
pub mod controller;
pub mod host;
pub mod irrigation;
pub mod server;
pub mod shade;
pub mod util;

pub mod configuration;
pub mod errors;
pub mod startup;

pub use controller::*;
pub use startup::*;
