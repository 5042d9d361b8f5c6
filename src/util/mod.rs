// Copyright (c) 2022 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Common utility functions.

mod env;
pub mod json;
mod macros;
mod network;

pub use env::*;
pub(crate) use macros::*;
pub use network::*;
