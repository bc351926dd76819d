// SPDX-License-Identifier: MPL-2.0
//! Playback engine configuration constants.

mod defaults;

pub use defaults::*;
