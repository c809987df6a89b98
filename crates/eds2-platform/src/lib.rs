// SPDX-License-Identifier: CEPL-1.0
pub use winit;

mod input;

pub use input::{map_key, KeyCommand, FACTOR_STEP, PATCH_STEP};
