// SPDX-License-Identifier: CEPL-1.0

/// User intent, decoupled from the input device that produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlAction {
    /// Select by position within a bucket.
    Select(usize),
    SelectNext,
    SelectPrevious,
    ToggleSelection,
    /// Flip depth bias on the selected object.
    ToggleDepthBias,
    /// Flip rasterizer discard on the selected object.
    ToggleRasterizerDiscard,
    ToggleTessellation,
    AdjustTessellationFactor(f32),
    AdjustPatchControlPoints(f32),
}
