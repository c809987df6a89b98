// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Scene bookkeeping and per-frame dynamic state logic.
//!
//! Nothing in here talks to a GPU: frames are written into an
//! [`eds2_render::CommandSink`], which the Vulkan backend (or a test double)
//! turns into real commands.

mod animator;
mod controls;
mod demo;
mod emitter;
mod error;
pub mod geometry;
mod material;
mod partition;
mod scene;
mod selection;
mod settings;
mod toggles;

pub use animator::{NodeAnimator, OscillatorSettings, ANIMATED_NODE_NAME};
pub use controls::ControlAction;
pub use demo::{Demo, DemoConfig};
pub use emitter::FrameEmitter;
pub use error::{Result, SceneError};
pub use material::{Material, PbrMaterial};
pub use partition::{partition, partition_by_name, Buckets, TESSELLATED_MESH_NAME};
pub use scene::{test_scene, Node, NodeId, Scene, SceneNode, SubMesh};
pub use selection::{
    Direction, SelectionHighlighter, TimeTick, ALPHA_CEILING, ALPHA_FLOOR, HIGHLIGHT_STEP,
};
pub use settings::{Settings, MIN_PATCH_CONTROL_POINTS};
pub use toggles::{ObjectToggle, ToggleTable};

bitflags::bitflags! {
    /// Work the caller owes the renderer after a state change.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Refresh: u8 {
        /// Re-record every per-image command buffer.
        const COMMANDS = 1 << 0;
        /// Re-upload uniform buffers.
        const UNIFORMS = 1 << 1;
    }
}

#[cfg(test)]
pub(crate) mod testing;
