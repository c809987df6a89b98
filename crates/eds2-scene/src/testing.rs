// SPDX-License-Identifier: CEPL-1.0
//! Test doubles shared by the unit tests.

use crate::{
    material::{Material, PbrMaterial},
    scene::{NodeId, SceneNode, SubMesh},
};
use eds2_math::Vec4;
use eds2_render::{CommandSink, DrawIndexed, MeshId, PipelineKind, PushConstantBlock};
use std::sync::Arc;

/// Element whose node id is `id`, drawing mesh `id` with 36 indices.
pub fn element(name: &str, id: usize) -> SceneNode {
    SceneNode {
        name: name.to_owned(),
        node: NodeId(id),
        sub_mesh: SubMesh {
            mesh: MeshId(id),
            index_count: 36,
            material: Arc::new(PbrMaterial::new(name, Vec4::new(0.5, 0.5, 0.5, 1.0))),
        },
    }
}

#[derive(Debug)]
pub struct NoColor;

impl Material for NoColor {
    fn name(&self) -> &str {
        "no-color"
    }

    fn base_color_factor(&self) -> Option<Vec4> {
        None
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Cmd {
    Bind(PipelineKind),
    PatchControlPoints(u32),
    DepthBias(bool),
    RasterizerDiscard(bool),
    Push(PushConstantBlock),
    Draw(DrawIndexed),
}

/// Records every call in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub cmds: Vec<Cmd>,
}

impl RecordingSink {
    pub fn draws(&self) -> usize {
        self.cmds.iter().filter(|c| matches!(c, Cmd::Draw(_))).count()
    }

    pub fn colors(&self) -> Vec<[f32; 4]> {
        self.cmds
            .iter()
            .filter_map(|c| match c {
                Cmd::Push(block) => Some(block.color),
                _ => None,
            })
            .collect()
    }
}

impl CommandSink for RecordingSink {
    fn bind_pipeline(&mut self, kind: PipelineKind) {
        self.cmds.push(Cmd::Bind(kind));
    }

    fn set_patch_control_points(&mut self, count: u32) {
        self.cmds.push(Cmd::PatchControlPoints(count));
    }

    fn set_depth_bias_enable(&mut self, enable: bool) {
        self.cmds.push(Cmd::DepthBias(enable));
    }

    fn set_rasterizer_discard_enable(&mut self, enable: bool) {
        self.cmds.push(Cmd::RasterizerDiscard(enable));
    }

    fn push_constants(&mut self, block: &PushConstantBlock) {
        self.cmds.push(Cmd::Push(*block));
    }

    fn draw_indexed(&mut self, draw: DrawIndexed) {
        self.cmds.push(Cmd::Draw(draw));
    }
}
