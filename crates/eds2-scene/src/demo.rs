// SPDX-License-Identifier: CEPL-1.0
use crate::{
    animator::{NodeAnimator, OscillatorSettings, ANIMATED_NODE_NAME},
    controls::ControlAction,
    emitter::FrameEmitter,
    partition::{partition_by_name, Buckets, TESSELLATED_MESH_NAME},
    scene::Scene,
    selection::{SelectionHighlighter, TimeTick},
    settings::Settings,
    Refresh, Result,
};
use eds2_math::{Camera, Vec4};
use eds2_render::{
    BaselineUbo, CommandSink, FrameRecorder, FrameUniforms, PipelineKind, TessellationUbo,
};

/// Startup values for [`Demo`].
#[derive(Clone, Debug)]
pub struct DemoConfig {
    pub tessellation: bool,
    pub tessellation_factor: f32,
    pub patch_control_points: f32,
    pub selection_active: bool,
    pub selected_index: usize,
    pub animation: OscillatorSettings,
    pub camera: Camera,
    pub light_pos: Vec4,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            tessellation: true,
            tessellation_factor: 1.0,
            patch_control_points: 3.0,
            selection_active: false,
            selected_index: 0,
            animation: OscillatorSettings::default(),
            camera: Camera::default(),
            light_pos: Vec4::new(0.0, 5.0, -5.0, 1.0),
        }
    }
}

/// Everything the sample mutates between frames.
#[derive(Debug)]
pub struct Demo {
    scene: Scene,
    buckets: Buckets,
    settings: Settings,
    highlighter: SelectionHighlighter,
    animator: NodeAnimator,
    tick: TimeTick,
    camera: Camera,
    light_pos: Vec4,
}

impl Demo {
    pub fn new(scene: Scene, config: &DemoConfig) -> Result<Self> {
        let buckets = partition_by_name(scene.elements().to_vec(), TESSELLATED_MESH_NAME);
        let animator =
            NodeAnimator::new(&scene, &buckets.baseline, ANIMATED_NODE_NAME, config.animation)?;

        let mut settings = Settings::new(buckets.len());
        settings.set_tessellation(config.tessellation);
        settings.set_tessellation_factor(config.tessellation_factor);
        settings.set_patch_control_points(config.patch_control_points);
        settings.set_selection_active(config.selection_active);
        if let Err(err) = settings.select(config.selected_index) {
            tracing::warn!(%err, "ignoring configured selection");
        }

        tracing::info!(
            baseline = buckets.baseline.len(),
            tessellated = buckets.tessellated.len(),
            "scene partitioned"
        );

        Ok(Self {
            scene,
            buckets,
            settings,
            highlighter: SelectionHighlighter::default(),
            animator,
            tick: TimeTick::default(),
            camera: config.camera,
            light_pos: config.light_pos,
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Logic update with `dt` seconds of real time.
    pub fn update(&mut self, dt: f32) -> Result<Refresh> {
        self.animator.update(dt, &mut self.scene, &mut self.tick)
    }

    pub fn uniforms(&self, aspect: f32) -> FrameUniforms {
        let projection = self.camera.projection(aspect).to_cols_array_2d();
        let view = self.camera.view().to_cols_array_2d();
        FrameUniforms {
            baseline: BaselineUbo { projection, view },
            tessellation: TessellationUbo {
                projection,
                view,
                light_pos: self.light_pos.to_array(),
                tessellation_factor: self.settings.effective_tessellation_factor(),
                _pad: [0.0; 3],
            },
        }
    }

    pub fn apply(&mut self, action: ControlAction) -> Result<Refresh> {
        let s = &mut self.settings;
        let count = s.object_count();
        let selected = s.selected_index();

        let refresh = match action {
            ControlAction::Select(index) => s.select(index)?,
            ControlAction::SelectNext if count > 0 => s.select((selected + 1) % count)?,
            ControlAction::SelectPrevious if count > 0 => {
                s.select((selected + count - 1) % count)?
            }
            ControlAction::SelectNext | ControlAction::SelectPrevious => Refresh::empty(),
            ControlAction::ToggleSelection => s.set_selection_active(!s.selection_active()),
            ControlAction::ToggleDepthBias => {
                let on = !s.object(selected)?.depth_bias;
                s.set_depth_bias(selected, on)?
            }
            ControlAction::ToggleRasterizerDiscard => {
                let on = !s.object(selected)?.rasterizer_discard;
                s.set_rasterizer_discard(selected, on)?
            }
            ControlAction::ToggleTessellation => s.set_tessellation(!s.tessellation()),
            ControlAction::AdjustTessellationFactor(delta) => {
                s.set_tessellation_factor((s.tessellation_factor() + delta).max(0.0))
            }
            ControlAction::AdjustPatchControlPoints(delta) => {
                s.set_patch_control_points(s.patch_control_points_input() + delta)
            }
        };

        tracing::debug!(?action, ?refresh, "control applied");
        Ok(refresh)
    }
}

impl FrameRecorder for Demo {
    fn record(&mut self, sink: &mut dyn CommandSink) -> anyhow::Result<()> {
        let mut emitter = FrameEmitter {
            scene: &self.scene,
            toggles: self.settings.toggles(),
            selection: self.settings.active_selection(),
            highlighter: &mut self.highlighter,
            tick: &mut self.tick,
        };

        for kind in [PipelineKind::Baseline, PipelineKind::Tessellation] {
            sink.bind_pipeline(kind);
            if kind == PipelineKind::Tessellation {
                sink.set_patch_control_points(self.settings.patch_control_points());
            }
            emitter.emit(sink, self.buckets.get(kind))?;
        }
        Ok(())
    }
}
