// SPDX-License-Identifier: CEPL-1.0
use crate::{
    scene::{Scene, SceneNode},
    selection::{SelectionHighlighter, TimeTick},
    toggles::ToggleTable,
    Result, SceneError,
};
use eds2_render::{CommandSink, PushConstantBlock};

/// Writes the per-object part of a frame: dynamic state, push constants and
/// one indexed draw per object.
pub struct FrameEmitter<'a> {
    pub scene: &'a Scene,
    pub toggles: &'a ToggleTable,
    /// Bucket position of the highlighted object, `None` while highlighting
    /// is off. The object at that position in every bucket pulses.
    pub selection: Option<usize>,
    pub highlighter: &'a mut SelectionHighlighter,
    pub tick: &'a mut TimeTick,
}

impl FrameEmitter<'_> {
    /// Emit `bucket`. Toggles and selection are looked up by position within
    /// the bucket. Everything the bucket needs is checked up front, so on
    /// error nothing has been written to `sink`. Returns the number of draws.
    pub fn emit(&mut self, sink: &mut dyn CommandSink, bucket: &[SceneNode]) -> Result<usize> {
        let toggles = self.toggles.slice(0, bucket.len())?;
        let prepared = bucket
            .iter()
            .map(|object| {
                let material = &object.sub_mesh.material;
                let color = material
                    .base_color_factor()
                    .ok_or_else(|| SceneError::MissingBaseColor(material.name().to_owned()))?;
                Ok((self.scene.world_matrix(object.node)?, color))
            })
            .collect::<Result<Vec<_>>>()?;

        for (index, ((object, toggle), (model, base))) in
            bucket.iter().zip(toggles).zip(prepared).enumerate()
        {
            let color = match self.selection {
                Some(selected) if selected == index => {
                    self.highlighter.highlight(base, selected, self.tick)
                }
                _ => base,
            };

            sink.set_depth_bias_enable(toggle.depth_bias);
            sink.set_rasterizer_discard_enable(toggle.rasterizer_discard);
            sink.push_constants(&PushConstantBlock {
                model: model.to_cols_array_2d(),
                color: color.to_array(),
            });
            sink.draw_indexed(object.sub_mesh.draw());
        }
        Ok(bucket.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        scene::NodeId,
        testing::{element, Cmd, NoColor, RecordingSink},
        toggles::ObjectToggle,
    };
    use eds2_math::Transform;
    use std::sync::Arc;

    fn scene_with(n: usize) -> Scene {
        let mut scene = Scene::new();
        for i in 0..n {
            scene.add_node(format!("n{i}"), Transform::IDENTITY);
        }
        scene
    }

    fn toggle(depth_bias: bool, rasterizer_discard: bool) -> ObjectToggle {
        ObjectToggle {
            depth_bias,
            rasterizer_discard,
        }
    }

    #[test]
    fn three_objects_follow_their_toggles() {
        let scene = scene_with(3);
        let bucket = [element("A", 0), element("B", 1), element("C", 2)];
        let toggles: ToggleTable =
            vec![toggle(true, false), toggle(false, false), toggle(false, true)].into();
        let mut highlighter = SelectionHighlighter::default();
        let mut tick = TimeTick::default();
        let mut emitter = FrameEmitter {
            scene: &scene,
            toggles: &toggles,
            selection: None,
            highlighter: &mut highlighter,
            tick: &mut tick,
        };

        let mut sink = RecordingSink::default();
        assert_eq!(emitter.emit(&mut sink, &bucket).unwrap(), 3);
        assert_eq!(sink.draws(), 3);

        let per_object: Vec<_> = sink.cmds.chunks(4).collect();
        assert_eq!(per_object.len(), 3);
        let expected = [(true, false), (false, false), (false, true)];
        for (i, (cmds, (bias, discard))) in per_object.iter().zip(expected).enumerate() {
            assert_eq!(cmds[0], Cmd::DepthBias(bias));
            assert_eq!(cmds[1], Cmd::RasterizerDiscard(discard));
            assert!(matches!(cmds[2], Cmd::Push(_)));
            assert_eq!(cmds[3], Cmd::Draw(bucket[i].sub_mesh.draw()));
        }
    }

    #[test]
    fn short_table_emits_nothing() {
        let scene = scene_with(3);
        let bucket = [element("A", 0), element("B", 1), element("C", 2)];
        let toggles = ToggleTable::new(2);
        let mut highlighter = SelectionHighlighter::default();
        let mut tick = TimeTick::default();
        let mut emitter = FrameEmitter {
            scene: &scene,
            toggles: &toggles,
            selection: None,
            highlighter: &mut highlighter,
            tick: &mut tick,
        };

        let mut sink = RecordingSink::default();
        let err = emitter.emit(&mut sink, &bucket).unwrap_err();
        assert_eq!(err, SceneError::ToggleOutOfRange { index: 2, len: 2 });
        assert!(sink.cmds.is_empty());
    }

    #[test]
    fn every_bucket_starts_at_entry_zero() {
        let scene = scene_with(3);
        let tessellated = [element("Suzanne", 2)];
        let toggles: ToggleTable =
            vec![toggle(true, true), toggle(false, false), toggle(false, false)].into();
        let mut highlighter = SelectionHighlighter::default();
        let mut tick = TimeTick::default();
        let mut emitter = FrameEmitter {
            scene: &scene,
            toggles: &toggles,
            selection: None,
            highlighter: &mut highlighter,
            tick: &mut tick,
        };

        let mut sink = RecordingSink::default();
        emitter.emit(&mut sink, &tessellated).unwrap();
        assert_eq!(sink.cmds[0], Cmd::DepthBias(true));
        assert_eq!(sink.cmds[1], Cmd::RasterizerDiscard(true));

        let empty = ToggleTable::default();
        emitter.toggles = &empty;
        assert_eq!(
            emitter.emit(&mut sink, &tessellated),
            Err(SceneError::ToggleOutOfRange { index: 0, len: 0 })
        );
    }

    #[test]
    fn missing_base_colour_is_rejected() {
        let scene = scene_with(2);
        let mut odd = element("B", 1);
        odd.sub_mesh.material = Arc::new(NoColor);
        let bucket = [element("A", 0), odd];
        let toggles = ToggleTable::new(2);
        let mut highlighter = SelectionHighlighter::default();
        let mut tick = TimeTick::default();
        let mut emitter = FrameEmitter {
            scene: &scene,
            toggles: &toggles,
            selection: None,
            highlighter: &mut highlighter,
            tick: &mut tick,
        };

        let mut sink = RecordingSink::default();
        assert_eq!(
            emitter.emit(&mut sink, &bucket),
            Err(SceneError::MissingBaseColor("no-color".into()))
        );
        assert!(sink.cmds.is_empty());
    }

    #[test]
    fn unknown_node_is_rejected() {
        let scene = scene_with(1);
        let mut stray = element("A", 0);
        stray.node = NodeId(5);
        let toggles = ToggleTable::new(1);
        let mut highlighter = SelectionHighlighter::default();
        let mut tick = TimeTick::default();
        let mut emitter = FrameEmitter {
            scene: &scene,
            toggles: &toggles,
            selection: None,
            highlighter: &mut highlighter,
            tick: &mut tick,
        };
        let mut sink = RecordingSink::default();
        assert_eq!(
            emitter.emit(&mut sink, &[stray]),
            Err(SceneError::UnknownNode(5))
        );
    }

    #[test]
    fn only_the_selected_object_pulses() {
        let scene = scene_with(3);
        let bucket = [element("A", 0), element("B", 1), element("C", 2)];
        let toggles = ToggleTable::new(3);
        let mut highlighter = SelectionHighlighter::default();
        let mut tick = TimeTick::default();
        tick.arm();
        let mut emitter = FrameEmitter {
            scene: &scene,
            toggles: &toggles,
            selection: Some(1),
            highlighter: &mut highlighter,
            tick: &mut tick,
        };

        let mut sink = RecordingSink::default();
        emitter.emit(&mut sink, &bucket).unwrap();
        let alphas: Vec<f32> = sink.colors().iter().map(|c| c[3]).collect();
        assert_eq!(alphas[0], 1.0);
        assert!(alphas[1] < 1.0);
        assert_eq!(alphas[2], 1.0);
        assert!(!tick.is_armed());
    }
}
