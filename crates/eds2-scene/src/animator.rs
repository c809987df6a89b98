// SPDX-License-Identifier: CEPL-1.0
use crate::{
    scene::{NodeId, Scene, SceneNode},
    selection::{Direction, TimeTick},
    Refresh, Result,
};
use eds2_math::Vec3;

/// Node nudged back and forth so its z-fighting partner flickers.
pub const ANIMATED_NODE_NAME: &str = "z_fight_1";

/// Timing and amplitude of the X oscillation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OscillatorSettings {
    /// Seconds between moves; a move happens once elapsed time exceeds it.
    pub interval: f32,
    /// X distance per move.
    pub step: f32,
    /// Direction flips once the offset from the start exceeds ±bound.
    pub bound: f32,
}

impl Default for OscillatorSettings {
    fn default() -> Self {
        Self {
            interval: 0.05,
            step: 0.0005,
            bound: 0.03,
        }
    }
}

/// Time-sliced X oscillation of one scene node.
#[derive(Clone, Debug)]
pub struct NodeAnimator {
    node: NodeId,
    translation: Vec3,
    difference: f32,
    direction: Direction,
    elapsed: f32,
    settings: OscillatorSettings,
}

impl NodeAnimator {
    /// Tracks the node called `name` among `bucket`, starting from its
    /// current translation.
    pub fn new(
        scene: &Scene,
        bucket: &[SceneNode],
        name: &str,
        settings: OscillatorSettings,
    ) -> Result<Self> {
        let node = scene.find_node(bucket, name)?;
        Ok(Self {
            node,
            translation: scene.node(node)?.transform.translation(),
            difference: 0.0,
            direction: Direction::Rising,
            elapsed: 0.0,
            settings,
        })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn difference(&self) -> f32 {
        self.difference
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Advance by `dt` seconds. When the interval has passed, move the node
    /// one step, arm `tick` and ask for a command re-record.
    pub fn update(&mut self, dt: f32, scene: &mut Scene, tick: &mut TimeTick) -> Result<Refresh> {
        self.elapsed += dt;
        if self.elapsed <= self.settings.interval {
            return Ok(Refresh::empty());
        }

        if self.difference < -self.settings.bound {
            self.direction = Direction::Rising;
        } else if self.difference > self.settings.bound {
            self.direction = Direction::Falling;
        }

        let delta = self.direction.sign() * self.settings.step;
        self.translation.x += delta;
        self.difference += delta;
        self.elapsed = 0.0;

        scene.node_mut(self.node)?.transform.set_translation(self.translation);
        tick.arm();
        tracing::trace!(x = self.translation.x, difference = self.difference, "node moved");
        Ok(Refresh::COMMANDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::test_scene;
    use approx::assert_relative_eq;

    fn animator(scene: &Scene) -> NodeAnimator {
        NodeAnimator::new(
            scene,
            scene.elements(),
            ANIMATED_NODE_NAME,
            OscillatorSettings::default(),
        )
        .unwrap()
    }

    fn node_x(scene: &Scene, id: NodeId) -> f32 {
        scene.node(id).unwrap().transform.translation.x
    }

    #[test]
    fn missing_node_is_an_error() {
        let scene = test_scene();
        let err = NodeAnimator::new(&scene, &[], ANIMATED_NODE_NAME, Default::default());
        assert!(err.is_err());
    }

    #[test]
    fn moves_only_after_interval() {
        let mut scene = test_scene();
        let mut anim = animator(&scene);
        let mut tick = TimeTick::default();
        let x0 = node_x(&scene, anim.node());

        assert_eq!(anim.update(0.03, &mut scene, &mut tick).unwrap(), Refresh::empty());
        assert!(!tick.is_armed());
        assert_eq!(node_x(&scene, anim.node()), x0);

        assert_eq!(anim.update(0.03, &mut scene, &mut tick).unwrap(), Refresh::COMMANDS);
        assert!(tick.take());
        assert_relative_eq!(node_x(&scene, anim.node()), x0 + 0.0005);

        // exactly one interval is not enough: must exceed it
        assert_eq!(anim.update(0.05, &mut scene, &mut tick).unwrap(), Refresh::empty());
        assert!(!tick.is_armed());
    }

    #[test]
    fn other_nodes_untouched() {
        let mut scene = test_scene();
        let mut anim = animator(&scene);
        let before: Vec<_> = scene
            .elements()
            .iter()
            .map(|e| scene.world_matrix(e.node).unwrap())
            .collect();
        let mut tick = TimeTick::default();
        for _ in 0..10 {
            anim.update(0.1, &mut scene, &mut tick).unwrap();
        }
        for (element, m) in scene.elements().iter().zip(before) {
            if element.node != anim.node() {
                assert_eq!(scene.world_matrix(element.node).unwrap(), m);
            }
        }
    }

    #[test]
    fn stays_within_band_and_flips_only_past_bound() {
        // node at the origin keeps float drift out of the band check
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(crate::geometry::cube("Plate"));
        let node = scene.add_node(ANIMATED_NODE_NAME, Default::default());
        let material = std::sync::Arc::new(crate::PbrMaterial::new("m", eds2_math::Vec4::ONE));
        scene.add_element(node, mesh, material).unwrap();
        let mut anim = animator(&scene);
        let settings = OscillatorSettings::default();
        let x0 = node_x(&scene, anim.node());
        let mut tick = TimeTick::default();
        let mut flips = 0;

        for _ in 0..1000 {
            let before = (anim.direction(), anim.difference());
            anim.update(0.06, &mut scene, &mut tick).unwrap();
            if anim.direction() != before.0 {
                flips += 1;
                assert!(before.1.abs() > settings.bound);
            }
            let x = node_x(&scene, anim.node());
            assert!((x - x0).abs() <= settings.bound + settings.step + 1e-5);
            assert_relative_eq!(x - x0, anim.difference(), epsilon = 1e-5);
        }
        // 1000 moves across a 0.06 wide band of 0.0005 steps
        assert!(flips >= 7, "only {flips} flips");
    }
}
