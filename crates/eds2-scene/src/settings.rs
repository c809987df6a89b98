// SPDX-License-Identifier: CEPL-1.0
use crate::{
    toggles::{ObjectToggle, ToggleTable},
    Refresh, Result, SceneError,
};

pub const MIN_PATCH_CONTROL_POINTS: u32 = 1;

/// User-adjustable state. Setters report what has to be refreshed and
/// return an empty set when nothing changed.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    tessellation: bool,
    tessellation_factor: f32,
    patch_control_points_input: f32,
    patch_control_points: u32,
    selection_active: bool,
    selected_index: usize,
    toggles: ToggleTable,
}

impl Settings {
    pub fn new(object_count: usize) -> Self {
        Self {
            tessellation: true,
            tessellation_factor: 1.0,
            patch_control_points_input: 3.0,
            patch_control_points: 3,
            selection_active: false,
            selected_index: 0,
            toggles: ToggleTable::new(object_count),
        }
    }

    pub fn object_count(&self) -> usize {
        self.toggles.len()
    }

    pub fn tessellation(&self) -> bool {
        self.tessellation
    }

    pub fn tessellation_factor(&self) -> f32 {
        self.tessellation_factor
    }

    /// Factor handed to the shaders; 0 while tessellation is off.
    pub fn effective_tessellation_factor(&self) -> f32 {
        if self.tessellation {
            self.tessellation_factor
        } else {
            0.0
        }
    }

    pub fn patch_control_points(&self) -> u32 {
        self.patch_control_points
    }

    pub fn patch_control_points_input(&self) -> f32 {
        self.patch_control_points_input
    }

    pub fn selection_active(&self) -> bool {
        self.selection_active
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    /// Selected index while highlighting is on.
    pub fn active_selection(&self) -> Option<usize> {
        self.selection_active.then_some(self.selected_index)
    }

    pub fn toggles(&self) -> &ToggleTable {
        &self.toggles
    }

    pub fn object(&self, index: usize) -> Result<ObjectToggle> {
        self.toggles.get(index)
    }

    pub fn set_tessellation(&mut self, on: bool) -> Refresh {
        if self.tessellation == on {
            return Refresh::empty();
        }
        self.tessellation = on;
        Refresh::UNIFORMS
    }

    /// Negative and non-finite factors are rejected as no-ops.
    pub fn set_tessellation_factor(&mut self, factor: f32) -> Refresh {
        if !factor.is_finite() || factor < 0.0 || factor == self.tessellation_factor {
            return Refresh::empty();
        }
        self.tessellation_factor = factor;
        Refresh::UNIFORMS
    }

    /// Raw input is clamped to at least one and rounded to a count.
    pub fn set_patch_control_points(&mut self, input: f32) -> Refresh {
        if input.is_nan() {
            return Refresh::empty();
        }
        let input = input.max(MIN_PATCH_CONTROL_POINTS as f32);
        self.patch_control_points_input = input;

        let count = input.round() as u32;
        if count == self.patch_control_points {
            return Refresh::empty();
        }
        self.patch_control_points = count;
        Refresh::COMMANDS
    }

    pub fn set_selection_active(&mut self, on: bool) -> Refresh {
        if self.selection_active == on {
            return Refresh::empty();
        }
        self.selection_active = on;
        Refresh::COMMANDS
    }

    pub fn select(&mut self, index: usize) -> Result<Refresh> {
        let count = self.object_count();
        if index >= count {
            return Err(SceneError::ObjectOutOfRange { index, count });
        }
        if self.selected_index == index {
            return Ok(Refresh::empty());
        }
        self.selected_index = index;
        Ok(Refresh::COMMANDS)
    }

    pub fn set_depth_bias(&mut self, index: usize, on: bool) -> Result<Refresh> {
        self.update_object(index, |t| &mut t.depth_bias, on)
    }

    pub fn set_rasterizer_discard(&mut self, index: usize, on: bool) -> Result<Refresh> {
        self.update_object(index, |t| &mut t.rasterizer_discard, on)
    }

    fn update_object(
        &mut self,
        index: usize,
        field: impl FnOnce(&mut ObjectToggle) -> &mut bool,
        on: bool,
    ) -> Result<Refresh> {
        let count = self.object_count();
        let toggle = self
            .toggles
            .get_mut(index)
            .map_err(|_| SceneError::ObjectOutOfRange { index, count })?;
        let slot = field(toggle);
        if *slot == on {
            return Ok(Refresh::empty());
        }
        *slot = on;
        Ok(Refresh::COMMANDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::new(4);
        assert!(s.tessellation());
        assert_eq!(s.tessellation_factor(), 1.0);
        assert_eq!(s.patch_control_points(), 3);
        assert_eq!(s.active_selection(), None);
        assert_eq!(s.object_count(), 4);
        assert!(s.toggles().iter().all(|t| *t == ObjectToggle::default()));
    }

    #[test]
    fn tessellation_refreshes_uniforms() {
        let mut s = Settings::new(1);
        assert_eq!(s.set_tessellation(true), Refresh::empty());
        assert_eq!(s.set_tessellation_factor(2.5), Refresh::UNIFORMS);
        assert_eq!(s.set_tessellation(false), Refresh::UNIFORMS);
        assert_eq!(s.effective_tessellation_factor(), 0.0);
        // stored factor survives the toggle
        assert_eq!(s.set_tessellation(true), Refresh::UNIFORMS);
        assert_eq!(s.effective_tessellation_factor(), 2.5);

        assert_eq!(s.set_tessellation_factor(-1.0), Refresh::empty());
        assert_eq!(s.set_tessellation_factor(f32::NAN), Refresh::empty());
        assert_eq!(s.tessellation_factor(), 2.5);
    }

    #[test]
    fn patch_control_points_clamp_and_round() {
        let mut s = Settings::new(1);
        assert_eq!(s.set_patch_control_points(3.2), Refresh::empty());
        assert_eq!(s.patch_control_points_input(), 3.2);

        assert_eq!(s.set_patch_control_points(3.6), Refresh::COMMANDS);
        assert_eq!(s.patch_control_points(), 4);

        assert_eq!(s.set_patch_control_points(-7.0), Refresh::COMMANDS);
        assert_eq!(s.patch_control_points(), MIN_PATCH_CONTROL_POINTS);
        assert_eq!(s.patch_control_points_input(), 1.0);

        assert_eq!(s.set_patch_control_points(f32::NAN), Refresh::empty());
        assert_eq!(s.patch_control_points(), 1);
    }

    #[test]
    fn selection_is_bounds_checked() {
        let mut s = Settings::new(3);
        assert_eq!(s.set_selection_active(true), Refresh::COMMANDS);
        assert_eq!(s.active_selection(), Some(0));
        assert_eq!(s.select(2), Ok(Refresh::COMMANDS));
        assert_eq!(s.select(2), Ok(Refresh::empty()));
        assert_eq!(
            s.select(3),
            Err(SceneError::ObjectOutOfRange { index: 3, count: 3 })
        );
        assert_eq!(s.selected_index(), 2);
        assert_eq!(s.set_selection_active(false), Refresh::COMMANDS);
        assert_eq!(s.active_selection(), None);
    }

    #[test]
    fn per_object_toggles() {
        let mut s = Settings::new(2);
        assert_eq!(s.set_depth_bias(1, true), Ok(Refresh::COMMANDS));
        assert_eq!(s.set_depth_bias(1, true), Ok(Refresh::empty()));
        assert_eq!(s.set_rasterizer_discard(0, true), Ok(Refresh::COMMANDS));
        assert_eq!(
            s.object(1).unwrap(),
            ObjectToggle {
                depth_bias: true,
                rasterizer_discard: false
            }
        );
        assert!(s.object(0).unwrap().rasterizer_discard);
        assert_eq!(
            s.set_rasterizer_discard(2, true),
            Err(SceneError::ObjectOutOfRange { index: 2, count: 2 })
        );
    }
}
