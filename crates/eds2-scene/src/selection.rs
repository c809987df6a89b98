// SPDX-License-Identifier: CEPL-1.0
use eds2_math::Vec4;

/// Alpha change per highlight tick.
pub const HIGHLIGHT_STEP: f32 = 0.075;
/// Below this alpha the pulse turns around and rises.
pub const ALPHA_FLOOR: f32 = 0.3;
/// Above this alpha the pulse turns around and falls.
pub const ALPHA_CEILING: f32 = 0.98;

/// One-shot signal raised by the logic update and consumed by the first
/// reader.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeTick(bool);

impl TimeTick {
    pub fn arm(&mut self) {
        self.0 = true;
    }

    pub fn is_armed(&self) -> bool {
        self.0
    }

    /// Returns whether the tick was armed and clears it.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Rising,
    Falling,
}

impl Direction {
    pub fn sign(self) -> f32 {
        match self {
            Direction::Rising => 1.0,
            Direction::Falling => -1.0,
        }
    }
}

/// Pulses the alpha of the selected object's colour between
/// [`ALPHA_FLOOR`] and [`ALPHA_CEILING`].
#[derive(Clone, Debug)]
pub struct SelectionHighlighter {
    direction: Direction,
    accumulated: f32,
    previous: Option<usize>,
}

impl Default for SelectionHighlighter {
    fn default() -> Self {
        Self {
            direction: Direction::Falling,
            accumulated: 0.0,
            previous: None,
        }
    }
}

impl SelectionHighlighter {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn accumulated(&self) -> f32 {
        self.accumulated
    }

    /// Colour for the selected object. Steps the accumulator only when `tick`
    /// is armed (and disarms it), so repeated calls within one logic update
    /// see the same alpha.
    ///
    /// A change of `selected` resets the accumulator after this call's colour
    /// is computed; the rising/falling state carries over.
    pub fn highlight(&mut self, base: Vec4, selected: usize, tick: &mut TimeTick) -> Vec4 {
        if tick.take() {
            self.accumulated += self.direction.sign() * HIGHLIGHT_STEP;
        }
        let alpha = base.w + self.accumulated;

        if self.previous != Some(selected) {
            if self.previous.is_some() {
                self.accumulated = 0.0;
            }
            self.previous = Some(selected);
        }

        if alpha < ALPHA_FLOOR {
            self.direction = Direction::Rising;
        } else if alpha > ALPHA_CEILING {
            self.direction = Direction::Falling;
        }

        base.with_w(alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPS: f32 = 1e-4;

    fn ticked(h: &mut SelectionHighlighter, base: Vec4, selected: usize) -> f32 {
        let mut tick = TimeTick::default();
        tick.arm();
        let out = h.highlight(base, selected, &mut tick);
        assert!(!tick.is_armed());
        out.w
    }

    #[test]
    fn take_clears_the_tick() {
        let mut tick = TimeTick::default();
        assert!(!tick.take());
        tick.arm();
        tick.arm();
        assert!(tick.take());
        assert!(!tick.take());
    }

    #[test]
    fn only_alpha_changes() {
        let mut h = SelectionHighlighter::default();
        let base = Vec4::new(0.2, 0.4, 0.6, 1.0);
        let mut tick = TimeTick::default();
        tick.arm();
        let out = h.highlight(base, 0, &mut tick);
        assert_eq!(out.truncate(), base.truncate());
        assert_relative_eq!(out.w, 1.0 - HIGHLIGHT_STEP);
    }

    #[test]
    fn one_step_per_tick_even_when_read_twice() {
        let mut h = SelectionHighlighter::default();
        let base = Vec4::new(1.0, 1.0, 1.0, 1.0);
        let mut tick = TimeTick::default();
        tick.arm();
        let first = h.highlight(base, 4, &mut tick);
        let second = h.highlight(base, 4, &mut tick);
        assert_eq!(first, second);
        assert_relative_eq!(h.accumulated(), -HIGHLIGHT_STEP);
    }

    #[test]
    fn alpha_stays_within_one_step_of_thresholds() {
        for base_alpha in [1.0, 0.98, 0.6, 0.3, 0.1] {
            let mut h = SelectionHighlighter::default();
            let base = Vec4::new(0.5, 0.5, 0.5, base_alpha);
            let mut prev = base_alpha;
            for _ in 0..400 {
                let alpha = ticked(&mut h, base, 0);
                assert!(alpha <= ALPHA_CEILING.max(base_alpha) + HIGHLIGHT_STEP + EPS);
                assert!(alpha >= ALPHA_FLOOR.min(base_alpha) - HIGHLIGHT_STEP - EPS);
                assert!((alpha - prev).abs() <= HIGHLIGHT_STEP + EPS);
                prev = alpha;
            }
        }
    }

    #[test]
    fn pulse_turns_at_thresholds() {
        let mut h = SelectionHighlighter::default();
        let base = Vec4::new(0.0, 0.0, 0.0, 1.0);
        let mut saw_rise = false;
        for _ in 0..100 {
            let before = h.direction();
            let alpha = ticked(&mut h, base, 0);
            match (before, h.direction()) {
                (Direction::Falling, Direction::Rising) => {
                    assert!(alpha < ALPHA_FLOOR);
                    saw_rise = true;
                }
                (Direction::Rising, Direction::Falling) => assert!(alpha > ALPHA_CEILING),
                (Direction::Falling, _) => assert!(alpha >= ALPHA_FLOOR),
                (Direction::Rising, _) => assert!(alpha <= ALPHA_CEILING),
            }
        }
        assert!(saw_rise);
    }

    #[test]
    fn thresholds_are_strict() {
        let mut tick = TimeTick::default();

        let mut h = SelectionHighlighter::default();
        h.highlight(Vec4::new(0.0, 0.0, 0.0, ALPHA_FLOOR), 0, &mut tick);
        assert_eq!(h.direction(), Direction::Falling);

        let mut h = SelectionHighlighter {
            direction: Direction::Rising,
            ..Default::default()
        };
        h.highlight(Vec4::new(0.0, 0.0, 0.0, ALPHA_CEILING), 0, &mut tick);
        assert_eq!(h.direction(), Direction::Rising);
        h.highlight(Vec4::new(0.0, 0.0, 0.0, ALPHA_CEILING + 0.001), 0, &mut tick);
        assert_eq!(h.direction(), Direction::Falling);
    }

    #[test]
    fn new_selection_resets_accumulator_but_not_direction() {
        let mut h = SelectionHighlighter::default();
        let base = Vec4::new(0.0, 0.0, 0.0, 0.35);

        // 0.35 - 0.075 drops below the floor: now rising
        assert_relative_eq!(ticked(&mut h, base, 1), 0.275, epsilon = EPS);
        assert_eq!(h.direction(), Direction::Rising);

        // switching objects still reports the old accumulator once
        let mut idle = TimeTick::default();
        let out = h.highlight(base, 2, &mut idle);
        assert_relative_eq!(out.w, 0.275, epsilon = EPS);
        assert_eq!(h.accumulated(), 0.0);
        assert_eq!(h.direction(), Direction::Rising);

        let out = h.highlight(base, 2, &mut idle);
        assert_relative_eq!(out.w, 0.35, epsilon = EPS);
        assert_eq!(h.direction(), Direction::Rising);
        assert_relative_eq!(ticked(&mut h, base, 2), 0.425, epsilon = EPS);
    }
}
