// SPDX-License-Identifier: CEPL-1.0
use eds2_scene::ControlAction;
use winit::keyboard::{Key, ModifiersState, NamedKey};

/// Tessellation factor change per `+`/`-` press.
pub const FACTOR_STEP: f32 = 1.0;
/// Patch control point change per `]`/`[` press.
pub const PATCH_STEP: f32 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KeyCommand {
    Control(ControlAction),
    Quit,
}

/// Keyboard binding for the sample's controls. Only key presses should be
/// passed in; releases and repeats are the caller's business.
pub fn map_key(key: &Key, mods: ModifiersState) -> Option<KeyCommand> {
    use ControlAction as A;

    let action = match key {
        Key::Named(NamedKey::Escape) => return Some(KeyCommand::Quit),
        Key::Named(NamedKey::Tab) if mods.shift_key() => A::SelectPrevious,
        Key::Named(NamedKey::Tab) => A::SelectNext,
        Key::Character(c) => match c.as_str() {
            "0" => A::Select(9),
            d @ ("1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9") => {
                let n: usize = d.parse().ok()?;
                A::Select(n - 1)
            }
            "s" | "S" => A::ToggleSelection,
            "b" | "B" => A::ToggleDepthBias,
            "r" | "R" => A::ToggleRasterizerDiscard,
            "t" | "T" => A::ToggleTessellation,
            "+" | "=" => A::AdjustTessellationFactor(FACTOR_STEP),
            "-" | "_" => A::AdjustTessellationFactor(-FACTOR_STEP),
            "]" | "}" => A::AdjustPatchControlPoints(PATCH_STEP),
            "[" | "{" => A::AdjustPatchControlPoints(-PATCH_STEP),
            _ => return None,
        },
        _ => return None,
    };
    Some(KeyCommand::Control(action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::SmolStr;

    fn ch(s: &str) -> Key {
        Key::Character(SmolStr::new(s))
    }

    fn control(key: &Key) -> Option<ControlAction> {
        match map_key(key, ModifiersState::empty()) {
            Some(KeyCommand::Control(a)) => Some(a),
            _ => None,
        }
    }

    #[test]
    fn digits_select_one_through_ten() {
        assert_eq!(control(&ch("1")), Some(ControlAction::Select(0)));
        assert_eq!(control(&ch("9")), Some(ControlAction::Select(8)));
        assert_eq!(control(&ch("0")), Some(ControlAction::Select(9)));
    }

    #[test]
    fn tab_cycles_and_shift_reverses() {
        let tab = Key::Named(NamedKey::Tab);
        assert_eq!(
            map_key(&tab, ModifiersState::empty()),
            Some(KeyCommand::Control(ControlAction::SelectNext))
        );
        assert_eq!(
            map_key(&tab, ModifiersState::SHIFT),
            Some(KeyCommand::Control(ControlAction::SelectPrevious))
        );
    }

    #[test]
    fn letters_toggle_regardless_of_case() {
        assert_eq!(control(&ch("b")), Some(ControlAction::ToggleDepthBias));
        assert_eq!(control(&ch("B")), Some(ControlAction::ToggleDepthBias));
        assert_eq!(control(&ch("r")), Some(ControlAction::ToggleRasterizerDiscard));
        assert_eq!(control(&ch("s")), Some(ControlAction::ToggleSelection));
        assert_eq!(control(&ch("T")), Some(ControlAction::ToggleTessellation));
    }

    #[test]
    fn brackets_and_plus_minus_adjust() {
        assert_eq!(
            control(&ch("+")),
            Some(ControlAction::AdjustTessellationFactor(1.0))
        );
        assert_eq!(
            control(&ch("-")),
            Some(ControlAction::AdjustTessellationFactor(-1.0))
        );
        assert_eq!(
            control(&ch("]")),
            Some(ControlAction::AdjustPatchControlPoints(1.0))
        );
        assert_eq!(
            control(&ch("[")),
            Some(ControlAction::AdjustPatchControlPoints(-1.0))
        );
    }

    #[test]
    fn escape_quits_and_unbound_keys_do_nothing() {
        assert_eq!(
            map_key(&Key::Named(NamedKey::Escape), ModifiersState::empty()),
            Some(KeyCommand::Quit)
        );
        assert_eq!(map_key(&ch("x"), ModifiersState::empty()), None);
        assert_eq!(
            map_key(&Key::Named(NamedKey::Enter), ModifiersState::empty()),
            None
        );
    }
}
