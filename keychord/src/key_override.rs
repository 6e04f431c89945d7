//! Context dependent replacement of a resolved keycode.
//!
//! Overrides are checked in declaration order right before a key is sent.
//! The first rule whose trigger, modifiers and layers all match replaces the key.
//! The modifiers are those held by other keys; the layer is the one the key was
//! bound on, not the set of active layers.

use keychord_types::action::Action;
use keychord_types::keycode::KeyCode;
use keychord_types::modifier::{HidModifiers, ModifierCombination};

// Max number of key overrides
pub const KEY_OVERRIDE_MAX_NUM: usize = 16;

/// Bit `n` set means layer `n`.
pub type LayerMask = u32;

/// Mask with only `layer` set, empty for layers the mask cannot hold.
pub fn layer_bit(layer: u8) -> LayerMask {
    (1 as LayerMask).checked_shl(u32::from(layer)).unwrap_or(0)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyOverride {
    pub(crate) trigger: KeyCode,
    pub(crate) replacement: Action,
    pub(crate) required: ModifierCombination,
    pub(crate) forbidden: ModifierCombination,
    pub(crate) layers: LayerMask,
    pub(crate) suppressed: ModifierCombination,
}

impl KeyOverride {
    /// `replacement` is a `Key` or `KeyWithModifier` action. The required modifiers are
    /// suppressed while the replacement is down.
    pub const fn new(trigger: KeyCode, required: ModifierCombination, replacement: Action) -> Self {
        Self {
            trigger,
            replacement,
            required,
            forbidden: ModifierCombination::new(),
            layers: LayerMask::MAX,
            suppressed: required,
        }
    }

    pub const fn with_forbidden(mut self, forbidden: ModifierCombination) -> Self {
        self.forbidden = forbidden;
        self
    }

    pub const fn with_layers(mut self, layers: LayerMask) -> Self {
        self.layers = layers;
        self
    }

    pub const fn with_suppressed(mut self, suppressed: ModifierCombination) -> Self {
        self.suppressed = suppressed;
        self
    }

    pub fn matches(&self, key: KeyCode, modifiers: HidModifiers, layers: LayerMask) -> bool {
        let active = ModifierCombination::from_hid_modifiers(modifiers);
        key == self.trigger
            && active.contains_kinds(self.required)
            && !active.intersects_kinds(self.forbidden)
            && layers & self.layers != 0
    }

    pub fn replacement(&self) -> Action {
        self.replacement
    }

    /// Report bits of `active` that must be lifted while the replacement is down.
    pub fn suppressed_bits(&self, active: HidModifiers) -> HidModifiers {
        let left = self.suppressed.with_right(false).to_hid_modifiers();
        let right = self.suppressed.with_right(true).to_hid_modifiers();
        (left | right) & active
    }
}

/// First override matching the context, if any.
pub fn find(overrides: &[KeyOverride], key: KeyCode, modifiers: HidModifiers, layers: LayerMask) -> Option<&KeyOverride> {
    overrides.iter().find(|o| o.matches(key, modifiers, layers))
}

/// The action that is actually sent for `key`: the replacement of the first matching override,
/// otherwise the key itself.
pub fn apply(overrides: &[KeyOverride], key: KeyCode, modifiers: HidModifiers, layers: LayerMask) -> Action {
    match find(overrides, key, modifiers, layers) {
        Some(o) => o.replacement,
        None => Action::Key(key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAG: ModifierCombination = ModifierCombination::new_from(false, true, true, false, true);

    fn rules() -> [KeyOverride; 2] {
        [
            KeyOverride::new(
                KeyCode::Comma,
                ModifierCombination::LSHIFT,
                Action::KeyWithModifier(KeyCode::Slash, ModifierCombination::LALT),
            )
            .with_forbidden(CAG)
            .with_layers(0b0001),
            KeyOverride::new(
                KeyCode::Dot,
                ModifierCombination::LSHIFT,
                Action::KeyWithModifier(KeyCode::LeftBracket, ModifierCombination::LALT),
            )
            .with_forbidden(CAG)
            .with_layers(0b0001),
        ]
    }

    #[test]
    fn test_required_modifiers() {
        let rules = rules();
        let shift = HidModifiers::new().with_left_shift(true);
        assert_eq!(
            apply(&rules, KeyCode::Comma, shift, 0b0001),
            Action::KeyWithModifier(KeyCode::Slash, ModifierCombination::LALT)
        );
        // Either shift triggers
        let rshift = HidModifiers::new().with_right_shift(true);
        assert_eq!(
            apply(&rules, KeyCode::Dot, rshift, 0b0001),
            Action::KeyWithModifier(KeyCode::LeftBracket, ModifierCombination::LALT)
        );
        assert_eq!(
            apply(&rules, KeyCode::Comma, HidModifiers::new(), 0b0001),
            Action::Key(KeyCode::Comma)
        );
    }

    #[test]
    fn test_forbidden_modifiers() {
        let rules = rules();
        let shift_ctrl = HidModifiers::new().with_left_shift(true).with_left_ctrl(true);
        assert_eq!(
            apply(&rules, KeyCode::Comma, shift_ctrl, 0b0001),
            Action::Key(KeyCode::Comma)
        );
    }

    #[test]
    fn test_layer_mask() {
        let rules = rules();
        let shift = HidModifiers::new().with_left_shift(true);
        assert_eq!(apply(&rules, KeyCode::Comma, shift, 0b0010), Action::Key(KeyCode::Comma));
        assert!(find(&rules, KeyCode::Comma, shift, 0b0011).is_some());
        assert!(find(&rules, KeyCode::Comma, shift, layer_bit(1)).is_none());
        assert!(find(&rules, KeyCode::Comma, shift, layer_bit(0)).is_some());
        assert_eq!(layer_bit(31), 1 << 31);
        assert_eq!(layer_bit(40), 0);
    }

    #[test]
    fn test_first_match_wins() {
        let rules = [
            KeyOverride::new(KeyCode::A, ModifierCombination::LSHIFT, Action::Key(KeyCode::B)),
            KeyOverride::new(KeyCode::A, ModifierCombination::LSHIFT, Action::Key(KeyCode::C)),
        ];
        let shift = HidModifiers::new().with_left_shift(true);
        assert_eq!(apply(&rules, KeyCode::A, shift, 1), Action::Key(KeyCode::B));
    }

    #[test]
    fn test_suppressed_bits() {
        let rule = rules()[0];
        let active = HidModifiers::new().with_right_shift(true).with_left_gui(true);
        assert_eq!(rule.suppressed_bits(active), HidModifiers::new().with_right_shift(true));
    }
}
