use embassy_time::Duration;
use keychord_types::action::{Action, KeyAction};
use keychord_types::keycode::KeyCode;

use super::BehaviorConfig;
use crate::combo::ComboPolicy;
use crate::error::{ConfigError, ConfigResult};
use crate::event::KeyPos;
use crate::key_override::LayerMask;

impl BehaviorConfig {
    /// Check the behavior config against the keymap it is used with.
    pub fn validate<const ROW: usize, const COL: usize, const NUM_LAYER: usize>(
        &self,
        keymap: &[[[KeyAction; COL]; ROW]; NUM_LAYER],
    ) -> ConfigResult<()> {
        if NUM_LAYER > LayerMask::BITS as usize {
            return Err(ConfigError::TooManyLayers { layers: NUM_LAYER });
        }
        self.validate_terms()?;
        self.validate_macros()?;
        self.validate_keymap(keymap)?;
        self.validate_tap_dances()?;
        self.validate_combos(keymap)?;
        self.validate_overrides::<NUM_LAYER>()
    }

    fn validate_terms(&self) -> ConfigResult<()> {
        let terms = [
            ("tap_hold.tapping_term", Some(self.tap_hold.tapping_term)),
            ("one_shot.timeout", Some(self.one_shot.timeout)),
            ("combo.timeout", Some(self.combo.timeout)),
            ("combo.hold_term", Some(self.combo.hold_term)),
        ];
        let combos = self.combo.combos.iter().map(|c| ("combo timeout", c.timeout));
        let dances = self.tap_dance.tap_dances.iter().map(|d| ("tap dance term", d.term));
        for (field, term) in terms.into_iter().chain(combos).chain(dances) {
            if term == Some(Duration::from_ticks(0)) {
                return Err(ConfigError::ZeroTerm { field });
            }
        }
        if self.tap_hold.tapping_toggle == 0 {
            return Err(ConfigError::ZeroTappingToggle);
        }
        Ok(())
    }

    fn validate_macros(&self) -> ConfigResult<()> {
        for (index, m) in self.keyboard_macros.macros.iter().enumerate() {
            if m.operations.is_empty() {
                return Err(ConfigError::EmptyMacro { index: index as u8 });
            }
        }
        Ok(())
    }

    fn check_macro(&self, action: Action) -> ConfigResult<()> {
        match action {
            Action::TriggerMacro(index) if index as usize >= self.keyboard_macros.macros.len() => {
                Err(ConfigError::UndefinedMacro { index })
            }
            _ => Ok(()),
        }
    }

    fn validate_keymap<const ROW: usize, const COL: usize, const NUM_LAYER: usize>(
        &self,
        keymap: &[[[KeyAction; COL]; ROW]; NUM_LAYER],
    ) -> ConfigResult<()> {
        for (layer_idx, layer) in keymap.iter().enumerate() {
            for (row_idx, row) in layer.iter().enumerate() {
                for (col_idx, action) in row.iter().enumerate() {
                    let pos = KeyPos::new(row_idx as u8, col_idx as u8);
                    if layer_idx == 0 && *action == KeyAction::Transparent {
                        return Err(ConfigError::TransparentBaseKey { pos });
                    }
                    for layer in action.layers().into_iter().flatten() {
                        check_layer::<NUM_LAYER>(layer, pos)?;
                    }
                    if let KeyAction::Single(a) | KeyAction::ModTap(a, _, _) | KeyAction::LayerTap(a, _, _) = action {
                        self.check_macro(*a)?;
                    }
                    if let KeyAction::TapDance(index) = action {
                        let Some(dance) = self.tap_dance.tap_dances.get(*index as usize) else {
                            return Err(ConfigError::UndefinedTapDance { index: *index, pos });
                        };
                        for action in dance.taps.iter().chain(core::iter::once(&dance.hold)) {
                            if let Some(layer) = action.layer() {
                                check_layer::<NUM_LAYER>(layer, pos)?;
                            }
                            self.check_macro(*action)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_tap_dances(&self) -> ConfigResult<()> {
        for (index, dance) in self.tap_dance.tap_dances.iter().enumerate() {
            if dance.taps.is_empty() {
                return Err(ConfigError::EmptyTapDance { index: index as u8 });
            }
        }
        Ok(())
    }

    fn validate_combos<const ROW: usize, const COL: usize, const NUM_LAYER: usize>(
        &self,
        keymap: &[[[KeyAction; COL]; ROW]; NUM_LAYER],
    ) -> ConfigResult<()> {
        let combos = &self.combo.combos;
        for (index, combo) in combos.iter().enumerate() {
            if combo.keys.len() < 2 {
                return Err(ConfigError::ComboTooShort { index });
            }
            for (i, pos) in combo.keys.iter().enumerate() {
                if pos.row as usize >= ROW || pos.col as usize >= COL {
                    return Err(ConfigError::ComboKeyOutOfRange { index, pos: *pos });
                }
                if combo.keys[..i].contains(pos) {
                    return Err(ConfigError::ComboRepeatedKey { index, pos: *pos });
                }
            }
            for layer in [combo.layer, combo.output.layer()].into_iter().flatten() {
                if layer as usize >= NUM_LAYER {
                    return Err(ConfigError::UndefinedComboLayer { index, layer });
                }
            }
            self.check_macro(combo.output)?;

            let layer = combo.layer.unwrap_or(0) as usize;
            let policy = ComboPolicy::resolve(combo, &self.combo, |pos| match binding(keymap, layer, pos) {
                KeyAction::Transparent => binding(keymap, 0, pos),
                action => action,
            });
            if policy.must_tap && policy.must_hold {
                return Err(ConfigError::ConflictingComboPolicy { index });
            }

            // Partial overlaps resolve first-come, identical key sets can never be told apart
            if let Some(first) = combos[..index].iter().position(|other| {
                other.layer == combo.layer
                    && other.keys.len() == combo.keys.len()
                    && combo.keys.iter().all(|k| other.keys.contains(k))
            }) {
                return Err(ConfigError::DuplicateCombo { first, second: index });
            }
        }
        Ok(())
    }

    fn validate_overrides<const NUM_LAYER: usize>(&self) -> ConfigResult<()> {
        let defined: LayerMask = if NUM_LAYER >= LayerMask::BITS as usize {
            LayerMask::MAX
        } else {
            (1 << NUM_LAYER) - 1
        };
        for (index, o) in self.key_override.overrides.iter().enumerate() {
            let replacement = o.replacement.keycode().unwrap_or(KeyCode::No);
            if o.trigger == KeyCode::No || replacement == KeyCode::No {
                return Err(ConfigError::UnknownOverrideKeycode { index });
            }
            if o.layers & defined == 0 {
                return Err(ConfigError::UndefinedOverrideLayer { index });
            }
        }
        Ok(())
    }
}

fn binding<const ROW: usize, const COL: usize, const NUM_LAYER: usize>(
    keymap: &[[[KeyAction; COL]; ROW]; NUM_LAYER],
    layer: usize,
    pos: KeyPos,
) -> KeyAction {
    keymap
        .get(layer)
        .and_then(|l| l.get(pos.row as usize))
        .and_then(|r| r.get(pos.col as usize))
        .copied()
        .unwrap_or(KeyAction::No)
}

fn check_layer<const NUM_LAYER: usize>(layer: u8, pos: KeyPos) -> ConfigResult<()> {
    if layer as usize >= NUM_LAYER {
        return Err(ConfigError::UndefinedLayer { layer, pos });
    }
    Ok(())
}
