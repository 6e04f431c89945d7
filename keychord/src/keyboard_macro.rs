//! Keyboard macros: fixed key sequences sent by one action.
//!
//! A macro runs to completion when its action is pressed. All of its output is
//! stamped with the press time and nothing it pressed stays down afterwards.

use embassy_time::Instant;
use heapless::Vec;
use keychord_types::keycode::KeyCode;
use keychord_types::modifier::HidModifiers;

use crate::emitter::{ActionEmitter, Owner, Registration};
use crate::event::Output;
use crate::keyboard::{Keyboard, send};

// Max number of keyboard macros
pub const NUM_MACRO: usize = 8;
// Max number of operations in one macro
pub const MACRO_MAX_LENGTH: usize = 16;

/// One step of a macro. Modifier keycodes change the modifier state instead of sending a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MacroOperation {
    Press(KeyCode),
    Release(KeyCode),
    /// Press and release
    Tap(KeyCode),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardMacro {
    pub(crate) operations: Vec<MacroOperation, MACRO_MAX_LENGTH>,
}

impl KeyboardMacro {
    /// Operations beyond `MACRO_MAX_LENGTH` are ignored.
    pub fn new<I: IntoIterator<Item = MacroOperation>>(operations: I) -> Self {
        Self {
            operations: operations.into_iter().take(MACRO_MAX_LENGTH).collect(),
        }
    }

    pub fn operations(&self) -> &[MacroOperation] {
        &self.operations
    }
}

/// What a running macro holds down.
#[derive(Default)]
struct MacroState {
    modifiers: HidModifiers,
    keys: Vec<KeyCode, MACRO_MAX_LENGTH>,
    typed: bool,
}

impl<'a, const ROW: usize, const COL: usize, const NUM_LAYER: usize> Keyboard<'a, ROW, COL, NUM_LAYER> {
    pub(crate) fn run_macro(&mut self, owner: Owner, index: u8, time: Instant, emitter: &mut dyn ActionEmitter) {
        let Some(operations) = self
            .behavior
            .keyboard_macros
            .macros
            .get(index as usize)
            .map(|m| m.operations.clone())
        else {
            error!("Macro {} not found", index);
            return;
        };
        // Modifiers of the macro are reported through a temporary registration of its owner
        if !self.registry.insert(Registration::new(owner)) {
            return;
        }
        debug!("Running macro {}", index);

        let mut state = MacroState::default();
        for operation in operations {
            match operation {
                MacroOperation::Press(key) => self.macro_key(owner, key, true, &mut state, time, emitter),
                MacroOperation::Release(key) => self.macro_key(owner, key, false, &mut state, time, emitter),
                MacroOperation::Tap(key) => {
                    self.macro_key(owner, key, true, &mut state, time, emitter);
                    self.macro_key(owner, key, false, &mut state, time, emitter);
                }
            }
        }

        // Release whatever the macro left pressed
        for key in state.keys.iter() {
            send(emitter, Output::KeyUp(*key), time);
        }
        self.registry.remove(owner);
        self.registry.sync_modifiers(time, emitter);
        if state.typed {
            self.update_osl(time, emitter);
        }
    }

    fn macro_key(
        &mut self,
        owner: Owner,
        key: KeyCode,
        pressed: bool,
        state: &mut MacroState,
        time: Instant,
        emitter: &mut dyn ActionEmitter,
    ) {
        if key.is_modifier() {
            let bits = key.to_hid_modifiers();
            state.modifiers = if pressed {
                state.modifiers | bits
            } else {
                state.modifiers & !bits
            };
            if let Some(registration) = self.registry.get_mut(owner) {
                registration.key_mods = state.modifiers;
            }
            self.registry.sync_modifiers(time, emitter);
            return;
        }

        if pressed {
            if state.keys.contains(&key) {
                return;
            }
            if state.keys.push(key).is_err() {
                error!("Macro pressed too many keys, dropping {:?}", key);
                return;
            }
            state.typed = true;
            send(emitter, Output::KeyDown(key), time);
        } else if let Some(i) = state.keys.iter().position(|k| *k == key) {
            state.keys.remove(i);
            send(emitter, Output::KeyUp(key), time);
        }
    }
}
