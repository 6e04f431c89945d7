//! Key bindings.
//!
//! A keymap stores one [`KeyAction`] per layer and matrix position. Most
//! bindings wrap a single [`Action`]; the rest need a runtime decision
//! (tap or hold, how many taps) before an [`Action`] is known.

use serde::{Deserialize, Serialize};

use crate::keycode::KeyCode;
use crate::modifier::ModifierCombination;

/// How a tap-hold key reacts to other keys pressed before its decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TapHoldMode {
    /// Only the tapping term decides. Interrupting keys wait for the decision.
    Normal,
    /// Any other key pressed while undecided resolves the key as hold.
    PermissiveHold,
    /// A key from the opposite hand resolves hold, a key from the same hand resolves tap.
    HoldOnOtherKeyPress,
}

/// Per-key tap-hold policy. Unset fields fall back to the keyboard-wide tap-hold config.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TapHoldProfile {
    pub mode: Option<TapHoldMode>,
    /// Must not be zero when set
    pub tapping_term_ms: Option<u16>,
}

impl TapHoldProfile {
    pub const fn const_default() -> Self {
        Self {
            mode: None,
            tapping_term_ms: None,
        }
    }

    pub const fn with_mode(self, mode: TapHoldMode) -> Self {
        Self {
            mode: Some(mode),
            ..self
        }
    }

    pub const fn with_tapping_term_ms(self, ms: u16) -> Self {
        Self {
            tapping_term_ms: Some(ms),
            ..self
        }
    }
}

/// Runtime switch for combo resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ComboControl {
    On,
    Off,
    Toggle,
}

/// The binding at a keymap position.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyAction {
    /// Unbound position. Pressing it does nothing and lower layers are not consulted.
    No,
    /// Use the binding of the next active layer below.
    Transparent,
    /// A single action, triggered on press and cancelled on release.
    Single(Action),
    /// Tap action on tap, modifiers while held.
    ModTap(Action, ModifierCombination, TapHoldProfile),
    /// Tap action on tap, momentary layer while held.
    LayerTap(Action, u8, TapHoldProfile),
    /// Tap dance, references a tap dance definition by index.
    TapDance(u8),
    /// Turn combo resolution on or off.
    ComboControl(ComboControl),
}

impl KeyAction {
    /// Tap and hold actions of a mod-tap or layer-tap binding.
    pub fn tap_hold(self) -> Option<(Action, Action, TapHoldProfile)> {
        match self {
            KeyAction::ModTap(tap, modifiers, profile) => Some((tap, Action::Modifier(modifiers), profile)),
            KeyAction::LayerTap(tap, layer, profile) => Some((tap, Action::LayerOn(layer), profile)),
            _ => None,
        }
    }

    /// Whether holding this binding is meant to do something different from tapping it.
    pub fn has_hold_behavior(&self) -> bool {
        matches!(
            self,
            KeyAction::ModTap(..)
                | KeyAction::LayerTap(..)
                | KeyAction::Single(Action::LayerOn(_))
                | KeyAction::Single(Action::LayerTapToggle(_))
        )
    }

    /// Layers referenced by this binding: the hold layer of a layer-tap and the layer of the wrapped action.
    pub fn layers(&self) -> [Option<u8>; 2] {
        match self {
            KeyAction::LayerTap(tap, layer, _) => [Some(*layer), tap.layer()],
            KeyAction::Single(a) | KeyAction::ModTap(a, _, _) => [a.layer(), None],
            _ => [None, None],
        }
    }
}

/// A basic action that the engine can execute.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Does nothing.
    No,
    /// A key stroke. Modifier keycodes update the modifier state instead of sending a key.
    Key(KeyCode),
    /// Key stroke with a modifier combination held only for the duration of the key.
    KeyWithModifier(KeyCode, ModifierCombination),
    /// Modifier combination held while the key is held.
    Modifier(ModifierCombination),
    /// Activate a layer while held.
    LayerOn(u8),
    /// Deactivate a layer.
    LayerOff(u8),
    /// Toggle a layer.
    LayerToggle(u8),
    /// Activate a layer for the next key only.
    OneShotLayer(u8),
    /// Activate a layer while held, toggle it when tapped.
    LayerTapToggle(u8),
    /// Run a macro, references a macro definition by index.
    TriggerMacro(u8),
}

impl Action {
    /// Layer referenced by this action, if any.
    pub fn layer(&self) -> Option<u8> {
        match self {
            Action::LayerOn(l)
            | Action::LayerOff(l)
            | Action::LayerToggle(l)
            | Action::OneShotLayer(l)
            | Action::LayerTapToggle(l) => Some(*l),
            _ => None,
        }
    }

    /// Keycode sent by this action, if any.
    pub fn keycode(&self) -> Option<KeyCode> {
        match self {
            Action::Key(k) | Action::KeyWithModifier(k, _) => Some(*k),
            _ => None,
        }
    }
}
