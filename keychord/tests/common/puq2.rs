//! The second PUQ layout: no layer-tap keys, layers are reached through tap-toggle combos.

use embassy_time::Duration;
use keychord::Keyboard;
use keychord::action::{Action, KeyAction};
use keychord::combo::Combo;
use keychord::config::{BehaviorConfig, CombosConfig, PositionalConfig};
use keychord::keycode::KeyCode;
use keychord::{a, k, layer, mt, wm};

use super::*;

pub const SYM: u8 = 1;
pub const NAV: u8 = 2;
pub const FCT: u8 = 3;

/// Same host setup as the first layout: `KeyCode::Z` types `y`. Mouse buttons of FCT are left unbound.
#[rustfmt::skip]
pub static PUQ2_KEYMAP: [[[KeyAction; PUQ_COL]; PUQ_ROW]; PUQ_LAYERS] = [
    layer!([
        [a!(No), k!(M), k!(L), k!(C), mt!(G, CAG), mt!(Q, CAG), k!(F), wm!(F13, CTRL), k!(U), a!(No)],
        [mt!(S, ALT), k!(N), k!(R), k!(T), mt!(D, CTRL), mt!(O, CTRL), k!(A), k!(E), k!(I), mt!(H, ALT)],
        [a!(No), k!(B), k!(W), k!(V), a!(No), a!(No), wm!(Slash, SHIFT), k!(P), k!(Z), a!(No)],
        [a!(No), a!(No), a!(No), mt!(Space, SHIFT), mt!(Escape, GUI), mt!(Enter, GUI), mt!(Space, SHIFT), a!(No), a!(No), a!(No)]
    ]),
    layer!([
        [a!(No), wm!(Dot, ALT), wm!(Kc5, ALT), wm!(Kc6, ALT), k!(Grave), wm!(Kc1, SHIFT), k!(NonusBackslash), wm!(NonusBackslash, SHIFT), wm!(Kc0, SHIFT), a!(No)],
        [wm!(Kc7, SA), wm!(Kc7, SHIFT), wm!(Kc8, ALT), wm!(Kc9, ALT), wm!(RightBracket, SHIFT), wm!(Minus, SHIFT), wm!(Kc8, SHIFT), wm!(Kc9, SHIFT), k!(Slash), wm!(Dot, SHIFT)],
        [a!(No), wm!(Kc4, SHIFT), wm!(Kc7, ALT), wm!(N, ALT), a!(No), a!(No), wm!(Kc5, SHIFT), wm!(Kc2, SHIFT), wm!(Backslash, SHIFT), a!(No)],
        [a!(No), a!(No), a!(No), k!(Backslash), wm!(Equal, SHIFT), k!(RightBracket), wm!(Comma, SHIFT), a!(No), a!(No), a!(No)]
    ]),
    layer!([
        [a!(No), k!(PageUp), k!(Up), k!(PageDown), a!(No), k!(KpAsterisk), k!(Kp7), k!(Kp8), k!(Kp9), a!(No)],
        [wm!(Left, GUI), k!(Left), k!(Down), k!(Right), wm!(Right, GUI), mt!(KpSlash, CTRL), k!(Kp4), k!(Kp5), k!(Kp6), mt!(KpPlus, ALT)],
        [a!(No), k!(Tab), k!(Insert), k!(Enter), a!(No), a!(No), k!(Kp1), k!(Kp2), k!(Kp3), a!(No)],
        [a!(No), a!(No), a!(No), mt!(Space, SHIFT), mt!(Escape, GUI), mt!(Enter, GUI), mt!(Kp0, SHIFT), a!(No), a!(No), a!(No)]
    ]),
    layer!([
        [a!(No), k!(F7), k!(F8), k!(F9), k!(F10), a!(No), k!(AudioVolDown), k!(AudioMute), k!(AudioVolUp), a!(No)],
        [mt!(F12, ALT), k!(F4), k!(F5), k!(F6), mt!(F11, CTRL), k!(LCtrl), k!(MediaPrevTrack), k!(MediaPlayPause), k!(MediaNextTrack), MENU],
        [a!(No), k!(F1), k!(F2), k!(F3), a!(No), a!(No), k!(BrightnessUp), k!(F20), k!(BrightnessDown), a!(No)],
        [a!(No), a!(No), a!(No), a!(No), a!(No), a!(No), a!(No), a!(No), a!(No), a!(No)]
    ]),
];

/// Letter combos on PUQ, a few symbol and keypad combos, and six layer tap-toggle combos.
///
/// The tap-toggle combos are not restricted to a layer, so a toggled layer is left the way it was entered.
pub fn puq2_combos() -> CombosConfig {
    let combos = [
        Combo::new([L1, L2], Action::Key(KeyCode::Y), Some(PUQ)),
        Combo::new([L2, L3], Action::Key(KeyCode::J), Some(PUQ)),
        Combo::new([L7, L8], Action::Key(KeyCode::Comma), Some(PUQ)),
        Combo::new([L8, L9], Action::Key(KeyCode::Delete), Some(PUQ)),
        Combo::new([R1, R2], Action::Key(KeyCode::X), Some(PUQ)),
        Combo::new([R2, R3], Action::Key(KeyCode::K), Some(PUQ)),
        Combo::new([R7, R8], Action::Key(KeyCode::Backspace), Some(PUQ)),
        Combo::new([R8, R9], Action::Key(KeyCode::Dot), Some(PUQ)),
        Combo::new([L4, L5], Action::LayerTapToggle(NAV), None),
        Combo::new([L4, L6], Action::LayerTapToggle(FCT), None),
        Combo::new([L5, L6], Action::LayerTapToggle(SYM), None),
        Combo::new([R4, R5], Action::LayerTapToggle(SYM), None),
        Combo::new([R4, R6], Action::LayerTapToggle(FCT), None),
        Combo::new([R5, R6], Action::LayerTapToggle(NAV), None),
        Combo::new([L8, L9], Action::Key(KeyCode::Delete), Some(SYM)),
        Combo::new([R7, R8], Action::Key(KeyCode::Backspace), Some(SYM)),
        Combo::new([R8, R9], Action::KeyWithModifier(KeyCode::Kc6, SHIFT), Some(SYM)),
        Combo::new([R1, R2], Action::Key(KeyCode::KpDot), Some(NAV)),
        Combo::new([R2, R3], Action::Key(KeyCode::KpMinus), Some(NAV)),
    ];
    CombosConfig {
        combos: combos.into_iter().collect(),
        timeout: Duration::from_millis(50),
        ..Default::default()
    }
}

pub fn puq2_behavior() -> BehaviorConfig {
    BehaviorConfig {
        combo: puq2_combos(),
        key_override: puq_overrides(),
        keyboard_macros: puq_macros(),
        ..Default::default()
    }
}

pub fn create_puq2_keyboard() -> Keyboard<'static, PUQ_ROW, PUQ_COL, PUQ_LAYERS> {
    create_puq2_keyboard_with_config(puq2_behavior())
}

pub fn create_puq2_keyboard_with_config(behavior: BehaviorConfig) -> Keyboard<'static, PUQ_ROW, PUQ_COL, PUQ_LAYERS> {
    Keyboard::new(&PUQ2_KEYMAP, behavior, PositionalConfig::split_columns()).unwrap()
}
