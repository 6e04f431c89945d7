pub mod puq2;
pub mod test_macro;

use embassy_time::{Duration, Instant};
use keychord::Keyboard;
use keychord::action::{Action, KeyAction, TapHoldProfile};
use keychord::combo::Combo;
use keychord::config::{
    BehaviorConfig, CombosConfig, KeyOverridesConfig, KeyboardMacrosConfig, PositionalConfig, TapDancesConfig,
};
use keychord::emitter::FnEmitter;
use keychord::event::{KeyPos, KeyboardEvent, Output, OutputEvent};
use keychord::key_override::KeyOverride;
use keychord::keyboard_macro::{KeyboardMacro, MacroOperation};
use keychord::keycode::KeyCode;
use keychord::modifier::ModifierCombination;
use keychord::tap_dance::TapDance;
use keychord::{a, k, layer, lt, mt, td, wm};
use log::debug;

// Init logger for tests
#[ctor::ctor]
pub fn init_log() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

#[derive(Debug, Clone)]
pub struct TestKeyPress {
    pub row: u8,
    pub col: u8,
    pub pressed: bool,
    pub delay: u64, // Delay before this key event in milliseconds
}

// Time of the first event. Not zero, so that nothing depends on the clock origin.
pub const START_MS: u64 = 1000;

/// Feed the sequence, flush every pending term and return the output.
pub fn run_sequence<'a, const ROW: usize, const COL: usize, const NUM_LAYER: usize>(
    keyboard: &mut Keyboard<'a, ROW, COL, NUM_LAYER>,
    key_sequence: &[TestKeyPress],
) -> Vec<OutputEvent> {
    let mut outputs = Vec::new();
    let mut emitter = FnEmitter(|e: OutputEvent| outputs.push(e));
    let mut now = Instant::from_millis(START_MS);
    for key in key_sequence {
        now += Duration::from_millis(key.delay);
        keyboard.process(KeyboardEvent::key(key.row, key.col, key.pressed, now), &mut emitter);
    }
    keyboard.tick(now + Duration::from_secs(5), &mut emitter);
    outputs
}

// run a keyboard test, input is a seq of key events with delay, the expected output kinds verify it
pub fn run_key_sequence_test<'a, const ROW: usize, const COL: usize, const NUM_LAYER: usize>(
    keyboard: &mut Keyboard<'a, ROW, COL, NUM_LAYER>,
    key_sequence: &[TestKeyPress],
    expected: &[Output],
) {
    let outputs = run_sequence(keyboard, key_sequence);
    for output in outputs.iter() {
        debug!("{:?} at {}ms", output.kind, output.time.as_millis());
    }
    let kinds: Vec<Output> = outputs.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, expected);
}

pub fn down(key: KeyCode) -> Output {
    Output::KeyDown(key)
}

pub fn up(key: KeyCode) -> Output {
    Output::KeyUp(key)
}

pub fn mods_on(modifiers: ModifierCombination) -> Output {
    Output::ModifierOn(modifiers.to_hid_modifiers())
}

pub fn mods_off(modifiers: ModifierCombination) -> Output {
    Output::ModifierOff(modifiers.to_hid_modifiers())
}

pub const SHIFT: ModifierCombination = ModifierCombination::LSHIFT;
pub const CTRL: ModifierCombination = ModifierCombination::LCTRL;
pub const ALT: ModifierCombination = ModifierCombination::LALT;
pub const GUI: ModifierCombination = ModifierCombination::LGUI;
pub const CG: ModifierCombination = CTRL.union(GUI);
pub const CAG: ModifierCombination = CTRL.union(ALT).union(GUI);
pub const SA: ModifierCombination = SHIFT.union(ALT);

// Layers of the PUQ layout
pub const PUQ: u8 = 0;
pub const NEO3: u8 = 1;
pub const NEO4: u8 = 2;
pub const FUNC: u8 = 3;

// Positions of the PUQ layout, a split keyboard with 19 keys per half:
//
//  row 0:      L7 L8 L9 LA | RA R7 R8 R9
//  row 1:   LP L4 L5 L6 LB | RB R4 R5 R6 RP
//  row 2:      L1 L2 L3    |    R1 R2 R3
//  row 3:            LS LE | RE RS
pub const L7: KeyPos = KeyPos::new(0, 1);
pub const L8: KeyPos = KeyPos::new(0, 2);
pub const L9: KeyPos = KeyPos::new(0, 3);
pub const LA: KeyPos = KeyPos::new(0, 4);
pub const RA: KeyPos = KeyPos::new(0, 5);
pub const R7: KeyPos = KeyPos::new(0, 6);
pub const R8: KeyPos = KeyPos::new(0, 7);
pub const R9: KeyPos = KeyPos::new(0, 8);
pub const LP: KeyPos = KeyPos::new(1, 0);
pub const L4: KeyPos = KeyPos::new(1, 1);
pub const L5: KeyPos = KeyPos::new(1, 2);
pub const L6: KeyPos = KeyPos::new(1, 3);
pub const LB: KeyPos = KeyPos::new(1, 4);
pub const RB: KeyPos = KeyPos::new(1, 5);
pub const R4: KeyPos = KeyPos::new(1, 6);
pub const R5: KeyPos = KeyPos::new(1, 7);
pub const R6: KeyPos = KeyPos::new(1, 8);
pub const RP: KeyPos = KeyPos::new(1, 9);
pub const L1: KeyPos = KeyPos::new(2, 1);
pub const L2: KeyPos = KeyPos::new(2, 2);
pub const L3: KeyPos = KeyPos::new(2, 3);
pub const R1: KeyPos = KeyPos::new(2, 6);
pub const R2: KeyPos = KeyPos::new(2, 7);
pub const R3: KeyPos = KeyPos::new(2, 8);
pub const LS: KeyPos = KeyPos::new(3, 3);
pub const LE: KeyPos = KeyPos::new(3, 4);
pub const RE: KeyPos = KeyPos::new(3, 5);
pub const RS: KeyPos = KeyPos::new(3, 6);

/// Context menu: tapped, alt while held
pub const MENU: KeyAction = KeyAction::ModTap(Action::TriggerMacro(0), ALT, TapHoldProfile::const_default());

pub const PUQ_ROW: usize = 4;
pub const PUQ_COL: usize = 10;
pub const PUQ_LAYERS: usize = 4;

/// The PUQ layout for a host set to a German keyboard layout. Keycodes are HID usages,
/// so `KeyCode::Y` types `z` and `KeyCode::Z` types `y`.
#[rustfmt::skip]
pub static PUQ_KEYMAP: [[[KeyAction; PUQ_COL]; PUQ_ROW]; PUQ_LAYERS] = [
    layer!([
        [a!(No), k!(M), k!(L), k!(C), mt!(G, CG), mt!(Q, CG), k!(Comma), wm!(F13, CTRL), k!(U), a!(No)],
        [lt!(1, S), lt!(2, N), mt!(R, GUI), mt!(T, ALT), mt!(D, CAG), mt!(O, CAG), mt!(A, ALT), mt!(E, GUI), lt!(2, I), lt!(1, H)],
        [a!(No), k!(B), mt!(W, CTRL), k!(V), a!(No), a!(No), wm!(Slash, SHIFT), mt!(Dot, CTRL), k!(Z), a!(No)],
        [a!(No), a!(No), a!(No), mt!(Space, SHIFT), lt!(3, Escape), lt!(3, Enter), mt!(Space, SHIFT), a!(No), a!(No), a!(No)]
    ]),
    layer!([
        [a!(No), wm!(Dot, ALT), wm!(Kc5, ALT), wm!(Kc6, ALT), k!(Grave), wm!(Kc1, SHIFT), k!(NonusBackslash), wm!(NonusBackslash, SHIFT), wm!(Kc0, SHIFT), a!(No)],
        [wm!(Kc7, SA), wm!(Kc7, SHIFT), wm!(Kc8, ALT), wm!(Kc9, ALT), wm!(RightBracket, SHIFT), wm!(Minus, SHIFT), wm!(Kc8, SHIFT), wm!(Kc9, SHIFT), lt!(2, Slash), wm!(Dot, SHIFT)],
        [a!(No), wm!(Kc4, SHIFT), wm!(Kc7, ALT), wm!(N, ALT), a!(No), a!(No), wm!(Kc5, SHIFT), wm!(Kc2, SHIFT), wm!(Backslash, SHIFT), a!(No)],
        [a!(No), a!(No), a!(No), k!(Space), k!(Escape), k!(Enter), k!(Space), a!(No), a!(No), a!(No)]
    ]),
    layer!([
        [a!(No), k!(Backspace), k!(Up), k!(Delete), k!(PageDown), k!(KpAsterisk), k!(Kp7), k!(Kp8), k!(Kp9), a!(No)],
        [wm!(Left, GUI), k!(Left), mt!(Down, GUI), mt!(Right, ALT), wm!(Right, GUI), k!(KpSlash), mt!(Kp4, ALT), mt!(Kp5, GUI), k!(Kp6), k!(KpPlus)],
        [a!(No), k!(Tab), mt!(Insert, CTRL), k!(Enter), a!(No), a!(No), k!(Kp1), mt!(Kp2, CTRL), k!(Kp3), a!(No)],
        [a!(No), a!(No), a!(No), mt!(Space, SHIFT), k!(Escape), k!(Enter), mt!(Kp0, SHIFT), a!(No), a!(No), a!(No)]
    ]),
    layer!([
        [a!(No), td!(6), td!(7), td!(8), k!(F10), a!(No), k!(AudioVolDown), k!(AudioMute), k!(AudioVolUp), a!(No)],
        [k!(F12), td!(3), td!(4), td!(5), k!(F11), a!(No), mt!(MediaPrevTrack, ALT), mt!(MediaPlayPause, GUI), k!(MediaNextTrack), MENU],
        [a!(No), td!(0), td!(1), td!(2), a!(No), a!(No), k!(BrightnessUp), mt!(F20, CTRL), k!(BrightnessDown), a!(No)],
        [a!(No), a!(No), a!(No), a!(No), a!(No), a!(No), a!(No), a!(No), a!(No), a!(No)]
    ]),
];

/// Combos of the PUQ layout. All of them are restricted to one layer.
pub fn puq_combos() -> CombosConfig {
    let fast = Duration::from_millis(20);
    let combos = [
        Combo::new([L1, L4], Action::Key(KeyCode::Y), Some(PUQ)),
        Combo::new([L3, L6], Action::Key(KeyCode::J), Some(PUQ)),
        Combo::new([L4, L7], Action::Key(KeyCode::F), Some(PUQ)),
        Combo::new([L6, L9], Action::Key(KeyCode::P), Some(PUQ)),
        Combo::new([R1, R4], Action::Key(KeyCode::X), Some(PUQ)),
        Combo::new([R3, R6], Action::Key(KeyCode::K), Some(PUQ)),
        Combo::new([R4, R7], Action::Key(KeyCode::F), Some(PUQ)),
        Combo::new([R6, R9], Action::Key(KeyCode::P), Some(PUQ)),
        Combo::new([R4, R5], Action::Key(KeyCode::Backspace), Some(PUQ)).with_timeout(fast),
        Combo::new([R5, R6], Action::Key(KeyCode::Delete), Some(PUQ)).with_timeout(fast),
        Combo::new([L1, L4], Action::Key(KeyCode::Backslash), Some(NEO3)),
        Combo::new([L3, L6], Action::KeyWithModifier(KeyCode::Equal, SHIFT), Some(NEO3)),
        Combo::new([R1, R4], Action::Key(KeyCode::RightBracket), Some(NEO3)),
        Combo::new([R3, R6], Action::KeyWithModifier(KeyCode::Comma, SHIFT), Some(NEO3)),
        Combo::new([R6, R9], Action::KeyWithModifier(KeyCode::Kc6, SHIFT), Some(NEO3)),
        Combo::new([R4, R5], Action::Key(KeyCode::Backspace), Some(NEO3)).with_timeout(fast),
        Combo::new([R5, R6], Action::Key(KeyCode::Delete), Some(NEO3)).with_timeout(fast),
        Combo::new([L4, L7], Action::Key(KeyCode::PageUp), Some(NEO4)),
        Combo::new([R4, R5], Action::Key(KeyCode::Backspace), Some(NEO4)).with_timeout(fast),
        Combo::new([R5, R6], Action::Key(KeyCode::Delete), Some(NEO4)).with_timeout(fast),
    ];
    CombosConfig {
        combos: combos.into_iter().collect(),
        ..Default::default()
    }
}

/// F1 to F9 on a single tap, F11 to F19 on a double tap.
pub fn puq_tap_dances() -> TapDancesConfig {
    let f = [
        (KeyCode::F1, KeyCode::F11),
        (KeyCode::F2, KeyCode::F12),
        (KeyCode::F3, KeyCode::F13),
        (KeyCode::F4, KeyCode::F14),
        (KeyCode::F5, KeyCode::F15),
        (KeyCode::F6, KeyCode::F16),
        (KeyCode::F7, KeyCode::F17),
        (KeyCode::F8, KeyCode::F18),
        (KeyCode::F9, KeyCode::F19),
    ];
    TapDancesConfig {
        tap_dances: f
            .into_iter()
            .map(|(single, double)| TapDance::double(Action::Key(single), Action::Key(double)))
            .collect(),
    }
}

/// Shift+Comma types a dash, Shift+Dot a bullet, on the base layer only.
pub fn puq_overrides() -> KeyOverridesConfig {
    KeyOverridesConfig {
        overrides: [
            KeyOverride::new(KeyCode::Comma, SHIFT, Action::KeyWithModifier(KeyCode::Slash, ALT))
                .with_forbidden(CAG)
                .with_layers(1 << PUQ),
            KeyOverride::new(KeyCode::Dot, SHIFT, Action::KeyWithModifier(KeyCode::LeftBracket, ALT))
                .with_forbidden(CAG)
                .with_layers(1 << PUQ),
        ]
        .into_iter()
        .collect(),
    }
}

/// Macro 0 opens the context menu: GUI double tap, then Shift+F10 for apps without one.
pub fn puq_macros() -> KeyboardMacrosConfig {
    let menu = KeyboardMacro::new([
        MacroOperation::Tap(KeyCode::LGui),
        MacroOperation::Tap(KeyCode::LGui),
        MacroOperation::Press(KeyCode::LShift),
        MacroOperation::Tap(KeyCode::F10),
        MacroOperation::Release(KeyCode::LShift),
    ]);
    KeyboardMacrosConfig {
        macros: [menu].into_iter().collect(),
    }
}

pub fn puq_behavior() -> BehaviorConfig {
    BehaviorConfig {
        combo: puq_combos(),
        tap_dance: puq_tap_dances(),
        key_override: puq_overrides(),
        keyboard_macros: puq_macros(),
        ..Default::default()
    }
}

pub fn create_puq_keyboard() -> Keyboard<'static, PUQ_ROW, PUQ_COL, PUQ_LAYERS> {
    create_puq_keyboard_with_config(puq_behavior())
}

pub fn create_puq_keyboard_with_config(behavior: BehaviorConfig) -> Keyboard<'static, PUQ_ROW, PUQ_COL, PUQ_LAYERS> {
    Keyboard::new(&PUQ_KEYMAP, behavior, PositionalConfig::split_columns()).unwrap()
}

/// Create a small keyboard, for tests which don't need the full layout.
pub fn create_test_keyboard_with_config<const ROW: usize, const COL: usize, const NUM_LAYER: usize>(
    keymap: &'static [[[KeyAction; COL]; ROW]; NUM_LAYER],
    behavior: BehaviorConfig,
) -> Keyboard<'static, ROW, COL, NUM_LAYER> {
    Keyboard::new(keymap, behavior, PositionalConfig::split_columns()).unwrap()
}
