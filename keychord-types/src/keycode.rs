use serde::{Deserialize, Serialize};
use strum::FromRepr;

use crate::modifier::{HidModifiers, ModifierCombination};

/// Keycodes a binding can emit.
///
/// Values follow the HID keyboard usage page. The consumer and system
/// control entries between `0xA5` and `0xC2` are not keyboard usages: the
/// HID layer receiving the output stream is expected to translate them.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord, FromRepr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyCode {
    /// No key. Emitting it has no effect.
    No = 0x00,
    ErrorRollover = 0x01,
    PostFail = 0x02,
    ErrorUndefined = 0x03,
    // Letters
    A = 0x04,
    B = 0x05,
    C = 0x06,
    D = 0x07,
    E = 0x08,
    F = 0x09,
    G = 0x0A,
    H = 0x0B,
    I = 0x0C,
    J = 0x0D,
    K = 0x0E,
    L = 0x0F,
    M = 0x10,
    N = 0x11,
    O = 0x12,
    P = 0x13,
    Q = 0x14,
    R = 0x15,
    S = 0x16,
    T = 0x17,
    U = 0x18,
    V = 0x19,
    W = 0x1A,
    X = 0x1B,
    Y = 0x1C,
    Z = 0x1D,
    // Number row
    Kc1 = 0x1E,
    Kc2 = 0x1F,
    Kc3 = 0x20,
    Kc4 = 0x21,
    Kc5 = 0x22,
    Kc6 = 0x23,
    Kc7 = 0x24,
    Kc8 = 0x25,
    Kc9 = 0x26,
    Kc0 = 0x27,
    // Editing and whitespace
    Enter = 0x28,
    Escape = 0x29,
    Backspace = 0x2A,
    Tab = 0x2B,
    Space = 0x2C,
    // Punctuation, US positions
    Minus = 0x2D,
    Equal = 0x2E,
    LeftBracket = 0x2F,
    RightBracket = 0x30,
    Backslash = 0x31,
    NonusHash = 0x32,
    Semicolon = 0x33,
    Quote = 0x34,
    Grave = 0x35,
    Comma = 0x36,
    Dot = 0x37,
    Slash = 0x38,
    // Lock and function keys
    CapsLock = 0x39,
    F1 = 0x3A,
    F2 = 0x3B,
    F3 = 0x3C,
    F4 = 0x3D,
    F5 = 0x3E,
    F6 = 0x3F,
    F7 = 0x40,
    F8 = 0x41,
    F9 = 0x42,
    F10 = 0x43,
    F11 = 0x44,
    F12 = 0x45,
    // Navigation
    PrintScreen = 0x46,
    ScrollLock = 0x47,
    Pause = 0x48,
    Insert = 0x49,
    Home = 0x4A,
    PageUp = 0x4B,
    Delete = 0x4C,
    End = 0x4D,
    PageDown = 0x4E,
    Right = 0x4F,
    Left = 0x50,
    Down = 0x51,
    Up = 0x52,
    // Keypad
    NumLock = 0x53,
    KpSlash = 0x54,
    KpAsterisk = 0x55,
    KpMinus = 0x56,
    KpPlus = 0x57,
    KpEnter = 0x58,
    Kp1 = 0x59,
    Kp2 = 0x5A,
    Kp3 = 0x5B,
    Kp4 = 0x5C,
    Kp5 = 0x5D,
    Kp6 = 0x5E,
    Kp7 = 0x5F,
    Kp8 = 0x60,
    Kp9 = 0x61,
    Kp0 = 0x62,
    KpDot = 0x63,
    // Non-US and application keys
    NonusBackslash = 0x64,
    Application = 0x65,
    KbPower = 0x66,
    KpEqual = 0x67,
    // Extended function keys, used for host-side shortcuts
    F13 = 0x68,
    F14 = 0x69,
    F15 = 0x6A,
    F16 = 0x6B,
    F17 = 0x6C,
    F18 = 0x6D,
    F19 = 0x6E,
    F20 = 0x6F,
    F21 = 0x70,
    F22 = 0x71,
    F23 = 0x72,
    F24 = 0x73,
    // Legacy editing keys
    Execute = 0x74,
    Help = 0x75,
    Menu = 0x76,
    Select = 0x77,
    Stop = 0x78,
    Again = 0x79,
    Undo = 0x7A,
    Cut = 0x7B,
    Copy = 0x7C,
    Paste = 0x7D,
    Find = 0x7E,
    KbMute = 0x7F,
    KbVolumeUp = 0x80,
    KbVolumeDown = 0x81,
    // Locking keys and international input
    LockingCapsLock = 0x82,
    LockingNumLock = 0x83,
    LockingScrollLock = 0x84,
    KpComma = 0x85,
    KpEqualAs400 = 0x86,
    International1 = 0x87,
    International2 = 0x88,
    International3 = 0x89,
    International4 = 0x8A,
    International5 = 0x8B,
    International6 = 0x8C,
    International7 = 0x8D,
    International8 = 0x8E,
    International9 = 0x8F,
    Language1 = 0x90,
    Language2 = 0x91,
    Language3 = 0x92,
    Language4 = 0x93,
    Language5 = 0x94,
    Language6 = 0x95,
    Language7 = 0x96,
    Language8 = 0x97,
    Language9 = 0x98,
    // Rarely used system keys
    AlternateErase = 0x99,
    SystemRequest = 0x9A,
    Cancel = 0x9B,
    Clear = 0x9C,
    Prior = 0x9D,
    Return = 0x9E,
    Separator = 0x9F,
    Out = 0xA0,
    Oper = 0xA1,
    ClearAgain = 0xA2,
    Crsel = 0xA3,
    Exsel = 0xA4,
    // System control, translated by the HID layer
    SystemPower = 0xA5,
    SystemSleep = 0xA6,
    SystemWake = 0xA7,
    // Consumer page keys, translated by the HID layer
    AudioMute = 0xA8,
    AudioVolUp = 0xA9,
    AudioVolDown = 0xAA,
    MediaNextTrack = 0xAB,
    MediaPrevTrack = 0xAC,
    MediaStop = 0xAD,
    MediaPlayPause = 0xAE,
    MediaSelect = 0xAF,
    MediaEject = 0xB0,
    Mail = 0xB1,
    Calculator = 0xB2,
    MyComputer = 0xB3,
    WwwSearch = 0xB4,
    WwwHome = 0xB5,
    WwwBack = 0xB6,
    WwwForward = 0xB7,
    WwwStop = 0xB8,
    WwwRefresh = 0xB9,
    WwwFavorites = 0xBA,
    MediaFastForward = 0xBB,
    MediaRewind = 0xBC,
    BrightnessUp = 0xBD,
    BrightnessDown = 0xBE,
    ControlPanel = 0xBF,
    Assistant = 0xC0,
    MissionControl = 0xC1,
    Launchpad = 0xC2,
    // Modifiers
    LCtrl = 0xE0,
    LShift = 0xE1,
    LAlt = 0xE2,
    LGui = 0xE3,
    RCtrl = 0xE4,
    RShift = 0xE5,
    RAlt = 0xE6,
    RGui = 0xE7,
}

impl KeyCode {
    pub fn is_modifier(self) -> bool {
        KeyCode::LCtrl <= self && self <= KeyCode::RGui
    }

    pub fn is_function_key(self) -> bool {
        (KeyCode::F1 <= self && self <= KeyCode::F12) || (KeyCode::F13 <= self && self <= KeyCode::F24)
    }

    /// Keys that the HID layer reports outside the keyboard report.
    pub fn is_consumer_or_system(self) -> bool {
        KeyCode::SystemPower <= self && self <= KeyCode::Launchpad
    }

    /// Side-agnostic modifier combination of a modifier keycode, empty for other keys.
    pub fn to_modifier_combination(self) -> ModifierCombination {
        match self {
            KeyCode::LCtrl => ModifierCombination::LCTRL,
            KeyCode::LShift => ModifierCombination::LSHIFT,
            KeyCode::LAlt => ModifierCombination::LALT,
            KeyCode::LGui => ModifierCombination::LGUI,
            KeyCode::RCtrl => ModifierCombination::RCTRL,
            KeyCode::RShift => ModifierCombination::RSHIFT,
            KeyCode::RAlt => ModifierCombination::RALT,
            KeyCode::RGui => ModifierCombination::RGUI,
            _ => ModifierCombination::new(),
        }
    }

    /// Report bits of a modifier keycode, empty for other keys.
    pub fn to_hid_modifiers(self) -> HidModifiers {
        self.to_modifier_combination().to_hid_modifiers()
    }
}

impl From<u8> for KeyCode {
    fn from(value: u8) -> Self {
        Self::from_repr(value).unwrap_or(KeyCode::No)
    }
}
