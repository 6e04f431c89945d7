use embassy_time::Instant;
use keychord_types::keycode::KeyCode;
use keychord_types::modifier::HidModifiers;
use serde::{Deserialize, Serialize};

/// A matrix position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyPos {
    pub row: u8,
    pub col: u8,
}

impl KeyPos {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }
}

/// A debounced key transition delivered by the matrix scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardEvent {
    pub pos: KeyPos,
    pub pressed: bool,
    pub time: Instant,
}

impl KeyboardEvent {
    pub fn key(row: u8, col: u8, pressed: bool, time: Instant) -> Self {
        Self {
            pos: KeyPos::new(row, col),
            pressed,
            time,
        }
    }

    pub fn press(pos: KeyPos, time: Instant) -> Self {
        Self {
            pos,
            pressed: true,
            time,
        }
    }

    pub fn release(pos: KeyPos, time: Instant) -> Self {
        Self {
            pos,
            pressed: false,
            time,
        }
    }
}

/// What the engine asks the HID layer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Output {
    KeyDown(KeyCode),
    KeyUp(KeyCode),
    ModifierOn(HidModifiers),
    ModifierOff(HidModifiers),
    LayerOn(u8),
    LayerOff(u8),
}

/// A resolved output with the time of the decision that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputEvent {
    pub kind: Output,
    pub time: Instant,
}
