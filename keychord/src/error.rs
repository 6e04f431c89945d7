//! Errors reported while checking the static configuration.
//!
//! Any of these prevents the engine from starting. Runtime input problems are
//! never errors: they are logged, counted and dropped by the keyboard.

use core::fmt;

use crate::event::KeyPos;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// More layers than the layer mask can hold
    TooManyLayers { layers: usize },
    /// The base layer must bind every position, `Transparent` would resolve to nothing
    TransparentBaseKey { pos: KeyPos },
    /// A binding references a layer that does not exist
    UndefinedLayer { layer: u8, pos: KeyPos },
    /// A binding references a tap dance that does not exist
    UndefinedTapDance { index: u8, pos: KeyPos },
    /// A tap dance has no tap action
    EmptyTapDance { index: u8 },
    /// A combo needs at least two keys
    ComboTooShort { index: usize },
    /// A combo key lies outside the matrix
    ComboKeyOutOfRange { index: usize, pos: KeyPos },
    /// A combo lists the same key twice
    ComboRepeatedKey { index: usize, pos: KeyPos },
    /// Two combos with the same key set can be eligible at the same time
    DuplicateCombo { first: usize, second: usize },
    /// A combo is both tap-only and hold-only
    ConflictingComboPolicy { index: usize },
    /// A combo outputs or is restricted to a layer that does not exist
    UndefinedComboLayer { index: usize, layer: u8 },
    /// A key override has no usable trigger or replacement keycode
    UnknownOverrideKeycode { index: usize },
    /// A key override is restricted to layers that do not exist
    UndefinedOverrideLayer { index: usize },
    /// A binding or combo references a macro that does not exist
    UndefinedMacro { index: u8 },
    /// A macro has no operation
    EmptyMacro { index: u8 },
    /// A timing value is zero
    ZeroTerm { field: &'static str },
    /// Layer tap-toggle keys would toggle without being tapped
    ZeroTappingToggle,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::TooManyLayers { layers } => {
                write!(f, "{} layers configured, at most 32 are supported", layers)
            }
            ConfigError::TransparentBaseKey { pos } => {
                write!(f, "Base layer key ({}, {}) is transparent", pos.row, pos.col)
            }
            ConfigError::UndefinedLayer { layer, pos } => {
                write!(f, "Key ({}, {}) references undefined layer {}", pos.row, pos.col, layer)
            }
            ConfigError::UndefinedTapDance { index, pos } => {
                write!(
                    f,
                    "Key ({}, {}) references undefined tap dance {}",
                    pos.row, pos.col, index
                )
            }
            ConfigError::EmptyTapDance { index } => write!(f, "Tap dance {} has no tap action", index),
            ConfigError::ComboTooShort { index } => write!(f, "Combo {} has less than 2 keys", index),
            ConfigError::ComboKeyOutOfRange { index, pos } => {
                write!(
                    f,
                    "Combo {} uses key ({}, {}) outside of the matrix",
                    index, pos.row, pos.col
                )
            }
            ConfigError::ComboRepeatedKey { index, pos } => {
                write!(f, "Combo {} lists key ({}, {}) twice", index, pos.row, pos.col)
            }
            ConfigError::DuplicateCombo { first, second } => {
                write!(f, "Combos {} and {} use the same keys on the same layer", first, second)
            }
            ConfigError::ConflictingComboPolicy { index } => {
                write!(f, "Combo {} is both must-tap and must-hold", index)
            }
            ConfigError::UndefinedComboLayer { index, layer } => {
                write!(f, "Combo {} references undefined layer {}", index, layer)
            }
            ConfigError::UnknownOverrideKeycode { index } => {
                write!(f, "Key override {} has no trigger or replacement keycode", index)
            }
            ConfigError::UndefinedOverrideLayer { index } => {
                write!(f, "Key override {} is restricted to undefined layers", index)
            }
            ConfigError::UndefinedMacro { index } => write!(f, "Macro {} is not defined", index),
            ConfigError::EmptyMacro { index } => write!(f, "Macro {} has no operation", index),
            ConfigError::ZeroTerm { field } => write!(f, "'{}' must not be zero", field),
            ConfigError::ZeroTappingToggle => write!(f, "'tap_hold.tapping_toggle' must not be zero"),
        }
    }
}

impl core::error::Error for ConfigError {}

/// Result type alias for configuration checks
pub type ConfigResult<T> = Result<T, ConfigError>;
