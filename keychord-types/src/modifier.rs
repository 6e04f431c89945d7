use core::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

use bitfield_struct::bitfield;
use serde::{Deserialize, Serialize};

/// Modifier set as written in a keymap: 4 modifier kinds plus one side bit.
///
/// | bit4 | bit3 | bit2 | bit1 | bit0 |
/// | --- | --- | --- | --- | --- |
/// | L/R | GUI | ALT |SHIFT| CTRL|
#[bitfield(u8, order = Lsb, defmt = cfg(feature = "defmt"))]
#[derive(Serialize, Deserialize, Eq, PartialEq)]
pub struct ModifierCombination {
    #[bits(1)]
    pub ctrl: bool,
    #[bits(1)]
    pub shift: bool,
    #[bits(1)]
    pub alt: bool,
    #[bits(1)]
    pub gui: bool,
    #[bits(1)]
    pub right: bool,
    #[bits(3)]
    _reserved: u8,
}

const KIND_MASK: u8 = 0b0_1111;

impl BitOr for ModifierCombination {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::from_bits(self.into_bits() | rhs.into_bits())
    }
}

impl ModifierCombination {
    pub const LCTRL: Self = Self::new().with_ctrl(true);
    pub const LSHIFT: Self = Self::new().with_shift(true);
    pub const LALT: Self = Self::new().with_alt(true);
    pub const LGUI: Self = Self::new().with_gui(true);
    pub const RCTRL: Self = Self::LCTRL.with_right(true);
    pub const RSHIFT: Self = Self::LSHIFT.with_right(true);
    pub const RALT: Self = Self::LALT.with_right(true);
    pub const RGUI: Self = Self::LGUI.with_right(true);

    pub const fn new_from(right: bool, gui: bool, alt: bool, shift: bool, ctrl: bool) -> Self {
        ModifierCombination::new()
            .with_right(right)
            .with_gui(gui)
            .with_alt(alt)
            .with_shift(shift)
            .with_ctrl(ctrl)
    }

    /// Const-friendly union, used by the layout macros.
    pub const fn union(self, other: Self) -> Self {
        Self::from_bits(self.into_bits() | other.into_bits())
    }

    /// Collapse report bits to modifier kinds. The side bit is set when any right modifier is active.
    pub fn from_hid_modifiers(modifiers: HidModifiers) -> Self {
        Self::new_from(
            modifiers.right_shift() || modifiers.right_ctrl() || modifiers.right_alt() || modifiers.right_gui(),
            modifiers.left_gui() || modifiers.right_gui(),
            modifiers.left_alt() || modifiers.right_alt(),
            modifiers.left_shift() || modifiers.right_shift(),
            modifiers.left_ctrl() || modifiers.right_ctrl(),
        )
    }

    pub fn to_hid_modifiers(self) -> HidModifiers {
        if !self.right() {
            HidModifiers::new()
                .with_left_ctrl(self.ctrl())
                .with_left_shift(self.shift())
                .with_left_alt(self.alt())
                .with_left_gui(self.gui())
        } else {
            HidModifiers::new()
                .with_right_ctrl(self.ctrl())
                .with_right_shift(self.shift())
                .with_right_alt(self.alt())
                .with_right_gui(self.gui())
        }
    }

    pub fn is_empty(self) -> bool {
        self.into_bits() & KIND_MASK == 0
    }

    /// Whether every modifier kind in `other` is also in `self`, ignoring sides.
    pub fn contains_kinds(self, other: Self) -> bool {
        let other = other.into_bits() & KIND_MASK;
        self.into_bits() & other == other
    }

    /// Whether `self` and `other` share any modifier kind, ignoring sides.
    pub fn intersects_kinds(self, other: Self) -> bool {
        self.into_bits() & other.into_bits() & KIND_MASK != 0
    }
}

/// Modifier byte of a HID keyboard report.
#[bitfield(u8, order = Lsb)]
#[derive(Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HidModifiers {
    #[bits(1)]
    pub left_ctrl: bool,
    #[bits(1)]
    pub left_shift: bool,
    #[bits(1)]
    pub left_alt: bool,
    #[bits(1)]
    pub left_gui: bool,
    #[bits(1)]
    pub right_ctrl: bool,
    #[bits(1)]
    pub right_shift: bool,
    #[bits(1)]
    pub right_alt: bool,
    #[bits(1)]
    pub right_gui: bool,
}

impl BitOr for HidModifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::from_bits(self.into_bits() | rhs.into_bits())
    }
}
impl BitAnd for HidModifiers {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::from_bits(self.into_bits() & rhs.into_bits())
    }
}
impl Not for HidModifiers {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::from_bits(!self.into_bits())
    }
}
impl BitAndAssign for HidModifiers {
    fn bitand_assign(&mut self, rhs: Self) {
        *self = *self & rhs;
    }
}
impl BitOrAssign for HidModifiers {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

impl HidModifiers {
    pub fn is_empty(self) -> bool {
        self.into_bits() == 0
    }
}
