mod validation;

use embassy_time::Duration;
use heapless::Vec;
use keychord_types::action::TapHoldMode;
use serde::{Deserialize, Serialize};

use crate::combo::{COMBO_MAX_NUM, Combo};
use crate::event::KeyPos;
use crate::key_override::{KEY_OVERRIDE_MAX_NUM, KeyOverride};
use crate::keyboard_macro::{KeyboardMacro, NUM_MACRO};
use crate::tap_dance::{TAP_DANCE_MAX_NUM, TapDance};

/// Config for configurable action behavior
#[derive(Clone, Debug, Default)]
pub struct BehaviorConfig {
    pub tap_hold: TapHoldConfig,
    pub one_shot: OneShotConfig,
    pub combo: CombosConfig,
    pub tap_dance: TapDancesConfig,
    pub key_override: KeyOverridesConfig,
    pub keyboard_macros: KeyboardMacrosConfig,
}

/// Configurations for tap hold behavior
#[derive(Clone, Copy, Debug)]
pub struct TapHoldConfig {
    /// Pressed longer than this resolves a tap-hold key as hold. Releasing exactly at the term is a tap.
    pub tapping_term: Duration,
    /// Decision mode for keys whose profile does not set one
    pub mode: TapHoldMode,
    /// Consecutive taps of a layer tap-toggle key that toggle its layer
    pub tapping_toggle: u8,
}

impl Default for TapHoldConfig {
    fn default() -> Self {
        Self {
            tapping_term: Duration::from_millis(200),
            mode: TapHoldMode::PermissiveHold,
            tapping_toggle: 1,
        }
    }
}

/// Config for one shot behavior
#[derive(Clone, Copy, Debug)]
pub struct OneShotConfig {
    pub timeout: Duration,
}

impl Default for OneShotConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
        }
    }
}

/// Which combos emit their output only as a tap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ComboMustTap {
    /// Every combo
    All,
    /// Combos with a key bound to mod-tap, layer-tap or a momentary layer, plus combos marked must-tap
    HoldTapMembers,
    /// Only combos marked must-tap
    PerCombo,
}

/// Config for combo behavior
#[derive(Clone, Debug)]
pub struct CombosConfig {
    pub combos: Vec<Combo, COMBO_MAX_NUM>,
    /// Combo term for combos without their own
    pub timeout: Duration,
    /// Longest hold of a tap-only combo, shortest hold of a hold-only combo
    pub hold_term: Duration,
    pub must_tap: ComboMustTap,
}

impl Default for CombosConfig {
    fn default() -> Self {
        Self {
            combos: Vec::new(),
            timeout: Duration::from_millis(100),
            hold_term: Duration::from_millis(200),
            must_tap: ComboMustTap::All,
        }
    }
}

/// Config for tap dance behavior
#[derive(Clone, Debug, Default)]
pub struct TapDancesConfig {
    pub tap_dances: Vec<TapDance, TAP_DANCE_MAX_NUM>,
}

/// Config for key overrides, evaluated in order
#[derive(Clone, Debug, Default)]
pub struct KeyOverridesConfig {
    pub overrides: Vec<KeyOverride, KEY_OVERRIDE_MAX_NUM>,
}

/// Macros referenced by `Action::TriggerMacro`
#[derive(Clone, Debug, Default)]
pub struct KeyboardMacrosConfig {
    pub macros: Vec<KeyboardMacro, NUM_MACRO>,
}

/// Hand a key belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Hand {
    Left,
    Right,
    /// Thumb clusters and anything else shared by both hands
    #[default]
    Unknown,
}

/// Per-position settings.
#[derive(Clone, Copy, Debug)]
pub struct PositionalConfig<const ROW: usize, const COL: usize> {
    pub hand: [[Hand; COL]; ROW],
}

impl<const ROW: usize, const COL: usize> Default for PositionalConfig<ROW, COL> {
    fn default() -> Self {
        Self {
            hand: [[Hand::Unknown; COL]; ROW],
        }
    }
}

impl<const ROW: usize, const COL: usize> PositionalConfig<ROW, COL> {
    /// Left half of the columns is the left hand. The middle column of an odd matrix is unassigned.
    pub fn split_columns() -> Self {
        let mut hand = [[Hand::Unknown; COL]; ROW];
        for row in hand.iter_mut() {
            for (col, h) in row.iter_mut().enumerate() {
                if col < COL / 2 {
                    *h = Hand::Left;
                } else if col >= COL.div_ceil(2) {
                    *h = Hand::Right;
                }
            }
        }
        Self { hand }
    }

    pub fn with_hand(mut self, pos: KeyPos, hand: Hand) -> Self {
        if let Some(h) = self
            .hand
            .get_mut(pos.row as usize)
            .and_then(|r| r.get_mut(pos.col as usize))
        {
            *h = hand;
        }
        self
    }

    pub fn hand(&self, pos: KeyPos) -> Hand {
        self.hand
            .get(pos.row as usize)
            .and_then(|r| r.get(pos.col as usize))
            .copied()
            .unwrap_or_default()
    }
}
