//! # Keychord
//!
//! Key event resolution for keyboard firmware. A [`Keyboard`] consumes debounced
//! press and release events of a key matrix and turns them into key, modifier and
//! layer output, resolving:
//!
//! - layers (momentary, toggled and one shot), see [`keymap`]
//! - combos, chords of keys that produce one action, see [`combo`]
//! - mod-tap and layer-tap keys, see [`tap_hold`]
//! - tap dances, see [`tap_dance`]
//! - key overrides, see [`key_override`]
//! - macros, see [`keyboard_macro`]
//!
//! The engine runs in a single scan loop, never blocks and never reads a clock:
//! time enters through event timestamps and [`Keyboard::tick`].

#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod combo;
pub mod config;
pub mod emitter;
pub mod error;
pub mod event;
pub mod key_override;
pub mod keyboard;
pub mod keyboard_macro;
pub mod keymap;
mod layout_macro;
pub mod one_shot;
pub mod tap_dance;
pub mod tap_hold;
mod tap_toggle;

pub use keyboard::Keyboard;
pub use keychord_types::{action, keycode, modifier};
