use embassy_time::Instant;

use crate::emitter::{ActionEmitter, Owner, Registration};
use crate::event::Output;
use crate::keyboard::{Keyboard, send};
use crate::keymap::LayerMode;

/// A held layer tap-toggle key.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct TapToggleKey {
    owner: Owner,
    layer: u8,
    pressed_at: Instant,
    /// Another key was pressed while this one was held
    interrupted: bool,
}

/// Taps counted towards toggling a layer.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct TapToggleTaps {
    owner: Owner,
    layer: u8,
    count: u8,
    last_tap: Instant,
}

impl<'a, const ROW: usize, const COL: usize, const NUM_LAYER: usize> Keyboard<'a, ROW, COL, NUM_LAYER> {
    /// Hold `layer` like a momentary layer key and start watching for a tap.
    pub(crate) fn press_tap_toggle(&mut self, owner: Owner, layer: u8, time: Instant, emitter: &mut dyn ActionEmitter) {
        let registration = Registration {
            layer: Some(layer),
            ..Registration::new(owner)
        };
        if !self.registry.insert(registration) {
            return;
        }
        if self.keymap.activate(layer, LayerMode::Momentary) {
            send(emitter, Output::LayerOn(layer), time);
        }
        self.tap_toggle_key = Some(TapToggleKey {
            owner,
            layer,
            pressed_at: time,
            interrupted: false,
        });
    }

    /// A key other than `owner` was pressed: neither a held tap-toggle key nor the tap count survive it.
    pub(crate) fn interrupt_tap_toggle(&mut self, owner: Owner) {
        if let Some(key) = self.tap_toggle_key.as_mut() {
            if key.owner != owner {
                key.interrupted = true;
            }
        }
        if self.tap_toggle_taps.is_some_and(|t| t.owner != owner) {
            self.tap_toggle_taps = None;
        }
    }

    /// `owner` was released. Must run before its momentary layer is released.
    pub(crate) fn release_tap_toggle(&mut self, owner: Owner, time: Instant, emitter: &mut dyn ActionEmitter) {
        let Some(key) = self.tap_toggle_key.filter(|k| k.owner == owner) else {
            return;
        };
        self.tap_toggle_key = None;

        let term = self.behavior.tap_hold.tapping_term;
        if key.interrupted || time.saturating_duration_since(key.pressed_at) > term {
            self.tap_toggle_taps = None;
            return;
        }

        let count = match self.tap_toggle_taps {
            Some(t)
                if t.owner == owner
                    && t.layer == key.layer
                    && key.pressed_at.saturating_duration_since(t.last_tap) <= term =>
            {
                t.count.saturating_add(1)
            }
            _ => 1,
        };
        if count < self.behavior.tap_hold.tapping_toggle {
            debug!("Layer {} tapped {} times", key.layer, count);
            self.tap_toggle_taps = Some(TapToggleTaps {
                owner,
                layer: key.layer,
                count,
                last_tap: time,
            });
            return;
        }

        self.tap_toggle_taps = None;
        debug!("Layer {} toggled by tap", key.layer);
        // The layer is still held, so the visible change happens when the hold is released
        if self.keymap.toggle(key.layer) {
            let kind = if self.keymap.is_active(key.layer) {
                Output::LayerOn(key.layer)
            } else {
                Output::LayerOff(key.layer)
            };
            send(emitter, kind, time);
        }
    }
}
