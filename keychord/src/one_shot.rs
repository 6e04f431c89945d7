use embassy_time::{Duration, Instant};

use crate::emitter::{ActionEmitter, Owner, Registration};
use crate::event::Output;
use crate::keyboard::{Keyboard, send};
use crate::keymap::LayerMode;

/// State machine for one shot keys
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OneShotState<T> {
    /// First one shot key press
    Initial(T),
    /// One shot key was released before any other key, normal one shot behavior
    Single(T),
    /// Another key was pressed before one shot key was released, treat as a normal layer
    Held(T),
    /// One shot inactive
    #[default]
    None,
}

impl<T> OneShotState<T> {
    /// Get the current one shot value if any
    pub fn value(&self) -> Option<&T> {
        match self {
            OneShotState::Initial(v) | OneShotState::Single(v) | OneShotState::Held(v) => Some(v),
            OneShotState::None => None,
        }
    }
}

impl<'a, const ROW: usize, const COL: usize, const NUM_LAYER: usize> Keyboard<'a, ROW, COL, NUM_LAYER> {
    pub(crate) fn process_action_osl(
        &mut self,
        owner: Owner,
        layer: u8,
        time: Instant,
        emitter: &mut dyn ActionEmitter,
    ) {
        // A new one shot layer replaces the pending one
        if let Some(&current) = self.osl_state.value() {
            if current != layer {
                self.clear_osl(current, time, emitter);
            }
        }

        self.osl_state = OneShotState::Initial(layer);
        self.osl_since = time;
        let registration = Registration {
            one_shot: Some(layer),
            ..Registration::new(owner)
        };
        if self.registry.insert(registration) && self.keymap.activate(layer, LayerMode::OneShot) {
            send(emitter, Output::LayerOn(layer), time);
        }
    }

    /// The one shot key was released.
    pub(crate) fn release_osl(&mut self, layer: u8, time: Instant, emitter: &mut dyn ActionEmitter) {
        match self.osl_state {
            OneShotState::Initial(l) if l == layer => {
                debug!("One shot layer {} waits for the next key", layer);
                self.osl_state = OneShotState::Single(l);
                self.osl_since = time;
            }
            OneShotState::Held(l) if l == layer => self.clear_osl(l, time, emitter),
            _ => {}
        }
    }

    /// A non-modifier key was sent.
    pub(crate) fn update_osl(&mut self, time: Instant, emitter: &mut dyn ActionEmitter) {
        match self.osl_state {
            OneShotState::Initial(l) => self.osl_state = OneShotState::Held(l),
            OneShotState::Single(l) => self.clear_osl(l, time, emitter),
            _ => {}
        }
    }

    pub(crate) fn osl_deadline(&self) -> Option<Instant> {
        match self.osl_state {
            OneShotState::Single(_) => {
                Some(self.osl_since + self.behavior.one_shot.timeout + Duration::from_millis(1))
            }
            _ => None,
        }
    }

    pub(crate) fn tick_osl(&mut self, now: Instant, emitter: &mut dyn ActionEmitter) {
        if let OneShotState::Single(layer) = self.osl_state {
            if now.saturating_duration_since(self.osl_since) > self.behavior.one_shot.timeout {
                debug!("One shot layer {} timed out", layer);
                self.clear_osl(layer, now, emitter);
            }
        }
    }

    fn clear_osl(&mut self, layer: u8, time: Instant, emitter: &mut dyn ActionEmitter) {
        self.osl_state = OneShotState::None;
        if self.keymap.clear_one_shot(layer) {
            send(emitter, Output::LayerOff(layer), time);
        }
    }
}
