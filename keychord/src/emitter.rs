//! The boundary to the HID layer.
//!
//! Every press that produces output is recorded in a [`Registry`] entry owned by the
//! physical key or fired combo that caused it. Releasing the owner undoes exactly that
//! entry, and the reported modifier state is always recomputed from what is still registered.

use embassy_time::Instant;
use heapless::Vec;
use keychord_types::keycode::KeyCode;
use keychord_types::modifier::HidModifiers;

use crate::event::{KeyPos, Output, OutputEvent};

// Max number of owners with registered output at the same time
pub(crate) const REGISTRY_MAX: usize = 16;

/// Receiver of the resolved output stream.
pub trait ActionEmitter {
    fn emit(&mut self, event: OutputEvent);
}

impl<const N: usize> ActionEmitter for Vec<OutputEvent, N> {
    fn emit(&mut self, event: OutputEvent) {
        if self.push(event).is_err() {
            error!("Output buffer full, dropping {:?}", event);
        }
    }
}

impl<T: ActionEmitter + ?Sized> ActionEmitter for &mut T {
    fn emit(&mut self, event: OutputEvent) {
        (**self).emit(event)
    }
}

/// Wrap a closure as an emitter.
pub struct FnEmitter<F: FnMut(OutputEvent)>(pub F);

impl<F: FnMut(OutputEvent)> ActionEmitter for FnEmitter<F> {
    fn emit(&mut self, event: OutputEvent) {
        (self.0)(event)
    }
}

/// Stamps every output with at least `now`. Replayed inputs keep their original time,
/// but what they produce is decided now.
pub(crate) struct Stamped<'e> {
    inner: &'e mut dyn ActionEmitter,
    now: Instant,
}

impl<'e> Stamped<'e> {
    pub(crate) fn new(inner: &'e mut dyn ActionEmitter, now: Instant) -> Self {
        Self { inner, now }
    }
}

impl ActionEmitter for Stamped<'_> {
    fn emit(&mut self, mut event: OutputEvent) {
        event.time = event.time.max(self.now);
        self.inner.emit(event)
    }
}

/// What caused an output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum Owner {
    Key(KeyPos),
    Combo(u8),
}

/// Output held down by one owner.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct Registration {
    pub(crate) owner: Owner,
    pub(crate) key: Option<KeyCode>,
    /// Modifiers held by a modifier key or a hold action
    pub(crate) held_mods: HidModifiers,
    /// Modifiers sent together with `key`
    pub(crate) key_mods: HidModifiers,
    /// Held modifiers lifted while `key` is down
    pub(crate) suppress: HidModifiers,
    /// Momentary layer released with the owner
    pub(crate) layer: Option<u8>,
    /// One shot layer key
    pub(crate) one_shot: Option<u8>,
}

impl Registration {
    pub(crate) fn new(owner: Owner) -> Self {
        Self {
            owner,
            key: None,
            held_mods: HidModifiers::new(),
            key_mods: HidModifiers::new(),
            suppress: HidModifiers::new(),
            layer: None,
            one_shot: None,
        }
    }
}

/// Registered output of all owners, plus the modifier state last reported.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: Vec<Registration, REGISTRY_MAX>,
    reported: HidModifiers,
}

impl Registry {
    pub(crate) fn contains(&self, owner: Owner) -> bool {
        self.entries.iter().any(|r| r.owner == owner)
    }

    pub(crate) fn insert(&mut self, registration: Registration) -> bool {
        if self.entries.push(registration).is_err() {
            error!("Too many keys held, dropping {:?}", registration.owner);
            return false;
        }
        true
    }

    pub(crate) fn get_mut(&mut self, owner: Owner) -> Option<&mut Registration> {
        self.entries.iter_mut().find(|r| r.owner == owner)
    }

    pub(crate) fn remove(&mut self, owner: Owner) -> Option<Registration> {
        let index = self.entries.iter().position(|r| r.owner == owner)?;
        Some(self.entries.remove(index))
    }

    /// Modifiers held by modifier keys and hold actions, the context of key overrides.
    pub(crate) fn held_modifiers(&self) -> HidModifiers {
        self.entries
            .iter()
            .fold(HidModifiers::new(), |mods, r| mods | r.held_mods)
    }

    /// Modifiers the host should see.
    pub(crate) fn effective_modifiers(&self) -> HidModifiers {
        let (held, key, suppress) = self.entries.iter().fold(
            (HidModifiers::new(), HidModifiers::new(), HidModifiers::new()),
            |(held, key, suppress), r| (held | r.held_mods, key | r.key_mods, suppress | r.suppress),
        );
        (held & !suppress) | key
    }

    pub(crate) fn reported(&self) -> HidModifiers {
        self.reported
    }

    /// Report the modifier changes since the last sync: releases first, then presses.
    pub(crate) fn sync_modifiers(&mut self, time: Instant, emitter: &mut dyn ActionEmitter) {
        let current = self.effective_modifiers();
        let off = self.reported & !current;
        let on = current & !self.reported;
        if !off.is_empty() {
            emitter.emit(OutputEvent {
                kind: Output::ModifierOff(off),
                time,
            });
        }
        if !on.is_empty() {
            emitter.emit(OutputEvent {
                kind: Output::ModifierOn(on),
                time,
            });
        }
        self.reported = current;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
