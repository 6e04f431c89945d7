use embassy_time::{Duration, Instant};
use heapless::Vec;
use keychord_types::action::Action;

use crate::event::KeyPos;

// Max number of tap dances
pub const TAP_DANCE_MAX_NUM: usize = 16;
// Max number of distinct tap counts of a tap dance
pub const TAP_DANCE_MAX_TAP: usize = 4;

/// Actions of a tap dance key: `taps[n - 1]` for `n` taps, `hold` for a single long press.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TapDance {
    pub(crate) taps: Vec<Action, TAP_DANCE_MAX_TAP>,
    pub(crate) hold: Action,
    pub(crate) term: Option<Duration>,
}

impl TapDance {
    /// Actions beyond `TAP_DANCE_MAX_TAP` are ignored. With `hold` set to `Action::No`, a long press
    /// holds the single tap action.
    pub fn new<I: IntoIterator<Item = Action>>(taps: I, hold: Action) -> Self {
        Self {
            taps: taps.into_iter().take(TAP_DANCE_MAX_TAP).collect(),
            hold,
            term: None,
        }
    }

    /// One action on a single tap, another on a double tap.
    pub fn double(single: Action, double: Action) -> Self {
        Self::new([single, double], Action::No)
    }

    /// Use a dance term different from the tapping term.
    pub fn with_term(mut self, term: Duration) -> Self {
        self.term = Some(term);
        self
    }

    pub(crate) fn max_taps(&self) -> u8 {
        self.taps.len() as u8
    }

    /// Counts above the configured ones repeat the last action.
    fn tap_action(&self, count: u8) -> Action {
        let index = (count.max(1) as usize - 1).min(self.taps.len().saturating_sub(1));
        self.taps.get(index).copied().unwrap_or(Action::No)
    }

    fn held_action(&self, count: u8) -> Action {
        if count <= 1 && self.hold != Action::No {
            self.hold
        } else {
            self.tap_action(count)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TapDancePhase {
    /// The key is down, waiting for release or the term
    Pressed,
    /// The key is up, waiting for another tap or the term
    Released,
}

/// Outcome of a tap dance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TapDanceDecision {
    /// Press the action and release it with the key
    Hold(Action),
    /// Press and release the action right away
    Tap(Action),
}

/// Tap counting state of one tap dance key.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TapDanceKeyState {
    pub(crate) pos: KeyPos,
    pub(crate) index: u8,
    count: u8,
    last: Instant,
    term: Duration,
    phase: TapDancePhase,
}

impl TapDanceKeyState {
    /// State after the first press.
    pub fn new(pos: KeyPos, index: u8, term: Duration, time: Instant) -> Self {
        Self {
            pos,
            index,
            count: 1,
            last: time,
            term,
            phase: TapDancePhase::Pressed,
        }
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn phase(&self) -> TapDancePhase {
        self.phase
    }

    fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last) > self.term
    }

    /// Time at which `on_timeout` finishes the dance.
    pub(crate) fn deadline(&self) -> Instant {
        self.last + self.term + Duration::from_millis(1)
    }

    /// The key was pressed again. Each tap restarts the term.
    pub fn on_press(&mut self, time: Instant) {
        if self.phase == TapDancePhase::Released {
            self.count = self.count.saturating_add(1);
            self.last = time;
            self.phase = TapDancePhase::Pressed;
        }
    }

    pub fn on_release(&mut self, dance: &TapDance, time: Instant) -> Option<TapDanceDecision> {
        if self.phase != TapDancePhase::Pressed {
            return None;
        }
        if self.expired(time) {
            return Some(TapDanceDecision::Tap(dance.held_action(self.count)));
        }
        if self.count >= dance.max_taps() {
            // No longer dance possible
            return Some(TapDanceDecision::Tap(dance.tap_action(self.count)));
        }
        self.last = time;
        self.phase = TapDancePhase::Released;
        None
    }

    /// Re-check the dance term.
    pub fn on_timeout(&mut self, dance: &TapDance, now: Instant) -> Option<TapDanceDecision> {
        if !self.expired(now) {
            return None;
        }
        Some(self.finish(dance))
    }

    /// Another key was pressed: the dance ends with the taps counted so far.
    pub fn on_interrupt(&mut self, dance: &TapDance) -> TapDanceDecision {
        self.finish(dance)
    }

    fn finish(&self, dance: &TapDance) -> TapDanceDecision {
        match self.phase {
            TapDancePhase::Pressed => TapDanceDecision::Hold(dance.held_action(self.count)),
            TapDancePhase::Released => TapDanceDecision::Tap(dance.tap_action(self.count)),
        }
    }
}
