use embassy_time::{Duration, Instant};
use keychord_types::action::{Action, TapHoldMode, TapHoldProfile};

use crate::config::{Hand, TapHoldConfig};
use crate::event::KeyPos;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HoldTapPhase {
    Idle,
    AwaitingDecision,
    TapDecided,
    HoldDecided,
}

/// Outcome of a tap-hold decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HoldTapDecision {
    /// Press the hold action, release it with the key
    Hold,
    /// Press the tap action, release it with the key
    Tap,
    /// The key is already up: tap
    TapReleased,
    /// The key is already up and was held past the term: hold, then release
    HoldReleased,
}

/// Decision state of one mod-tap or layer-tap key.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HoldTapKeyState {
    pub(crate) pos: KeyPos,
    pub(crate) tap: Action,
    pub(crate) hold: Action,
    pub(crate) pressed_at: Instant,
    pub(crate) term: Duration,
    pub(crate) mode: TapHoldMode,
    pub(crate) hand: Hand,
    phase: HoldTapPhase,
}

impl HoldTapKeyState {
    /// State of a key that was just pressed.
    pub fn new(
        pos: KeyPos,
        tap: Action,
        hold: Action,
        profile: TapHoldProfile,
        config: &TapHoldConfig,
        hand: Hand,
        pressed_at: Instant,
    ) -> Self {
        let term = match profile.tapping_term_ms {
            Some(ms) if ms > 0 => Duration::from_millis(ms as u64),
            _ => config.tapping_term,
        };
        Self {
            pos,
            tap,
            hold,
            pressed_at,
            term,
            mode: profile.mode.unwrap_or(config.mode),
            hand,
            phase: HoldTapPhase::AwaitingDecision,
        }
    }

    pub fn phase(&self) -> HoldTapPhase {
        self.phase
    }

    pub fn tap_action(&self) -> Action {
        self.tap
    }

    pub fn hold_action(&self) -> Action {
        self.hold
    }

    /// The tapping term is inclusive: a release at exactly `pressed_at + term` is a tap.
    fn within_term(&self, time: Instant) -> bool {
        time.saturating_duration_since(self.pressed_at) <= self.term
    }

    /// Time at which `on_timeout` resolves the key as hold.
    pub(crate) fn deadline(&self) -> Option<Instant> {
        match self.phase {
            HoldTapPhase::AwaitingDecision => Some(self.pressed_at + self.term + Duration::from_millis(1)),
            _ => None,
        }
    }

    /// The key itself was released.
    pub fn on_release(&mut self, time: Instant) -> Option<HoldTapDecision> {
        match self.phase {
            HoldTapPhase::AwaitingDecision => {
                self.phase = HoldTapPhase::Idle;
                if self.within_term(time) {
                    Some(HoldTapDecision::TapReleased)
                } else {
                    Some(HoldTapDecision::HoldReleased)
                }
            }
            HoldTapPhase::TapDecided | HoldTapPhase::HoldDecided => {
                self.phase = HoldTapPhase::Idle;
                None
            }
            HoldTapPhase::Idle => None,
        }
    }

    /// Re-check the tapping term.
    pub fn on_timeout(&mut self, now: Instant) -> Option<HoldTapDecision> {
        if self.phase == HoldTapPhase::AwaitingDecision && !self.within_term(now) {
            self.phase = HoldTapPhase::HoldDecided;
            return Some(HoldTapDecision::Hold);
        }
        None
    }

    /// Another key was pressed while this one is down. `last_hand` is the hand of that key.
    pub fn on_other_press(&mut self, last_hand: Hand) -> Option<HoldTapDecision> {
        if self.phase != HoldTapPhase::AwaitingDecision {
            return None;
        }
        let decision = match self.mode {
            TapHoldMode::Normal => return None,
            TapHoldMode::PermissiveHold => HoldTapDecision::Hold,
            TapHoldMode::HoldOnOtherKeyPress => {
                if self.hand != Hand::Unknown && self.hand == last_hand {
                    HoldTapDecision::Tap
                } else {
                    HoldTapDecision::Hold
                }
            }
        };
        self.phase = match decision {
            HoldTapDecision::Tap => HoldTapPhase::TapDecided,
            _ => HoldTapPhase::HoldDecided,
        };
        Some(decision)
    }
}
