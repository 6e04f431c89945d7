use embassy_time::{Duration, Instant};
use heapless::Vec;
use keychord_types::action::{Action, KeyAction};

use crate::config::{ComboMustTap, CombosConfig};
use crate::emitter::Owner;
use crate::event::{KeyPos, KeyboardEvent};

// Max number of combos
pub const COMBO_MAX_NUM: usize = 32;
// Max number of keys in a combo
pub const COMBO_MAX_LENGTH: usize = 4;
// Max number of fired combos whose keys are still held
pub(crate) const COMBO_ACTIVE_MAX: usize = 4;
// Max number of inputs forwarded by a single combo step
pub(crate) const COMBO_FORWARD_MAX: usize = 16;

/// A chord of physical keys that produces one action.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Combo {
    pub(crate) keys: Vec<KeyPos, COMBO_MAX_LENGTH>,
    pub(crate) output: Action,
    pub(crate) layer: Option<u8>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) must_tap: bool,
    pub(crate) must_hold: bool,
}

impl Combo {
    /// Keys beyond `COMBO_MAX_LENGTH` are ignored.
    pub fn new<I: IntoIterator<Item = KeyPos>>(keys: I, output: Action, layer: Option<u8>) -> Self {
        Self {
            keys: keys.into_iter().take(COMBO_MAX_LENGTH).collect(),
            output,
            layer,
            timeout: None,
            must_tap: false,
            must_hold: false,
        }
    }

    /// Use a combo term different from the keyboard-wide one.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Emit the output only as a tap, on release of all keys.
    pub fn with_must_tap(mut self) -> Self {
        self.must_tap = true;
        self
    }

    /// Press the output only after all keys were held for the combo hold term.
    pub fn with_must_hold(mut self) -> Self {
        self.must_hold = true;
        self
    }

    pub fn keys(&self) -> &[KeyPos] {
        &self.keys
    }

    pub fn output(&self) -> Action {
        self.output
    }

    pub(crate) fn position(&self, pos: KeyPos) -> Option<usize> {
        self.keys.iter().position(|k| *k == pos)
    }

    fn full_mask(&self) -> u8 {
        ((1u16 << self.keys.len()) - 1) as u8
    }

    fn is_eligible(&self, top_layer: u8) -> bool {
        self.layer.is_none_or(|l| l == top_layer)
    }
}

/// Something the key stage has to handle: a physical key or a fired combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum KeyInput {
    Key(KeyboardEvent),
    Combo { index: u8, pressed: bool, time: Instant },
}

impl KeyInput {
    pub(crate) fn pressed(&self) -> bool {
        match self {
            KeyInput::Key(e) => e.pressed,
            KeyInput::Combo { pressed, .. } => *pressed,
        }
    }

    pub(crate) fn owner(&self) -> Owner {
        match self {
            KeyInput::Key(e) => Owner::Key(e.pos),
            KeyInput::Combo { index, .. } => Owner::Combo(*index),
        }
    }

    pub(crate) fn time(&self) -> Instant {
        match self {
            KeyInput::Key(e) => e.time,
            KeyInput::Combo { time, .. } => *time,
        }
    }
}

pub(crate) type Forwarded = Vec<KeyInput, COMBO_FORWARD_MAX>;

/// Policy of a combo after applying the keyboard-wide must-tap setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct ComboPolicy {
    pub(crate) timeout: Duration,
    pub(crate) must_tap: bool,
    pub(crate) must_hold: bool,
}

impl ComboPolicy {
    /// `binding` returns the keymap binding of a combo key on the combo's layer.
    pub(crate) fn resolve(combo: &Combo, config: &CombosConfig, binding: impl Fn(KeyPos) -> KeyAction) -> Self {
        let must_tap = match config.must_tap {
            ComboMustTap::All => true,
            ComboMustTap::HoldTapMembers => {
                combo.must_tap || combo.keys.iter().any(|k| binding(*k).has_hold_behavior())
            }
            ComboMustTap::PerCombo => combo.must_tap,
        };
        Self {
            timeout: combo.timeout.unwrap_or(config.timeout),
            must_tap,
            must_hold: combo.must_hold,
        }
    }
}

/// Progress of one combo during the current chord attempt.
#[derive(Clone, Copy, Debug, Default)]
struct ComboInstance {
    pressed: u8,
    alive: bool,
}

/// Keys pressed so far in a chord attempt, held back from the key stage.
#[derive(Clone, Debug)]
struct Chord {
    start: Instant,
    events: Vec<KeyboardEvent, COMBO_MAX_LENGTH>,
    // A completed combo waiting for a larger combo that contains it
    completed: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum ActivePhase {
    /// Output pressed, released by the first key release
    Held { released: bool },
    /// Output emitted as a tap once all keys are released
    AwaitTap,
    /// Output pressed once the hold term passes
    AwaitHold,
    /// Held too long for a tap-only combo
    Expired,
}

/// A fired combo whose keys are not all released yet.
#[derive(Clone, Debug)]
struct ActiveCombo {
    index: usize,
    held: u8,
    completed_at: Instant,
    phase: ActivePhase,
    events: Vec<KeyboardEvent, COMBO_MAX_LENGTH>,
}

/// Runtime combo state: the current chord attempt and the fired combos.
pub(crate) struct ComboResolver {
    policies: Vec<ComboPolicy, COMBO_MAX_NUM>,
    instances: [ComboInstance; COMBO_MAX_NUM],
    chord: Option<Chord>,
    active: Vec<ActiveCombo, COMBO_ACTIVE_MAX>,
    enabled: bool,
}

impl ComboResolver {
    pub(crate) fn new(policies: Vec<ComboPolicy, COMBO_MAX_NUM>) -> Self {
        Self {
            policies,
            instances: [ComboInstance::default(); COMBO_MAX_NUM],
            chord: None,
            active: Vec::new(),
            enabled: true,
        }
    }

    pub(crate) fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a chord attempt or a fired combo is still in progress.
    pub(crate) fn is_idle(&self) -> bool {
        self.chord.is_none() && self.active.is_empty()
    }

    /// Turn combo resolution on or off. A pending chord is resolved first.
    pub(crate) fn set_enabled(&mut self, config: &CombosConfig, enabled: bool, out: &mut Forwarded) {
        if !enabled {
            self.resolve_chord(config, out);
        }
        self.enabled = enabled;
    }

    /// Feed a physical key event. Whatever can be delivered now is appended to `out`, in order.
    pub(crate) fn process(
        &mut self,
        config: &CombosConfig,
        event: KeyboardEvent,
        top_layer: u8,
        is_held: impl Fn(KeyPos) -> bool,
        out: &mut Forwarded,
    ) {
        if event.pressed {
            self.process_press(config, event, top_layer, is_held, out);
        } else {
            self.process_release(config, event, out);
        }
    }

    fn process_press(
        &mut self,
        config: &CombosConfig,
        event: KeyboardEvent,
        top_layer: u8,
        is_held: impl Fn(KeyPos) -> bool,
        out: &mut Forwarded,
    ) {
        if self.chord.is_some() {
            let joins = config
                .combos
                .iter()
                .enumerate()
                .any(|(i, c)| self.instances[i].alive && c.position(event.pos).is_some());
            if joins {
                self.join_chord(config, event, out);
                return;
            }
            debug!("Key {:?} is not part of the pending chord", event.pos);
            self.resolve_chord(config, out);
        }

        if !self.enabled {
            forward(out, KeyInput::Key(event));
            return;
        }

        let mut eligible = false;
        for (i, combo) in config.combos.iter().enumerate() {
            self.instances[i] = ComboInstance::default();
            let Some(bit) = combo.position(event.pos) else {
                continue;
            };
            if !combo.is_eligible(top_layer) || combo.keys.iter().any(|k| *k != event.pos && is_held(*k)) {
                continue;
            }
            self.instances[i] = ComboInstance {
                pressed: 1 << bit,
                alive: true,
            };
            eligible = true;
        }

        if eligible {
            debug!("Chord started by {:?}", event.pos);
            let mut events = Vec::new();
            let _ = events.push(event);
            self.chord = Some(Chord {
                start: event.time,
                events,
                completed: None,
            });
        } else {
            forward(out, KeyInput::Key(event));
        }
    }

    fn join_chord(&mut self, config: &CombosConfig, event: KeyboardEvent, out: &mut Forwarded) {
        let Some(chord) = self.chord.as_mut() else {
            return;
        };
        if chord.events.push(event).is_err() {
            error!("Chord buffer full, dropping {:?}", event.pos);
            return;
        }
        // The key is not in the completed combo, so that one cannot fire any more
        chord.completed = None;

        let mut complete = None;
        let mut alive = 0;
        for (i, combo) in config.combos.iter().enumerate() {
            let instance = &mut self.instances[i];
            if !instance.alive {
                continue;
            }
            match combo.position(event.pos) {
                Some(bit) => {
                    instance.pressed |= 1 << bit;
                    alive += 1;
                    if instance.pressed == combo.full_mask() && complete.is_none() {
                        complete = Some(i);
                    }
                }
                None => instance.alive = false,
            }
        }

        if let Some(index) = complete {
            if alive > 1 {
                debug!("Combo {} completed, waiting for a larger combo", index);
                if let Some(chord) = self.chord.as_mut() {
                    chord.completed = Some(index);
                }
            } else {
                self.fire(config, index, event.time, out);
            }
        }
    }

    fn process_release(&mut self, config: &CombosConfig, event: KeyboardEvent, out: &mut Forwarded) {
        let in_chord = self
            .chord
            .as_ref()
            .is_some_and(|chord| chord.events.iter().any(|e| e.pos == event.pos));
        if in_chord {
            debug!("Chord key {:?} released before completion", event.pos);
            self.resolve_chord(config, out);
        }

        let found = self.active.iter().position(|a| {
            config.combos[a.index]
                .position(event.pos)
                .is_some_and(|bit| a.held & (1 << bit) != 0)
        });
        let Some(slot) = found else {
            forward(out, KeyInput::Key(event));
            return;
        };

        let active = &mut self.active[slot];
        let bit = config.combos[active.index].position(event.pos).unwrap_or(0);
        active.held &= !(1 << bit);
        let index = active.index as u8;
        let phase = active.phase;

        match phase {
            ActivePhase::Held { released: false } => {
                active.phase = ActivePhase::Held { released: true };
                forward(
                    out,
                    KeyInput::Combo {
                        index,
                        pressed: false,
                        time: event.time,
                    },
                );
            }
            ActivePhase::AwaitTap if active.held == 0 => {
                let hold_term = config.hold_term;
                if event.time.saturating_duration_since(active.completed_at) <= hold_term {
                    debug!("Tap-only combo {} released in time", index);
                    forward(
                        out,
                        KeyInput::Combo {
                            index,
                            pressed: true,
                            time: event.time,
                        },
                    );
                    forward(
                        out,
                        KeyInput::Combo {
                            index,
                            pressed: false,
                            time: event.time,
                        },
                    );
                } else {
                    debug!("Tap-only combo {} held too long", index);
                }
            }
            ActivePhase::AwaitHold => {
                debug!("Hold-only combo {} released early, replaying keys", index);
                let active = self.active.swap_remove(slot);
                for e in active.events {
                    forward(out, KeyInput::Key(e));
                }
                forward(out, KeyInput::Key(event));
                return;
            }
            _ => {}
        }

        if self.active[slot].held == 0 {
            self.active.swap_remove(slot);
        }
    }

    /// Earliest time at which `tick` changes something.
    pub(crate) fn next_deadline(&self, config: &CombosConfig) -> Option<Instant> {
        let chord = self.chord.as_ref().and_then(|chord| {
            self.instances
                .iter()
                .enumerate()
                .filter(|(i, instance)| instance.alive && Some(*i) != chord.completed)
                .map(|(i, _)| chord.start + self.policies.get(i).map(|p| p.timeout).unwrap_or(config.timeout))
                .min()
        });
        let active = self
            .active
            .iter()
            .filter(|a| matches!(a.phase, ActivePhase::AwaitTap | ActivePhase::AwaitHold))
            .map(|a| a.completed_at + config.hold_term)
            .min();
        // Terms are exclusive
        [chord, active]
            .into_iter()
            .flatten()
            .min()
            .map(|t| t + Duration::from_millis(1))
    }

    /// Re-check timeouts. Returns whether anything changed.
    pub(crate) fn tick(&mut self, config: &CombosConfig, now: Instant, out: &mut Forwarded) -> bool {
        let mut changed = false;

        if let Some((start, completed)) = self.chord.as_ref().map(|c| (c.start, c.completed)) {
            let mut waiting = false;
            for (i, instance) in self.instances.iter_mut().enumerate() {
                if !instance.alive || Some(i) == completed {
                    continue;
                }
                let timeout = self.policies.get(i).map(|p| p.timeout).unwrap_or(config.timeout);
                if now.saturating_duration_since(start) > timeout {
                    instance.alive = false;
                } else {
                    waiting = true;
                }
            }
            if !waiting {
                debug!("Combo term elapsed");
                self.resolve_chord(config, out);
                changed = true;
            }
        }

        for active in self.active.iter_mut() {
            if now.saturating_duration_since(active.completed_at) <= config.hold_term {
                continue;
            }
            match active.phase {
                ActivePhase::AwaitHold => {
                    debug!("Hold-only combo {} held long enough", active.index);
                    active.phase = ActivePhase::Held { released: false };
                    forward(
                        out,
                        KeyInput::Combo {
                            index: active.index as u8,
                            pressed: true,
                            time: now,
                        },
                    );
                    changed = true;
                }
                ActivePhase::AwaitTap => {
                    active.phase = ActivePhase::Expired;
                    changed = true;
                }
                _ => {}
            }
        }

        changed
    }

    /// Fire the completed combo of the pending chord, or replay its keys.
    fn resolve_chord(&mut self, config: &CombosConfig, out: &mut Forwarded) {
        let Some(chord) = self.chord.take() else {
            return;
        };
        self.instances = [ComboInstance::default(); COMBO_MAX_NUM];
        match chord.completed {
            Some(index) => {
                let time = chord.events.last().map(|e| e.time).unwrap_or(chord.start);
                self.chord = Some(chord);
                self.fire(config, index, time, out);
            }
            None => {
                for e in chord.events {
                    forward(out, KeyInput::Key(e));
                }
            }
        }
    }

    fn fire(&mut self, config: &CombosConfig, index: usize, time: Instant, out: &mut Forwarded) {
        let Some(chord) = self.chord.take() else {
            return;
        };
        self.instances = [ComboInstance::default(); COMBO_MAX_NUM];
        let Some(policy) = self.policies.get(index).copied() else {
            return;
        };

        let phase = if policy.must_tap {
            ActivePhase::AwaitTap
        } else if policy.must_hold {
            ActivePhase::AwaitHold
        } else {
            ActivePhase::Held { released: false }
        };
        debug!("Combo {} fired: {:?}", index, config.combos[index].output);

        let active = ActiveCombo {
            index,
            held: config.combos[index].full_mask(),
            completed_at: time,
            phase,
            events: chord.events.clone(),
        };
        if self.active.push(active).is_err() {
            error!("Too many active combos, replaying keys");
            for e in chord.events {
                forward(out, KeyInput::Key(e));
            }
            return;
        }

        if phase == (ActivePhase::Held { released: false }) {
            forward(
                out,
                KeyInput::Combo {
                    index: index as u8,
                    pressed: true,
                    time,
                },
            );
        }
    }
}

fn forward(out: &mut Forwarded, input: KeyInput) {
    if out.push(input).is_err() {
        error!("Combo forward buffer full, dropping {:?}", input);
    }
}
