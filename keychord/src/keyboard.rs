use embassy_time::Instant;
use heapless::Deque;
use keychord_types::action::{Action, ComboControl, KeyAction};
use keychord_types::keycode::KeyCode;
use keychord_types::modifier::HidModifiers;

use crate::combo::{ComboPolicy, ComboResolver, Forwarded, KeyInput};
use crate::config::{BehaviorConfig, Hand, PositionalConfig};
use crate::emitter::{ActionEmitter, Owner, Registration, Registry, Stamped};
use crate::error::ConfigResult;
use crate::event::{KeyPos, KeyboardEvent, Output, OutputEvent};
use crate::key_override::{self, LayerMask, layer_bit};
use crate::keymap::{KeyMap, LayerActivation, LayerMode};
use crate::one_shot::OneShotState;
use crate::tap_dance::{TapDanceDecision, TapDanceKeyState};
use crate::tap_hold::{HoldTapDecision, HoldTapKeyState};
use crate::tap_toggle::{TapToggleKey, TapToggleTaps};

// Max number of inputs held back while a key is undecided
const HELD_BUFFER_SIZE: usize = 16;

/// The undecided tap-hold or tap dance key. There is at most one.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum PendingKey {
    HoldTap(HoldTapKeyState),
    TapDance(TapDanceKeyState),
}

impl PendingKey {
    fn pos(&self) -> KeyPos {
        match self {
            PendingKey::HoldTap(s) => s.pos,
            PendingKey::TapDance(s) => s.pos,
        }
    }

    fn deadline(&self) -> Option<Instant> {
        match self {
            PendingKey::HoldTap(s) => s.deadline(),
            PendingKey::TapDance(s) => Some(s.deadline()),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Decision {
    HoldTap(HoldTapKeyState, HoldTapDecision),
    TapDance(KeyPos, TapDanceDecision),
}

/// The scan loop context: owns the layer stack and the state of every resolver.
///
/// Events must be fed in the order the matrix reported them. Time only advances through
/// [`Keyboard::process`] and [`Keyboard::tick`]; call `tick` once per scan cycle so pending
/// terms expire without further key events.
pub struct Keyboard<'a, const ROW: usize, const COL: usize, const NUM_LAYER: usize> {
    pub(crate) keymap: KeyMap<'a, ROW, COL, NUM_LAYER>,
    pub(crate) behavior: BehaviorConfig,
    positional: PositionalConfig<ROW, COL>,
    combos: ComboResolver,

    /// The key waiting for a tap or hold decision
    pending: Option<PendingKey>,
    /// Layer the pending key was resolved from
    pending_layer: u8,
    /// Inputs that arrived while `pending` is undecided, in arrival order
    held_events: Deque<KeyInput, HELD_BUFFER_SIZE>,

    pub(crate) registry: Registry,

    /// One shot layer state
    pub(crate) osl_state: OneShotState<u8>,
    /// Time of the last one shot layer transition
    pub(crate) osl_since: Instant,

    pub(crate) tap_toggle_key: Option<TapToggleKey>,
    pub(crate) tap_toggle_taps: Option<TapToggleTaps>,

    /// Hand of the most recent press
    last_hand: Hand,

    /// Physical key state, used to drop out of order events
    pressed: [[bool; COL]; ROW],
    dropped_events: u32,

    now: Instant,
}

impl<'a, const ROW: usize, const COL: usize, const NUM_LAYER: usize> Keyboard<'a, ROW, COL, NUM_LAYER> {
    /// Check the configuration and create the engine.
    pub fn new(
        layers: &'a [[[KeyAction; COL]; ROW]; NUM_LAYER],
        behavior: BehaviorConfig,
        positional: PositionalConfig<ROW, COL>,
    ) -> ConfigResult<Self> {
        behavior.validate(layers)?;

        let keymap = KeyMap::new(layers);
        let policies = behavior
            .combo
            .combos
            .iter()
            .map(|combo| {
                let layer = combo.layer.unwrap_or(0);
                ComboPolicy::resolve(combo, &behavior.combo, |pos| match keymap.action_at(pos, layer) {
                    KeyAction::Transparent => keymap.action_at(pos, 0),
                    action => action,
                })
            })
            .collect();

        info!(
            "Keyboard started: {} layers, {} combos, {} tap dances, {} key overrides",
            NUM_LAYER,
            behavior.combo.combos.len(),
            behavior.tap_dance.tap_dances.len(),
            behavior.key_override.overrides.len()
        );

        Ok(Self {
            keymap,
            combos: ComboResolver::new(policies),
            behavior,
            positional,
            pending: None,
            pending_layer: 0,
            held_events: Deque::new(),
            registry: Registry::default(),
            osl_state: OneShotState::None,
            osl_since: Instant::from_ticks(0),
            tap_toggle_key: None,
            tap_toggle_taps: None,
            last_hand: Hand::Unknown,
            pressed: [[false; COL]; ROW],
            dropped_events: 0,
            now: Instant::from_ticks(0),
        })
    }

    /// Process one key event. Terms that expired before the event's time are resolved first.
    pub fn process(&mut self, event: KeyboardEvent, emitter: &mut impl ActionEmitter) {
        self.process_event(event, emitter);
    }

    /// Advance time without a key event.
    pub fn tick(&mut self, now: Instant, emitter: &mut impl ActionEmitter) {
        self.advance(now, emitter);
    }

    /// One scan cycle: every event collected since the last cycle, in order, then a tick.
    pub fn scan<I: IntoIterator<Item = KeyboardEvent>>(&mut self, now: Instant, events: I, emitter: &mut impl ActionEmitter) {
        for event in events {
            self.process_event(event, emitter);
        }
        self.advance(now, emitter);
    }

    /// Number of events dropped because they contradict the known key state.
    pub fn dropped_events(&self) -> u32 {
        self.dropped_events
    }

    /// Modifiers as last reported to the emitter.
    pub fn active_modifiers(&self) -> HidModifiers {
        self.registry.reported()
    }

    /// Active layers including the base layer.
    pub fn active_layer_mask(&self) -> LayerMask {
        self.keymap.active_mask()
    }

    pub fn layer_activation(&self, layer: u8) -> LayerActivation {
        self.keymap.activation(layer)
    }

    pub fn keymap(&self) -> &KeyMap<'a, ROW, COL, NUM_LAYER> {
        &self.keymap
    }

    pub fn combos_enabled(&self) -> bool {
        self.combos.enabled()
    }

    /// Whether no decision is pending and no output is held.
    pub fn is_idle(&self) -> bool {
        self.pending.is_none() && self.held_events.is_empty() && self.combos.is_idle() && self.registry.is_empty()
    }

    fn process_event(&mut self, event: KeyboardEvent, emitter: &mut dyn ActionEmitter) {
        self.advance(event.time, emitter);

        let (row, col) = (event.pos.row as usize, event.pos.col as usize);
        if row >= ROW || col >= COL {
            warn!("Key {:?} is outside of the matrix, dropping", event.pos);
            self.dropped_events = self.dropped_events.saturating_add(1);
            return;
        }
        if self.pressed[row][col] == event.pressed {
            warn!(
                "Key {:?} is already in state pressed: {}, dropping",
                event.pos, event.pressed
            );
            self.dropped_events = self.dropped_events.saturating_add(1);
            return;
        }
        self.pressed[row][col] = event.pressed;

        let mut emitter = Stamped::new(emitter, self.now);
        let top_layer = self.keymap.top_layer();
        let pressed = &self.pressed;
        let mut forwarded = Forwarded::new();
        self.combos.process(
            &self.behavior.combo,
            event,
            top_layer,
            |pos| is_pressed(pressed, pos),
            &mut forwarded,
        );
        self.forward(forwarded, &mut emitter);
    }

    fn forward(&mut self, forwarded: Forwarded, emitter: &mut dyn ActionEmitter) {
        for input in forwarded {
            self.key_stage(input, emitter);
        }
    }

    /// Run all expired terms in time order, then settle at `now`.
    fn advance(&mut self, now: Instant, emitter: &mut dyn ActionEmitter) {
        let mut last: Option<Instant> = None;
        while let Some(deadline) = self.next_deadline() {
            if deadline > now || last == Some(deadline) {
                break;
            }
            // Never go back in time, even if a replayed key has an earlier deadline
            let at = last.map_or(deadline, |l| l.max(deadline));
            last = Some(at);
            self.run_timers(at, emitter);
        }
        self.run_timers(now, emitter);
    }

    fn next_deadline(&self) -> Option<Instant> {
        let pending = self.pending.and_then(|p| p.deadline());
        [self.combos.next_deadline(&self.behavior.combo), pending, self.osl_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    fn run_timers(&mut self, now: Instant, emitter: &mut dyn ActionEmitter) {
        self.now = self.now.max(now);
        let mut emitter = Stamped::new(emitter, self.now);
        let mut forwarded = Forwarded::new();
        self.combos.tick(&self.behavior.combo, now, &mut forwarded);
        self.forward(forwarded, &mut emitter);
        self.tick_pending(now, &mut emitter);
        self.tick_osl(now, &mut emitter);
    }

    fn tick_pending(&mut self, now: Instant, emitter: &mut dyn ActionEmitter) {
        let decision = match self.pending.as_mut() {
            Some(PendingKey::HoldTap(state)) => state.on_timeout(now).map(|d| Decision::HoldTap(*state, d)),
            Some(PendingKey::TapDance(state)) => {
                let pos = state.pos;
                match self.behavior.tap_dance.tap_dances.get(state.index as usize) {
                    Some(dance) => state.on_timeout(dance, now).map(|d| Decision::TapDance(pos, d)),
                    None => None,
                }
            }
            None => None,
        };
        if let Some(decision) = decision {
            self.decide(decision, now, emitter);
        }
    }

    /// Input after the combo stage: either handled now or held back behind the pending key.
    fn key_stage(&mut self, input: KeyInput, emitter: &mut dyn ActionEmitter) {
        if input.pressed() {
            // Must be current before the pending key is asked to decide
            self.last_hand = match input {
                KeyInput::Key(event) => self.positional.hand(event.pos),
                KeyInput::Combo { .. } => Hand::Unknown,
            };
            self.interrupt_tap_toggle(input.owner());
        }

        let Some(pending) = self.pending else {
            self.process_input(input, emitter);
            return;
        };

        if let KeyInput::Key(event) = input {
            if event.pos == pending.pos() {
                self.process_pending_key(event, emitter);
                return;
            }
        }

        if input.pressed() {
            let decision = self.interrupt_pending();
            self.hold_back(input);
            if let Some(decision) = decision {
                self.decide(decision, input.time(), emitter);
            }
        } else if self.held_events.iter().any(|held| held.owner() == input.owner()) {
            self.hold_back(input);
        } else {
            // Pressed before the pending key, nothing to wait for
            self.process_input(input, emitter);
        }
    }

    fn hold_back(&mut self, input: KeyInput) {
        if self.held_events.push_back(input).is_err() {
            error!("Held event buffer full, dropping {:?}", input);
        }
    }

    /// Another key was pressed while a key is pending.
    fn interrupt_pending(&mut self) -> Option<Decision> {
        match self.pending.as_mut()? {
            PendingKey::HoldTap(state) => state
                .on_other_press(self.last_hand)
                .map(|d| Decision::HoldTap(*state, d)),
            PendingKey::TapDance(state) => {
                let dance = self.behavior.tap_dance.tap_dances.get(state.index as usize)?;
                Some(Decision::TapDance(state.pos, state.on_interrupt(dance)))
            }
        }
    }

    /// The pending key itself changed state.
    fn process_pending_key(&mut self, event: KeyboardEvent, emitter: &mut dyn ActionEmitter) {
        let decision = match self.pending.as_mut() {
            Some(PendingKey::HoldTap(state)) if !event.pressed => {
                state.on_release(event.time).map(|d| Decision::HoldTap(*state, d))
            }
            Some(PendingKey::TapDance(state)) => {
                let pos = state.pos;
                match self.behavior.tap_dance.tap_dances.get(state.index as usize) {
                    Some(_) if event.pressed => {
                        state.on_press(event.time);
                        None
                    }
                    Some(dance) => state.on_release(dance, event.time).map(|d| Decision::TapDance(pos, d)),
                    None => None,
                }
            }
            _ => None,
        };
        if let Some(decision) = decision {
            self.decide(decision, event.time, emitter);
        }
    }

    /// Apply a decision of the pending key, then replay what was held back.
    fn decide(&mut self, decision: Decision, time: Instant, emitter: &mut dyn ActionEmitter) {
        self.pending = None;
        let layer = self.pending_layer;
        match decision {
            Decision::HoldTap(state, decision) => {
                let owner = Owner::Key(state.pos);
                debug!("Tap-hold key {:?} decided: {:?}", state.pos, decision);
                match decision {
                    HoldTapDecision::Hold => self.press_action(owner, state.hold_action(), layer, time, emitter),
                    HoldTapDecision::Tap => self.press_action(owner, state.tap_action(), layer, time, emitter),
                    HoldTapDecision::TapReleased => {
                        self.press_action(owner, state.tap_action(), layer, time, emitter);
                        self.release(owner, time, emitter);
                    }
                    HoldTapDecision::HoldReleased => {
                        self.press_action(owner, state.hold_action(), layer, time, emitter);
                        self.release(owner, time, emitter);
                    }
                }
            }
            Decision::TapDance(pos, decision) => {
                let owner = Owner::Key(pos);
                debug!("Tap dance key {:?} decided: {:?}", pos, decision);
                match decision {
                    TapDanceDecision::Hold(action) => self.press_action(owner, action, layer, time, emitter),
                    TapDanceDecision::Tap(action) => {
                        self.press_action(owner, action, layer, time, emitter);
                        self.release(owner, time, emitter);
                    }
                }
            }
        }
        self.release_held(emitter);
    }

    /// Feed held back inputs through the key stage again, in order.
    fn release_held(&mut self, emitter: &mut dyn ActionEmitter) {
        let mut queued = core::mem::replace(&mut self.held_events, Deque::new());
        while let Some(input) = queued.pop_front() {
            self.key_stage(input, emitter);
        }
    }

    fn process_input(&mut self, input: KeyInput, emitter: &mut dyn ActionEmitter) {
        let time = input.time();
        let owner = input.owner();
        if !input.pressed() {
            self.release(owner, time, emitter);
            return;
        }
        match input {
            KeyInput::Combo { index, .. } => {
                // Layer restricted combos act on their layer, the others on the top layer
                let (action, layer) = match self.behavior.combo.combos.get(index as usize) {
                    Some(combo) => (combo.output(), combo.layer.unwrap_or(self.keymap.top_layer())),
                    None => (Action::No, 0),
                };
                self.press_action(owner, action, layer, time, emitter);
            }
            KeyInput::Key(event) => self.process_key_press(event, emitter),
        }
    }

    fn process_key_press(&mut self, event: KeyboardEvent, emitter: &mut dyn ActionEmitter) {
        let (action, layer) = self.keymap.resolve_with_layer(event.pos);
        debug!("Key {:?} on layer {}: {:?}", event.pos, layer, action);
        let owner = Owner::Key(event.pos);

        match action {
            KeyAction::No | KeyAction::Transparent => {}
            KeyAction::Single(a) => self.press_action(owner, a, layer, event.time, emitter),
            KeyAction::ModTap(..) | KeyAction::LayerTap(..) => {
                if let Some((tap, hold, profile)) = action.tap_hold() {
                    let hand = self.positional.hand(event.pos);
                    self.pending_layer = layer;
                    self.pending = Some(PendingKey::HoldTap(HoldTapKeyState::new(
                        event.pos,
                        tap,
                        hold,
                        profile,
                        &self.behavior.tap_hold,
                        hand,
                        event.time,
                    )));
                }
            }
            KeyAction::TapDance(index) => match self.behavior.tap_dance.tap_dances.get(index as usize) {
                Some(dance) => {
                    let term = dance.term.unwrap_or(self.behavior.tap_hold.tapping_term);
                    self.pending_layer = layer;
                    self.pending = Some(PendingKey::TapDance(TapDanceKeyState::new(
                        event.pos, index, term, event.time,
                    )));
                }
                None => warn!("Tap dance {} is not defined", index),
            },
            KeyAction::ComboControl(control) => {
                let enabled = match control {
                    ComboControl::On => true,
                    ComboControl::Off => false,
                    ComboControl::Toggle => !self.combos.enabled(),
                };
                info!("Combos enabled: {}", enabled);
                let mut forwarded = Forwarded::new();
                self.combos.set_enabled(&self.behavior.combo, enabled, &mut forwarded);
                self.forward(forwarded, emitter);
            }
        }
    }

    /// Start the output of `action`, owned by `owner` until it is released.
    /// `from_layer` is the layer the action was bound on.
    fn press_action(
        &mut self,
        owner: Owner,
        action: Action,
        from_layer: u8,
        time: Instant,
        emitter: &mut dyn ActionEmitter,
    ) {
        if self.registry.contains(owner) {
            warn!("{:?} pressed twice, releasing the first press", owner);
            self.release(owner, time, emitter);
        }

        match action {
            Action::No => {}
            Action::Key(key) if key.is_modifier() => {
                self.press_modifiers(owner, key.to_hid_modifiers(), time, emitter)
            }
            Action::Key(key) => self.press_key(owner, key, HidModifiers::new(), from_layer, time, emitter),
            Action::KeyWithModifier(key, modifiers) => {
                self.press_key(owner, key, modifiers.to_hid_modifiers(), from_layer, time, emitter)
            }
            Action::Modifier(modifiers) => self.press_modifiers(owner, modifiers.to_hid_modifiers(), time, emitter),
            Action::LayerOn(layer) => {
                let registration = Registration {
                    layer: Some(layer),
                    ..Registration::new(owner)
                };
                if self.registry.insert(registration) && self.keymap.activate(layer, LayerMode::Momentary) {
                    send(emitter, Output::LayerOn(layer), time);
                }
            }
            Action::LayerOff(layer) => self.deactivate_layer(layer, time, emitter),
            Action::LayerToggle(layer) => {
                if self.keymap.toggle(layer) {
                    let kind = if self.keymap.is_active(layer) {
                        Output::LayerOn(layer)
                    } else {
                        Output::LayerOff(layer)
                    };
                    send(emitter, kind, time);
                }
            }
            Action::OneShotLayer(layer) => self.process_action_osl(owner, layer, time, emitter),
            Action::LayerTapToggle(layer) => self.press_tap_toggle(owner, layer, time, emitter),
            Action::TriggerMacro(index) => self.run_macro(owner, index, time, emitter),
        }
    }

    fn press_modifiers(&mut self, owner: Owner, modifiers: HidModifiers, time: Instant, emitter: &mut dyn ActionEmitter) {
        let registration = Registration {
            held_mods: modifiers,
            ..Registration::new(owner)
        };
        if self.registry.insert(registration) {
            self.registry.sync_modifiers(time, emitter);
        }
    }

    /// Send `key` with `modifiers` attached, after applying key overrides.
    ///
    /// Overrides see the modifiers held by other keys, not the ones attached to `key`,
    /// and only match on the layer the key was bound on.
    fn press_key(
        &mut self,
        owner: Owner,
        key: KeyCode,
        modifiers: HidModifiers,
        from_layer: u8,
        time: Instant,
        emitter: &mut dyn ActionEmitter,
    ) {
        let held = self.registry.held_modifiers();
        let mut registration = Registration {
            key: Some(key),
            key_mods: modifiers,
            ..Registration::new(owner)
        };

        let overrides = &self.behavior.key_override.overrides;
        if let Some(o) = key_override::find(overrides, key, held, layer_bit(from_layer)) {
            debug!("Key override {:?} -> {:?}", key, o.replacement());
            match o.replacement() {
                Action::Key(k) => {
                    registration.key = Some(k);
                    registration.key_mods = HidModifiers::new();
                }
                Action::KeyWithModifier(k, m) => {
                    registration.key = Some(k);
                    registration.key_mods = m.to_hid_modifiers();
                }
                _ => {}
            }
            registration.suppress = o.suppressed_bits(held);
        }

        let sent = registration.key.unwrap_or(key);
        if !self.registry.insert(registration) {
            return;
        }
        self.registry.sync_modifiers(time, emitter);
        send(emitter, Output::KeyDown(sent), time);
        if !sent.is_modifier() {
            self.update_osl(time, emitter);
        }
    }

    /// Undo everything `owner` registered.
    fn release(&mut self, owner: Owner, time: Instant, emitter: &mut dyn ActionEmitter) {
        let Some(registration) = self.registry.remove(owner) else {
            return;
        };
        if let Some(key) = registration.key {
            send(emitter, Output::KeyUp(key), time);
        }
        self.registry.sync_modifiers(time, emitter);
        self.release_tap_toggle(owner, time, emitter);
        if let Some(layer) = registration.layer {
            if self.keymap.release_momentary(layer) {
                send(emitter, Output::LayerOff(layer), time);
            }
        }
        if let Some(layer) = registration.one_shot {
            self.release_osl(layer, time, emitter);
        }
    }

    fn deactivate_layer(&mut self, layer: u8, time: Instant, emitter: &mut dyn ActionEmitter) {
        if self.osl_state.value() == Some(&layer) {
            self.osl_state = OneShotState::None;
        }
        if self.keymap.deactivate(layer) {
            send(emitter, Output::LayerOff(layer), time);
        }
    }
}

pub(crate) fn send(emitter: &mut dyn ActionEmitter, kind: Output, time: Instant) {
    debug!("Output {:?}", kind);
    emitter.emit(OutputEvent { kind, time });
}

fn is_pressed<const ROW: usize, const COL: usize>(pressed: &[[bool; COL]; ROW], pos: KeyPos) -> bool {
    pressed
        .get(pos.row as usize)
        .and_then(|r| r.get(pos.col as usize))
        .copied()
        .unwrap_or(false)
}
