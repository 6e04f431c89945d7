use keychord_types::action::KeyAction;

use crate::event::KeyPos;
use crate::key_override::LayerMask;

/// How a layer is activated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LayerMode {
    /// Active while a controlling key is held
    Momentary,
    /// Active until the next key is sent
    OneShot,
}

/// Why a layer is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LayerActivation {
    Inactive,
    Momentary,
    Toggled,
    OneShotPending,
}

#[derive(Clone, Copy, Debug, Default)]
struct LayerSlot {
    // Number of keys holding the layer
    momentary: u8,
    toggled: bool,
    one_shot: bool,
}

impl LayerSlot {
    fn is_active(&self) -> bool {
        self.momentary > 0 || self.toggled || self.one_shot
    }
}

/// The layer stack: static bindings plus the activation state of every layer.
pub struct KeyMap<'a, const ROW: usize, const COL: usize, const NUM_LAYER: usize> {
    /// Layers, layer 0 is the base layer
    pub(crate) layers: &'a [[[KeyAction; COL]; ROW]; NUM_LAYER],
    slots: [LayerSlot; NUM_LAYER],
}

impl<'a, const ROW: usize, const COL: usize, const NUM_LAYER: usize> KeyMap<'a, ROW, COL, NUM_LAYER> {
    pub fn new(layers: &'a [[[KeyAction; COL]; ROW]; NUM_LAYER]) -> Self {
        Self {
            layers,
            slots: [LayerSlot::default(); NUM_LAYER],
        }
    }

    /// Binding of `pos` on exactly `layer`.
    pub fn action_at(&self, pos: KeyPos, layer: u8) -> KeyAction {
        self.layers
            .get(layer as usize)
            .and_then(|l| l.get(pos.row as usize))
            .and_then(|r| r.get(pos.col as usize))
            .copied()
            .unwrap_or(KeyAction::No)
    }

    /// Binding of `pos` under the active layers.
    pub fn resolve(&self, pos: KeyPos) -> KeyAction {
        self.resolve_with_layer(pos).0
    }

    /// Binding of `pos` under the active layers, with the layer it came from.
    ///
    /// Layers are searched from the highest index down, skipping transparent bindings.
    /// The base layer is always searched last.
    pub fn resolve_with_layer(&self, pos: KeyPos) -> (KeyAction, u8) {
        for layer in (1..NUM_LAYER).rev() {
            if !self.slots[layer].is_active() {
                continue;
            }
            let action = self.action_at(pos, layer as u8);
            if action != KeyAction::Transparent {
                return (action, layer as u8);
            }
        }
        (self.action_at(pos, 0), 0)
    }

    pub fn is_active(&self, layer: u8) -> bool {
        layer == 0 || self.slots.get(layer as usize).is_some_and(|s| s.is_active())
    }

    pub fn activation(&self, layer: u8) -> LayerActivation {
        match self.slots.get(layer as usize) {
            Some(s) if s.toggled => LayerActivation::Toggled,
            Some(s) if s.momentary > 0 => LayerActivation::Momentary,
            Some(s) if s.one_shot => LayerActivation::OneShotPending,
            _ => LayerActivation::Inactive,
        }
    }

    /// Active layers including the base layer.
    pub fn active_mask(&self) -> LayerMask {
        (1..NUM_LAYER.min(32))
            .filter(|l| self.slots[*l].is_active())
            .fold(1, |mask, l| mask | (1 << l))
    }

    /// Highest active layer.
    pub fn top_layer(&self) -> u8 {
        (1..NUM_LAYER)
            .rev()
            .find(|l| self.slots[*l].is_active())
            .unwrap_or(0) as u8
    }

    /// Activate `layer`. Returns whether the layer became active.
    pub fn activate(&mut self, layer: u8, mode: LayerMode) -> bool {
        self.update(layer, |slot| match mode {
            LayerMode::Momentary => slot.momentary = slot.momentary.saturating_add(1),
            LayerMode::OneShot => slot.one_shot = true,
        })
    }

    /// A key holding `layer` was released. Returns whether the layer became inactive.
    pub fn release_momentary(&mut self, layer: u8) -> bool {
        self.update(layer, |slot| slot.momentary = slot.momentary.saturating_sub(1))
    }

    /// Drop the one-shot activation of `layer`. Returns whether the layer became inactive.
    pub fn clear_one_shot(&mut self, layer: u8) -> bool {
        self.update(layer, |slot| slot.one_shot = false)
    }

    /// Flip the persistent activation of `layer`. Returns whether the layer changed state.
    pub fn toggle(&mut self, layer: u8) -> bool {
        self.update(layer, |slot| slot.toggled = !slot.toggled)
    }

    /// Deactivate `layer` whatever activated it. Returns whether the layer became inactive.
    pub fn deactivate(&mut self, layer: u8) -> bool {
        self.update(layer, |slot| *slot = LayerSlot::default())
    }

    fn update(&mut self, layer: u8, f: impl FnOnce(&mut LayerSlot)) -> bool {
        if layer == 0 {
            // Base layer is always active
            return false;
        }
        let Some(slot) = self.slots.get_mut(layer as usize) else {
            warn!("Layer {} is not defined", layer);
            return false;
        };
        let was_active = slot.is_active();
        f(slot);
        was_active != slot.is_active()
    }
}
