/// Create a layer in keymap
#[macro_export]
macro_rules! layer {
    ([$([$($x: expr), +]), +]) => {
        [$([$($x), +]),+]
    };
}

/// Create a normal key. For example, `k!(A)` represents `KeyAction::Single(Action::Key(KeyCode::A))`
#[macro_export]
macro_rules! k {
    ($k: ident) => {
        $crate::action::KeyAction::Single($crate::action::Action::Key($crate::keycode::KeyCode::$k))
    };
}

/// Create a key sent together with modifiers, e.g. `wm!(Kc4, ModifierCombination::LSHIFT)` for `$`
#[macro_export]
macro_rules! wm {
    ($x: ident, $m: expr) => {
        $crate::action::KeyAction::Single($crate::action::Action::KeyWithModifier(
            $crate::keycode::KeyCode::$x,
            $m,
        ))
    };
}

/// Create a normal action: `KeyAction`
#[macro_export]
macro_rules! a {
    ($a: ident) => {
        $crate::action::KeyAction::$a
    };
}

/// Create a layer activate action. For example, `mo!(1)` activates layer 1.
#[macro_export]
macro_rules! mo {
    ($x: literal) => {
        $crate::action::KeyAction::Single($crate::action::Action::LayerOn($x))
    };
}

/// Create a layer toggle action
#[macro_export]
macro_rules! tg {
    ($x: literal) => {
        $crate::action::KeyAction::Single($crate::action::Action::LayerToggle($x))
    };
}

/// Create a layer tap toggle action: momentary while held, toggled when tapped
#[macro_export]
macro_rules! tt {
    ($x: literal) => {
        $crate::action::KeyAction::Single($crate::action::Action::LayerTapToggle($x))
    };
}

/// Create a one shot layer action
#[macro_export]
macro_rules! osl {
    ($x: literal) => {
        $crate::action::KeyAction::Single($crate::action::Action::OneShotLayer($x))
    };
}

/// Create a layer activate action or tap key(tap/hold)
#[macro_export]
macro_rules! lt {
    ($x: literal, $k: ident) => {
        $crate::action::KeyAction::LayerTap(
            $crate::action::Action::Key($crate::keycode::KeyCode::$k),
            $x,
            $crate::action::TapHoldProfile::const_default(),
        )
    };
    ($x: literal, $k: ident, $p: expr) => {
        $crate::action::KeyAction::LayerTap($crate::action::Action::Key($crate::keycode::KeyCode::$k), $x, $p)
    };
}

/// Create a modifier-tap-hold action
#[macro_export]
macro_rules! mt {
    ($k: ident, $m: expr) => {
        $crate::action::KeyAction::ModTap(
            $crate::action::Action::Key($crate::keycode::KeyCode::$k),
            $m,
            $crate::action::TapHoldProfile::const_default(),
        )
    };
    ($k: ident, $m: expr, $p: expr) => {
        $crate::action::KeyAction::ModTap($crate::action::Action::Key($crate::keycode::KeyCode::$k), $m, $p)
    };
}

/// Create a tap dance action, the index refers to `TapDancesConfig::tap_dances`
#[macro_export]
macro_rules! td {
    ($x: literal) => {
        $crate::action::KeyAction::TapDance($x)
    };
}
