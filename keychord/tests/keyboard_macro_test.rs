pub mod common;

use keychord::event::Output;
use keychord::keycode::KeyCode;

use crate::common::puq2::*;
use crate::common::*;

fn menu_output() -> Vec<Output> {
    vec![
        mods_on(GUI),
        mods_off(GUI),
        mods_on(GUI),
        mods_off(GUI),
        mods_on(SHIFT),
        down(KeyCode::F10),
        up(KeyCode::F10),
        mods_off(SHIFT),
    ]
}

#[test]
fn test_menu_macro_on_func_layer() {
    // LE held into FUNC, RP tapped
    let mut keyboard = create_puq_keyboard();
    let sequence = key_sequence![
        [3, 4, true, 0],
        [1, 9, true, 300],
        [1, 9, false, 20],
        [3, 4, false, 20],
    ];
    let mut expected = vec![Output::LayerOn(FUNC)];
    expected.extend(menu_output());
    expected.push(Output::LayerOff(FUNC));
    run_key_sequence_test(&mut keyboard, &sequence, &expected);
}

#[test]
fn test_menu_key_held_is_alt() {
    key_sequence_test! {
        keyboard: create_puq_keyboard(),
        sequence: [
            [3, 4, true, 0],
            [1, 9, true, 300],
            [1, 9, false, 300],
            [3, 4, false, 20],
        ],
        expected: [
            Output::LayerOn(FUNC),
            mods_on(ALT),
            mods_off(ALT),
            Output::LayerOff(FUNC),
        ]
    };
}

#[test]
fn test_menu_macro_keeps_held_modifiers() {
    // Ctrl from L2 stays down around the macro
    let mut keyboard = create_puq_keyboard();
    let sequence = key_sequence![
        [2, 2, true, 0],    // L2, ctrl
        [3, 4, true, 250],  // LE
        [1, 9, true, 250],  // RP
        [1, 9, false, 20],
        [3, 4, false, 20],
        [2, 2, false, 20],
    ];
    let mut expected = vec![mods_on(CTRL), Output::LayerOn(FUNC)];
    expected.extend(menu_output());
    expected.extend([Output::LayerOff(FUNC), mods_off(CTRL)]);
    run_key_sequence_test(&mut keyboard, &sequence, &expected);
}

#[test]
fn test_menu_macro_on_toggled_fct_layer() {
    // L4+L6 toggles FCT on the second layout
    let mut keyboard = create_puq2_keyboard();
    let sequence = key_sequence![
        [1, 1, true, 0],
        [1, 3, true, 10],
        [1, 1, false, 20],
        [1, 3, false, 10],
        [1, 9, true, 50],
        [1, 9, false, 30],
    ];
    let mut expected = vec![Output::LayerOn(FCT)];
    expected.extend(menu_output());
    run_key_sequence_test(&mut keyboard, &sequence, &expected);
    assert_eq!(keyboard.layer_activation(FCT), keychord::keymap::LayerActivation::Toggled);
}
