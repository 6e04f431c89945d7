extern crate keychord;

/// Run a key sequence against a keyboard and compare the whole output stream.
///
/// Each step is `[row, col, pressed, delay]`, the delay in milliseconds is counted from the previous step.
#[macro_export]
macro_rules! key_sequence_test {
    (keyboard: $keyboard:expr, sequence: [$([$row:expr, $col:expr, $pressed:expr, $delay:expr]),* $(,)?], expected: [$($output:expr),* $(,)?]) => {{
        let mut keyboard = $keyboard;
        let sequence = $crate::key_sequence![$([$row, $col, $pressed, $delay]),*];
        let expected: Vec<keychord::event::Output> = vec![$($output),*];
        $crate::common::run_key_sequence_test(&mut keyboard, &sequence, &expected);
    }};
}

// a rust macro to create a key sequence to simulate key presses
#[macro_export]
macro_rules! key_sequence {
    ($([$row:expr, $col:expr, $pressed:expr, $delay:expr]),* $(,)?) => {
        vec![
            $(
                $crate::common::TestKeyPress {
                    row: $row,
                    col: $col,
                    pressed: $pressed,
                    delay: $delay,
                },
            )*
        ]
    };
}
