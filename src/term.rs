use std::time::Duration;

use crossterm::{
    event::{self, Event},
    terminal,
};

/// Must only be called if terminal is NOT in raw mode.
fn enable_raw_mode() {
    debug_assert!(
        !terminal::is_raw_mode_enabled().is_ok_and(|is| is),
        "terminal should not be in raw mode to enable raw mode",
    );
    terminal::enable_raw_mode().expect("failed to enable raw terminal");
}

/// Must only be called if terminal is in raw mode.
fn disable_raw_mode() {
    debug_assert!(
        terminal::is_raw_mode_enabled().is_ok_and(|is| is),
        "terminal should already be in raw mode to disable raw mode",
    );
    terminal::disable_raw_mode().expect("failed to disable raw terminal");
}

/// Check for a key byte without blocking.
///
/// Ready events are consumed until one carries a byte; non-key events are
/// discarded. Returns `None` if no byte is ready.
pub fn poll_byte() -> Option<u8> {
    enable_raw_mode();
    let mut byte = None;
    while event::poll(Duration::ZERO).expect("failed to poll terminal") {
        let event = event::read().expect("failed to read terminal event");
        if let Some(ready) = key_byte(event) {
            byte = Some(ready);
            break;
        }
    }
    disable_raw_mode();
    byte
}

/// Read the next key byte from the interactive terminal.
///
/// Events are consumed until a key event carries a byte.
///
/// `Ctrl+C` will always return the terminal to normal state and exit.
pub fn read_byte() -> u8 {
    enable_raw_mode();
    let byte = loop {
        let event = event::read().expect("failed to read terminal event");
        if let Some(byte) = key_byte(event) {
            break byte;
        }
    };
    disable_raw_mode();
    byte
}

fn key_byte(event: Event) -> Option<u8> {
    use event::{KeyCode, KeyEventKind, KeyModifiers as Mod};

    let Event::Key(event) = event else { return None };
    if matches!(event.kind, KeyEventKind::Release) {
        return None;
    }

    match (event.modifiers, event.code) {
        // Ctrl+C
        (Mod::CONTROL, KeyCode::Char('c')) => {
            disable_raw_mode(); // Generic cleanup
            println!();
            std::process::exit(0);
        }

        (_, KeyCode::Enter) | (_, KeyCode::Char('\n')) => Some(b'\n'),
        (_, KeyCode::Backspace) => Some(0x08),

        // Normal character
        (Mod::NONE | Mod::SHIFT, KeyCode::Char(ch)) if ch.is_ascii() => Some(ch as u8),

        _ => None,
    }
}
