//! Live keyboard toggles.
//!
//! | key        | effect                         |
//! |------------|--------------------------------|
//! | `q`, `Esc` | quit (LEDs are cleared)        |
//! | `l`        | swap rows_snake / cols_snake   |
//! | `o`        | flip origin top/bottom         |
//! | `f`        | mirror the camera horizontally |
//! | `g`        | grid lines in the preview      |
//! | `t`        | camera / test pattern          |
//! | `p`        | FPS readout in the preview     |
//!
//! Keys are polled once per frame and never block.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io::{self, Write};
use std::time::Duration;

/// A runtime change to the view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    Wiring,
    Origin,
    Mirror,
    GridOverlay,
    Source,
    FpsReadout,
}

/// What one key press asks the pipeline to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    Toggle(Toggle),
}

/// Map a key press to a command. Unbound keys map to `None`.
pub fn key_command(key: &KeyEvent) -> Option<Command> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    // Raw mode swallows SIGINT, so Ctrl+C arrives here as a key.
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c')).then_some(Command::Quit);
    }
    let command = match key.code {
        KeyCode::Esc | KeyCode::Char('q') => Command::Quit,
        KeyCode::Char('l') => Command::Toggle(Toggle::Wiring),
        KeyCode::Char('o') => Command::Toggle(Toggle::Origin),
        KeyCode::Char('f') => Command::Toggle(Toggle::Mirror),
        KeyCode::Char('g') => Command::Toggle(Toggle::GridOverlay),
        KeyCode::Char('t') => Command::Toggle(Toggle::Source),
        KeyCode::Char('p') => Command::Toggle(Toggle::FpsReadout),
        _ => return None,
    };
    Some(command)
}

/// Non-blocking source of key commands.
pub trait KeySource {
    /// Return the next pending command, if any, without waiting.
    fn poll(&mut self) -> Option<Command>;
}

/// Headless runs: no keys ever.
pub struct NoKeys;

impl KeySource for NoKeys {
    fn poll(&mut self) -> Option<Command> {
        None
    }
}

/// Keys from the controlling terminal, read in raw mode.
///
/// Raw mode is restored when this is dropped.
pub struct TerminalKeys {
    active: bool,
}

impl TerminalKeys {
    pub fn new() -> std::io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self { active: true })
    }

    fn next_command(&mut self) -> std::io::Result<Option<Command>> {
        // Drain everything queued this frame, stopping at the first bound key.
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if let Some(command) = key_command(&key) {
                    return Ok(Some(command));
                }
            }
        }
        Ok(None)
    }
}

impl KeySource for TerminalKeys {
    fn poll(&mut self) -> Option<Command> {
        if !self.active {
            return None;
        }
        match self.next_command() {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!("Keyboard polling failed, disabling keys: {}", e);
                self.active = false;
                None
            }
        }
    }
}

impl Drop for TerminalKeys {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!("Failed to restore terminal: {}", e);
        }
    }
}

/// Log sink for a terminal in raw mode.
///
/// Raw mode turns off the `\n` to `\r\n` translation, so every line break
/// is written as `\r\n` to keep lines starting at column 0.
pub struct RawModeWriter<W>(pub W);

impl<W: Write> Write for RawModeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut lines = buf.split(|&byte| byte == b'\n');
        if let Some(first) = lines.next() {
            self.0.write_all(first)?;
        }
        for line in lines {
            self.0.write_all(b"\r\n")?;
            self.0.write_all(line)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[rstest]
    #[case(KeyCode::Esc, Command::Quit)]
    #[case(KeyCode::Char('q'), Command::Quit)]
    #[case(KeyCode::Char('l'), Command::Toggle(Toggle::Wiring))]
    #[case(KeyCode::Char('o'), Command::Toggle(Toggle::Origin))]
    #[case(KeyCode::Char('f'), Command::Toggle(Toggle::Mirror))]
    #[case(KeyCode::Char('g'), Command::Toggle(Toggle::GridOverlay))]
    #[case(KeyCode::Char('t'), Command::Toggle(Toggle::Source))]
    #[case(KeyCode::Char('p'), Command::Toggle(Toggle::FpsReadout))]
    fn bound_keys(#[case] code: KeyCode, #[case] expected: Command) {
        assert_eq!(key_command(&press(code)), Some(expected));
    }

    #[test]
    fn unbound_key_is_ignored() {
        assert_eq!(key_command(&press(KeyCode::Char('x'))), None);
    }

    #[test]
    fn ctrl_c_quits() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(key_command(&key), Some(Command::Quit));
    }

    #[test]
    fn ctrl_with_other_key_is_ignored() {
        let key = KeyEvent::new(KeyCode::Char('l'), KeyModifiers::CONTROL);
        assert_eq!(key_command(&key), None);
    }

    #[test]
    fn key_release_is_ignored() {
        let key = KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(key_command(&key), None);
    }

    #[test]
    fn no_keys_never_fires() {
        assert_eq!(NoKeys.poll(), None);
    }

    #[rstest]
    #[case(b"plain", b"plain")]
    #[case(b"one line\n", b"one line\r\n")]
    #[case(b"a\nb\n", b"a\r\nb\r\n")]
    #[case(b"\n\n", b"\r\n\r\n")]
    fn raw_mode_writer_adds_carriage_returns(#[case] input: &[u8], #[case] expected: &[u8]) {
        let mut writer = RawModeWriter(Vec::new());
        assert_eq!(writer.write(input).unwrap(), input.len());
        assert_eq!(writer.0, expected);
    }

    #[test]
    fn log_lines_through_raw_mode_writer_start_at_column_zero() {
        let mut writer = RawModeWriter(Vec::new());
        writeln!(writer, "INFO Panel: 42x40").unwrap();
        writeln!(writer, "INFO Writing preview").unwrap();
        let text = String::from_utf8(writer.0).unwrap();
        assert_eq!(text, "INFO Panel: 42x40\r\nINFO Writing preview\r\n");
    }
}
