// Synthetic pointer and keyboard injection.
use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use crate::errors::{GridPilotError, GridPilotResult};

/// Low-level injection surface used by the action executor.
///
/// Coordinates are absolute physical pixels. `scroll` takes wheel notches with
/// positive meaning up.
pub trait InputDriver {
    fn pointer_position(&mut self) -> GridPilotResult<(i32, i32)>;
    fn screen_size(&mut self) -> GridPilotResult<(i32, i32)>;
    fn move_to(&mut self, x: i32, y: i32) -> GridPilotResult<()>;
    fn click(&mut self, x: i32, y: i32) -> GridPilotResult<()>;
    fn type_text(&mut self, text: &str) -> GridPilotResult<()>;
    fn press_key(&mut self, key: &str) -> GridPilotResult<()>;
    fn scroll(&mut self, notches: i32) -> GridPilotResult<()>;
}

pub struct EnigoDriver {
    enigo: Enigo,
}

impl EnigoDriver {
    pub fn new() -> GridPilotResult<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| GridPilotError::Executor(format!("input backend init failed: {e:?}")))?;
        Ok(Self { enigo })
    }
}

fn injection_error(what: &str, e: impl std::fmt::Debug) -> GridPilotError {
    GridPilotError::Executor(format!("{what} failed: {e:?}"))
}

impl InputDriver for EnigoDriver {
    fn pointer_position(&mut self) -> GridPilotResult<(i32, i32)> {
        self.enigo.location().map_err(|e| injection_error("pointer query", e))
    }

    fn screen_size(&mut self) -> GridPilotResult<(i32, i32)> {
        self.enigo.main_display().map_err(|e| injection_error("display query", e))
    }

    fn move_to(&mut self, x: i32, y: i32) -> GridPilotResult<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| injection_error("mouse move", e))
    }

    fn click(&mut self, x: i32, y: i32) -> GridPilotResult<()> {
        self.move_to(x, y)?;
        self.enigo
            .button(Button::Left, Direction::Click)
            .map_err(|e| injection_error("click", e))
    }

    fn type_text(&mut self, text: &str) -> GridPilotResult<()> {
        self.enigo.text(text).map_err(|e| injection_error("type", e))
    }

    fn press_key(&mut self, key: &str) -> GridPilotResult<()> {
        let chord = parse_chord(key)?;
        let Some((last, modifiers)) = chord.split_last() else {
            return Err(GridPilotError::Validation("empty key".into()));
        };
        for m in modifiers {
            self.enigo
                .key(*m, Direction::Press)
                .map_err(|e| injection_error("key down", e))?;
        }
        let result = self
            .enigo
            .key(*last, Direction::Click)
            .map_err(|e| injection_error("key press", e));
        // Release modifiers even when the main key failed.
        for m in modifiers.iter().rev() {
            if let Err(e) = self.enigo.key(*m, Direction::Release) {
                tracing::warn!(error = ?e, "modifier release failed");
            }
        }
        result
    }

    fn scroll(&mut self, notches: i32) -> GridPilotResult<()> {
        // Positive vertical length scrolls down in the backend.
        self.enigo
            .scroll(-notches, Axis::Vertical)
            .map_err(|e| injection_error("scroll", e))
    }
}

/// Parse a single key or a `+`-joined chord such as `ctrl+shift+t`.
pub fn parse_chord(chord: &str) -> GridPilotResult<Vec<Key>> {
    let chord = chord.trim();
    if chord.is_empty() {
        return Err(GridPilotError::Validation("empty key".into()));
    }
    // A lone "+" is the plus key, not a separator.
    if chord == "+" {
        return Ok(vec![Key::Unicode('+')]);
    }
    chord.split('+').map(parse_key).collect()
}

pub fn parse_key(name: &str) -> GridPilotResult<Key> {
    let lower = name.trim().to_ascii_lowercase();
    let key = match lower.as_str() {
        "enter" | "return" => Key::Return,
        "escape" | "esc" => Key::Escape,
        "tab" => Key::Tab,
        "space" => Key::Space,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "ctrl" | "control" => Key::Control,
        "shift" => Key::Shift,
        "alt" | "option" => Key::Alt,
        "win" | "cmd" | "command" | "super" | "meta" => Key::Meta,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "pgup" => Key::PageUp,
        "pagedown" | "pgdn" => Key::PageDown,
        "capslock" => Key::CapsLock,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => {
                    return Err(GridPilotError::Validation(format!("unknown key '{name}'")));
                }
            }
        }
    };
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys_are_case_insensitive() {
        assert_eq!(parse_key("Enter").unwrap(), Key::Return);
        assert_eq!(parse_key("ESC").unwrap(), Key::Escape);
        assert_eq!(parse_key("PageDown").unwrap(), Key::PageDown);
    }

    #[test]
    fn single_characters_become_unicode_keys() {
        assert_eq!(parse_key("a").unwrap(), Key::Unicode('a'));
        assert_eq!(parse_key("L").unwrap(), Key::Unicode('l'));
        assert_eq!(parse_key("5").unwrap(), Key::Unicode('5'));
    }

    #[test]
    fn chords_split_on_plus() {
        assert_eq!(
            parse_chord("ctrl+l").unwrap(),
            vec![Key::Control, Key::Unicode('l')]
        );
        assert_eq!(
            parse_chord("Ctrl + Shift + T").unwrap(),
            vec![Key::Control, Key::Shift, Key::Unicode('t')]
        );
        assert_eq!(parse_chord("+").unwrap(), vec![Key::Unicode('+')]);
    }

    #[test]
    fn unknown_or_empty_keys_are_rejected() {
        assert!(parse_key("hyperdrive").is_err());
        assert!(parse_chord("").is_err());
        assert!(parse_chord("ctrl+").is_err());
    }
}
