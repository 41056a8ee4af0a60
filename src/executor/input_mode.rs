/// Input-mode state machine.
///
/// Tracks whether a text field is believed focused. Only a click enters input
/// mode; focus-breaking keys and any execution error leave it. Typing is
/// refused outside input mode, and otherwise always re-clicks the focus point
/// first, since the confirmation prompt may have taken focus in between.
use std::time::{Duration, Instant};

/// Keys that move focus away from the current text field.
const FOCUS_BREAKING_KEYS: &[&str] = &["enter", "return", "escape", "esc", "tab"];

pub fn is_focus_breaking(key: &str) -> bool {
    let key = key.trim().to_ascii_lowercase();
    FOCUS_BREAKING_KEYS.contains(&key.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Inactive,
    Active {
        focus_x: i32,
        focus_y: i32,
        focus_time: Instant,
    },
}

/// What a `type` request is allowed to do in the current mode. Both
/// accepting variants carry the field to click before typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeGate {
    /// No focused field: drop the text.
    Rejected,
    /// Focus went stale.
    Refocus { x: i32, y: i32 },
    Direct { x: i32, y: i32 },
}

impl InputMode {
    pub fn is_active(&self) -> bool {
        matches!(self, InputMode::Active { .. })
    }

    pub fn on_click(&mut self, x: i32, y: i32, now: Instant) {
        *self = InputMode::Active {
            focus_x: x,
            focus_y: y,
            focus_time: now,
        };
    }

    pub fn on_press(&mut self, key: &str) {
        if !is_focus_breaking(key) {
            return;
        }
        if self.is_active() {
            tracing::debug!(key, "focus-breaking key, leaving input mode");
        }
        *self = InputMode::Inactive;
    }

    pub fn reset(&mut self) {
        *self = InputMode::Inactive;
    }

    pub fn gate_type(&self, now: Instant, stale_after: Duration) -> TypeGate {
        match *self {
            InputMode::Inactive => TypeGate::Rejected,
            InputMode::Active {
                focus_x,
                focus_y,
                focus_time,
            } => {
                if now.saturating_duration_since(focus_time) > stale_after {
                    TypeGate::Refocus {
                        x: focus_x,
                        y: focus_y,
                    }
                } else {
                    TypeGate::Direct {
                        x: focus_x,
                        y: focus_y,
                    }
                }
            }
        }
    }

    /// Human-readable state for the decision prompt.
    pub fn describe(&self, now: Instant) -> String {
        match *self {
            InputMode::Inactive => {
                "NOT in input mode. Click a text field before typing.".to_string()
            }
            InputMode::Active {
                focus_x,
                focus_y,
                focus_time,
            } => format!(
                "In input mode.\n- Focused field at: ({focus_x}, {focus_y})\n- Last clicked: {:.1}s ago",
                now.saturating_duration_since(focus_time).as_secs_f64()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STALE: Duration = Duration::from_secs(5);

    fn ago(secs: u64) -> Instant {
        Instant::now()
            .checked_sub(Duration::from_secs(secs))
            .expect("monotonic clock too close to boot")
    }

    #[test]
    fn starts_inactive() {
        assert_eq!(InputMode::default(), InputMode::Inactive);
        assert!(!InputMode::default().is_active());
    }

    #[test]
    fn type_rejected_while_inactive_for_any_text() {
        let mode = InputMode::Inactive;
        for _text in ["", "hello", "https://example.com", "多语言 ✓"] {
            assert_eq!(mode.gate_type(Instant::now(), STALE), TypeGate::Rejected);
        }
    }

    #[test]
    fn click_activates_from_any_state() {
        let mut mode = InputMode::Inactive;
        let now = Instant::now();
        mode.on_click(10, 20, now);
        assert_eq!(
            mode,
            InputMode::Active {
                focus_x: 10,
                focus_y: 20,
                focus_time: now
            }
        );
        mode.on_click(30, 40, now);
        assert!(matches!(mode, InputMode::Active { focus_x: 30, focus_y: 40, .. }));
    }

    #[test]
    fn focus_breaking_keys_always_deactivate() {
        for key in ["enter", "escape", "tab", "Enter", "ESC", "return"] {
            let mut active = InputMode::Inactive;
            active.on_click(1, 1, Instant::now());
            active.on_press(key);
            assert_eq!(active, InputMode::Inactive, "key {key}");

            let mut inactive = InputMode::Inactive;
            inactive.on_press(key);
            assert_eq!(inactive, InputMode::Inactive);
        }
    }

    #[test]
    fn other_keys_keep_focus() {
        let mut mode = InputMode::Inactive;
        mode.on_click(5, 5, Instant::now());
        mode.on_press("backspace");
        mode.on_press("ctrl+a");
        assert!(mode.is_active());
    }

    #[test]
    fn fresh_focus_still_names_the_field() {
        let mut mode = InputMode::Inactive;
        mode.on_click(5, 6, ago(1));
        assert_eq!(
            mode.gate_type(Instant::now(), STALE),
            TypeGate::Direct { x: 5, y: 6 }
        );
    }

    #[test]
    fn stale_focus_requests_refocus() {
        let mut mode = InputMode::Inactive;
        mode.on_click(5, 6, ago(6));
        assert_eq!(
            mode.gate_type(Instant::now(), STALE),
            TypeGate::Refocus { x: 5, y: 6 }
        );
    }

    #[test]
    fn describe_mentions_focus_point() {
        let mut mode = InputMode::Inactive;
        assert!(mode.describe(Instant::now()).contains("NOT in input mode"));
        mode.on_click(120, 45, Instant::now());
        assert!(mode.describe(Instant::now()).contains("(120, 45)"));
    }
}
