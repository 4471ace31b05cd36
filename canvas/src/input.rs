//! Input model: modifier keys, mouse buttons, keyboard keys and wheel deltas.
//!
//! These are the raw event payloads the host forwards to the engine. The
//! interaction state machine that consumes them lives in
//! [`selection`](crate::selection).

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

/// Keyboard/mouse modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    /// Shift key is held.
    pub shift: bool,
    /// Ctrl key is held.
    pub ctrl: bool,
    /// Alt / Option key is held.
    pub alt: bool,
    /// Meta / Command key is held.
    pub meta: bool,
}

impl Modifiers {
    /// Platform command modifier: Ctrl on Linux/Windows, Cmd on macOS.
    #[must_use]
    pub fn command(self) -> bool {
        self.ctrl || self.meta
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

/// A keyboard key.
///
/// The inner string holds the key name as reported by the host (e.g. `"Delete"`, `" "`, `"a"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

impl Key {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(name.to_owned())
    }

    #[must_use]
    pub fn is_space(&self) -> bool {
        self.0 == " " || self.0 == "Space" || self.0 == "Spacebar"
    }

    #[must_use]
    pub fn is_escape(&self) -> bool {
        self.0 == "Escape" || self.0 == "Esc"
    }

    /// `Delete` or `Backspace`.
    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.0 == "Delete" || self.0 == "Backspace"
    }

    /// Case-insensitive single-character match (`"a"` matches `"A"`).
    #[must_use]
    pub fn is_char(&self, c: char) -> bool {
        let mut chars = self.0.chars();
        match (chars.next(), chars.next()) {
            (Some(first), None) => first.eq_ignore_ascii_case(&c),
            _ => false,
        }
    }
}

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    /// Horizontal scroll amount in pixels.
    pub dx: f64,
    /// Vertical scroll amount in pixels (positive = down).
    pub dy: f64,
}
