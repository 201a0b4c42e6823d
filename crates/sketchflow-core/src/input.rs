//! Pointer and keyboard events delivered to the canvas.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn none(&self) -> bool {
        !(self.shift || self.ctrl || self.alt || self.meta)
    }
}

/// Pointer event in screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down { position: Point, button: MouseButton },
    Up { position: Point, button: MouseButton },
    Move { position: Point },
    Scroll { position: Point, delta: Vec2 },
}

impl PointerEvent {
    pub fn position(&self) -> Point {
        match self {
            Self::Down { position, .. }
            | Self::Up { position, .. }
            | Self::Move { position }
            | Self::Scroll { position, .. } => *position,
        }
    }
}

/// Keyboard event, keyed by the platform key name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyEvent {
    Pressed { key: String, modifiers: Modifiers },
    Released { key: String },
}

impl KeyEvent {
    pub fn pressed(key: impl Into<String>) -> Self {
        Self::Pressed {
            key: key.into(),
            modifiers: Modifiers::default(),
        }
    }

    /// A bare `Delete` or `Backspace` press.
    pub fn is_delete(&self) -> bool {
        match self {
            Self::Pressed { key, modifiers } => {
                matches!(key.as_str(), "Delete" | "Backspace") && modifiers.none()
            }
            Self::Released { .. } => false,
        }
    }
}
