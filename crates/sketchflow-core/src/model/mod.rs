//! Diagram data model: nodes, edges and the colour type they share.

mod edge;
mod node;

pub use edge::{Edge, EdgeId, EdgeStyle};
pub use node::{
    Node, NodeData, NodeDataPatch, NodeGeometry, NodeId, NodeKind, NodeStyle, Outline,
    ParseNodeKindError,
};

use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RGBA8 colour that travels as a CSS hex string (`#rgb`, `#rrggbb`, `#rrggbbaa`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub const fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`. `transparent` is accepted too.
    pub fn from_hex(color: &str) -> Option<Self> {
        let color = color.trim();
        if color.eq_ignore_ascii_case("transparent") {
            return Some(Self::transparent());
        }

        let hex = color.strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => Some(Self::new(
                channel(&hex[0..1])? * 17,
                channel(&hex[1..2])? * 17,
                channel(&hex[2..3])? * 17,
                255,
            )),
            6 => Some(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                255,
            )),
            8 => Some(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                channel(&hex[6..8])?,
            )),
            _ => None,
        }
    }

    /// Format as `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl TryFrom<String> for SerializableColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value).ok_or_else(|| format!("invalid colour: {value:?}"))
    }
}

impl From<SerializableColor> for String {
    fn from(color: SerializableColor) -> Self {
        color.to_hex()
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Generate a fresh element id of the form `<prefix>_<uuid>`.
pub fn fresh_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(
            SerializableColor::from_hex("#555"),
            Some(SerializableColor::new(0x55, 0x55, 0x55, 255))
        );
        assert_eq!(
            SerializableColor::from_hex("#2563eb"),
            Some(SerializableColor::new(0x25, 0x63, 0xeb, 255))
        );
        assert_eq!(
            SerializableColor::from_hex("#00000080"),
            Some(SerializableColor::new(0, 0, 0, 0x80))
        );
        assert_eq!(
            SerializableColor::from_hex("transparent"),
            Some(SerializableColor::transparent())
        );
        assert_eq!(SerializableColor::from_hex("555"), None);
        assert_eq!(SerializableColor::from_hex("#12345"), None);
        assert_eq!(SerializableColor::from_hex("#zzzzzz"), None);
    }

    #[test]
    fn test_hex_serde() {
        let color: SerializableColor = serde_json::from_str("\"#333\"").unwrap();
        assert_eq!(color, SerializableColor::new(0x33, 0x33, 0x33, 255));
        assert_eq!(serde_json::to_string(&color).unwrap(), "\"#333333\"");
        assert!(serde_json::from_str::<SerializableColor>("\"blue\"").is_err());
    }

    #[test]
    fn test_peniko_conversion() {
        let color = SerializableColor::new(10, 20, 30, 255);
        let back: SerializableColor = Color::from(color).into();
        assert_eq!(back, color);
    }

    #[test]
    fn test_fresh_ids_unique() {
        let a = fresh_id("dnd");
        let b = fresh_id("dnd");
        assert!(a.starts_with("dnd_"));
        assert_ne!(a, b);
    }
}
