//! Diagram edges.

use super::{NodeId, SerializableColor};
use serde::{Deserialize, Serialize};

/// Edge identifier.
pub type EdgeId = String;

/// Stroke styling of an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    #[serde(default = "default_stroke")]
    pub stroke: SerializableColor,
    #[serde(default = "default_width", alias = "strokeWidth")]
    pub width: f64,
    /// Alternating dash/gap lengths. Empty means a solid line.
    #[serde(default, alias = "strokeDasharray", with = "dash_array")]
    pub dash_pattern: Vec<f64>,
    /// Phase of the dash pattern; animated by the export pipeline.
    #[serde(default, alias = "strokeDashoffset")]
    pub dash_offset: f64,
}

fn default_stroke() -> SerializableColor {
    SerializableColor::new(0x55, 0x55, 0x55, 255)
}

fn default_width() -> f64 {
    2.0
}

impl Default for EdgeStyle {
    fn default() -> Self {
        Self {
            stroke: default_stroke(),
            width: default_width(),
            dash_pattern: Vec::new(),
            dash_offset: 0.0,
        }
    }
}

impl EdgeStyle {
    pub fn dashed(mut self, pattern: &[f64]) -> Self {
        self.dash_pattern = pattern.to_vec();
        self
    }

    pub fn is_dashed(&self) -> bool {
        !self.dash_pattern.is_empty()
    }
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub(crate) id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub animated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub style: EdgeStyle,
}

impl Edge {
    pub fn new(id: impl Into<EdgeId>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            animated: false,
            label: None,
            style: EdgeStyle::default(),
        }
    }

    /// Edge id used for user-drawn connections.
    pub fn connection_id(source: &str, target: &str) -> EdgeId {
        format!("e_{source}_{target}")
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether either endpoint is `node`.
    pub fn touches(&self, node: &str) -> bool {
        self.source == node || self.target == node
    }

    /// Label text, if any non-blank label is set.
    pub fn visible_label(&self) -> Option<&str> {
        self.label.as_deref().filter(|l| !l.trim().is_empty())
    }
}

/// Dash arrays travel as `"5,5"`, `"5 5"` or a JSON number list; `"0"` is solid.
mod dash_array {
    use serde::{Deserialize, Deserializer, Serializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(f64),
        List(Vec<f64>),
    }

    pub fn serialize<S: Serializer>(pattern: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let text = pattern
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let values = match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|part| !part.is_empty())
                .map(|part| part.parse::<f64>().map_err(de::Error::custom))
                .collect::<Result<Vec<_>, _>>()?,
            Repr::Number(value) => vec![value],
            Repr::List(values) => values,
        };
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(de::Error::custom("dash lengths must be finite and non-negative"));
        }
        if values.iter().all(|v| *v == 0.0) {
            return Ok(Vec::new());
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_generated_edge() {
        let json = r##"{
            "id": "e_api_db",
            "source": "api",
            "target": "db",
            "animated": true,
            "label": "reads",
            "type": "smoothstep",
            "style": {"stroke": "#555", "strokeWidth": 2, "strokeDasharray": "5,5"},
            "data": {"isDashed": true}
        }"##;
        let edge: Edge = serde_json::from_str(json).unwrap();
        assert_eq!(edge.id(), "e_api_db");
        assert!(edge.animated);
        assert_eq!(edge.visible_label(), Some("reads"));
        assert_eq!(edge.style.dash_pattern, vec![5.0, 5.0]);
        assert!((edge.style.width - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_solid_dash_forms() {
        for raw in [r#""0""#, r#""""#, "0", "[0, 0]"] {
            let json = format!(r#"{{"strokeDasharray": {raw}}}"#);
            let style: EdgeStyle = serde_json::from_str(&json).unwrap();
            assert!(!style.is_dashed(), "{raw}");
        }
    }

    #[test]
    fn test_bad_dash_rejected() {
        let json = r#"{"strokeDasharray": "5,-1"}"#;
        assert!(serde_json::from_str::<EdgeStyle>(json).is_err());
    }

    #[test]
    fn test_style_roundtrip_keeps_pattern() {
        let style = EdgeStyle::default().dashed(&[4.0, 2.5]);
        let json = serde_json::to_string(&style).unwrap();
        let back: EdgeStyle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, style);
    }

    #[test]
    fn test_blank_label_hidden() {
        let edge = Edge::new("e", "a", "b").with_label("  ");
        assert_eq!(edge.visible_label(), None);
        assert!(edge.touches("a") && edge.touches("b") && !edge.touches("c"));
    }
}
