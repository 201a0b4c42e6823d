//! Diagram nodes and the per-kind geometry table.

use super::SerializableColor;
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Node identifier. Unique within a graph and never reassigned.
pub type NodeId = String;

/// The closed set of node kinds.
///
/// The wire aliases are the type names the generation backend and the
/// toolbox emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[serde(alias = "default", alias = "diamond", alias = "triangle")]
    Service,
    #[serde(alias = "circle")]
    Actor,
    #[serde(alias = "database")]
    Store,
    #[serde(alias = "drawing")]
    Annotation,
    #[serde(alias = "textNode")]
    Text,
    #[serde(alias = "imageNode")]
    Sticker,
}

/// How a node kind is outlined when rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outline {
    /// Rectangle with the given corner radius.
    RoundedRect(f64),
    Ellipse,
    /// Rectangle body with elliptical caps of the given height.
    Cylinder(f64),
    /// Freehand ink taken from the node's path data.
    Ink,
    /// No outline; only the label is drawn.
    Bare,
}

/// Default geometry and behaviour of a node kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeGeometry {
    pub width: f64,
    pub height: f64,
    pub outline: Outline,
    pub interactive: bool,
}

/// Indexed by [`NodeKind::index`].
static GEOMETRY: [NodeGeometry; 6] = [
    // Service
    NodeGeometry {
        width: 150.0,
        height: 40.0,
        outline: Outline::RoundedRect(4.0),
        interactive: true,
    },
    // Actor
    NodeGeometry {
        width: 80.0,
        height: 80.0,
        outline: Outline::Ellipse,
        interactive: true,
    },
    // Store
    NodeGeometry {
        width: 60.0,
        height: 80.0,
        outline: Outline::Cylinder(20.0),
        interactive: true,
    },
    // Annotation
    NodeGeometry {
        width: 1.0,
        height: 1.0,
        outline: Outline::Ink,
        interactive: false,
    },
    // Text
    NodeGeometry {
        width: 200.0,
        height: 50.0,
        outline: Outline::Bare,
        interactive: true,
    },
    // Sticker
    NodeGeometry {
        width: 80.0,
        height: 90.0,
        outline: Outline::RoundedRect(12.0),
        interactive: true,
    },
];

impl NodeKind {
    pub const ALL: [NodeKind; 6] = [
        NodeKind::Service,
        NodeKind::Actor,
        NodeKind::Store,
        NodeKind::Annotation,
        NodeKind::Text,
        NodeKind::Sticker,
    ];

    const fn index(self) -> usize {
        match self {
            NodeKind::Service => 0,
            NodeKind::Actor => 1,
            NodeKind::Store => 2,
            NodeKind::Annotation => 3,
            NodeKind::Text => 4,
            NodeKind::Sticker => 5,
        }
    }

    /// Default geometry for this kind.
    pub fn geometry(self) -> &'static NodeGeometry {
        &GEOMETRY[self.index()]
    }

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Service => "service",
            NodeKind::Actor => "actor",
            NodeKind::Store => "store",
            NodeKind::Annotation => "annotation",
            NodeKind::Text => "text",
            NodeKind::Sticker => "sticker",
        }
    }

    /// Label used when a drop carries none.
    pub fn display_name(self) -> &'static str {
        match self {
            NodeKind::Service => "Service",
            NodeKind::Actor => "User",
            NodeKind::Store => "Database",
            NodeKind::Annotation => "",
            NodeKind::Text => "Double click to edit",
            NodeKind::Sticker => "Sticker",
        }
    }

    /// Style override a freshly placed node of this kind starts with.
    pub fn initial_style(self) -> Option<NodeStyle> {
        match self {
            NodeKind::Text => Some(NodeStyle {
                width: Some(self.geometry().width),
                height: Some(self.geometry().height),
                ..NodeStyle::default()
            }),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown node type: {0:?}")]
pub struct ParseNodeKindError(pub String);

impl FromStr for NodeKind {
    type Err = ParseNodeKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "service" | "default" | "diamond" | "triangle" => Ok(NodeKind::Service),
            "actor" | "circle" => Ok(NodeKind::Actor),
            "store" | "database" => Ok(NodeKind::Store),
            "annotation" | "drawing" => Ok(NodeKind::Annotation),
            "text" | "textNode" => Ok(NodeKind::Text),
            "sticker" | "imageNode" => Ok(NodeKind::Sticker),
            other => Err(ParseNodeKindError(other.to_string())),
        }
    }
}

/// User-facing payload of a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Polyline path (`M x,y L x,y ...`) relative to the node position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl NodeData {
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

/// Partial update for [`NodeData`]. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeDataPatch {
    pub label: Option<String>,
    pub icon: Option<Option<String>>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl NodeDataPatch {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.icon.is_none() && self.width.is_none() && self.height.is_none()
    }

    pub(crate) fn apply(self, data: &mut NodeData) {
        if let Some(label) = self.label {
            data.label = label;
        }
        if let Some(icon) = self.icon {
            data.icon = icon;
        }
        if let Some(width) = self.width {
            data.width = Some(width);
        }
        if let Some(height) = self.height {
            data.height = Some(height);
        }
    }
}

/// Geometry and colour overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<SerializableColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
}

/// A diagram node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub(crate) id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub position: Point,
    #[serde(default)]
    pub data: NodeData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<NodeStyle>,
    /// Explicit interactivity; falls back to the kind's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactive: Option<bool>,
}

impl Node {
    /// Create a node with a label and no overrides.
    pub fn new(id: impl Into<NodeId>, kind: NodeKind, position: Point, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            position,
            data: NodeData::labeled(label),
            style: None,
            interactive: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.data.icon = Some(icon.into());
        self
    }

    pub fn with_style(mut self, style: NodeStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.data.label
    }

    /// Whether the node takes part in hit testing and drop matching.
    pub fn is_interactive(&self) -> bool {
        self.interactive.unwrap_or(self.kind.geometry().interactive)
    }

    /// Rendered size: style override, then data size, then kind default.
    pub fn size(&self) -> Size {
        let geometry = self.kind.geometry();
        let style = self.style.as_ref();
        let width = style
            .and_then(|s| s.width)
            .or(self.data.width)
            .unwrap_or(geometry.width);
        let height = style
            .and_then(|s| s.height)
            .or(self.data.height)
            .unwrap_or(geometry.height);
        Size::new(width, height)
    }

    /// Bounding box in canvas space. `position` is the top-left corner.
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size())
    }

    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    /// Hit test in canvas space. Non-interactive nodes never hit.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.is_interactive() && self.bounds().inflate(tolerance, tolerance).contains(point)
    }
}
