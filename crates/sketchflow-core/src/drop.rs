//! Drag-and-drop placement with proximity swap-replacement.

use crate::graph::{GraphResult, GraphStore, NodeReplacement};
use crate::model::{Node, NodeData, NodeId, NodeKind, fresh_id};
use crate::viewport::Viewport;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Half-width of the square (canvas units) a node centre must fall in to be
/// swapped out by a drop.
pub const DROP_PROXIMITY: f64 = 60.0;

/// MIME-style prefix the toolbox puts on payload keys.
const KEY_PREFIX: &str = "application/reactflow/";

/// Key/value bundle carried by a drag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragPayload(BTreeMap<String, String>);

impl DragPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from key/value pairs. Keys may carry the toolbox MIME prefix.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut payload = Self::new();
        for (key, value) in pairs {
            payload.set(key.as_ref(), value);
        }
        payload
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = key.strip_prefix(KEY_PREFIX).unwrap_or(key);
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Node kind named by the `type` entry, if present and known.
    pub fn kind(&self) -> Option<NodeKind> {
        self.get("type")?.parse().ok()
    }

    pub fn label(&self) -> Option<&str> {
        self.get("label")
    }

    pub fn icon(&self) -> Option<&str> {
        self.get("icon")
    }
}

/// A drop at a screen position.
#[derive(Debug, Clone, PartialEq)]
pub struct DropEvent {
    pub payload: DragPayload,
    pub screen_position: Point,
}

/// What a drop did to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Payload had no usable type; the graph is untouched.
    Ignored,
    Inserted(NodeId),
    Replaced { old: NodeId, new: NodeId },
}

/// Asked before an existing node is swapped out.
pub trait ReplaceConfirm {
    fn confirm(&mut self, existing: &Node, incoming: NodeKind) -> bool;
}

impl<F> ReplaceConfirm for F
where
    F: FnMut(&Node, NodeKind) -> bool,
{
    fn confirm(&mut self, existing: &Node, incoming: NodeKind) -> bool {
        self(existing, incoming)
    }
}

/// Resolves drops into insertions or replacements.
#[derive(Debug, Clone)]
pub struct DropResolver {
    pub proximity: f64,
}

impl Default for DropResolver {
    fn default() -> Self {
        Self {
            proximity: DROP_PROXIMITY,
        }
    }
}

impl DropResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// First interactive node, in store order, whose centre is within
    /// `proximity` of `canvas_point` on both axes.
    pub fn find_candidate<'a>(&self, graph: &'a GraphStore, canvas_point: Point) -> Option<&'a Node> {
        graph.nodes().iter().find(|node| {
            let center = node.center();
            node.is_interactive()
                && (center.x - canvas_point.x).abs() <= self.proximity
                && (center.y - canvas_point.y).abs() <= self.proximity
        })
    }

    /// Apply a drop to the graph.
    pub fn resolve(
        &self,
        event: &DropEvent,
        graph: &mut GraphStore,
        viewport: &Viewport,
        confirm: &mut dyn ReplaceConfirm,
    ) -> GraphResult<DropOutcome> {
        let Some(kind) = event.payload.kind() else {
            log::debug!("ignoring drop without a known type: {:?}", event.payload.get("type"));
            return Ok(DropOutcome::Ignored);
        };
        let position = viewport.to_canvas(event.screen_position);
        let icon = event.payload.icon().map(str::to_string);

        let accepted = self
            .find_candidate(graph, position)
            .filter(|candidate| confirm.confirm(candidate, kind))
            .map(|candidate| (candidate.id().to_string(), candidate.data.clone()));

        if let Some((old_id, old_data)) = accepted {
            let new_id = fresh_id("dnd");
            let replacement = NodeReplacement {
                id: new_id.clone(),
                kind,
                data: NodeData { icon, ..old_data },
                position: None,
                style: None,
            };
            graph.replace_node(&old_id, replacement)?;
            log::info!("swapped {old_id} for {kind} node {new_id}");
            return Ok(DropOutcome::Replaced {
                old: old_id,
                new: new_id,
            });
        }

        let label = event.payload.label().unwrap_or_else(|| kind.display_name());
        let mut node = Node::new(fresh_id("dnd"), kind, position, label);
        node.data.icon = icon;
        node.style = kind.initial_style();
        let id = node.id().to_string();
        graph.add_node(node)?;
        log::info!("dropped {kind} node {id} at ({:.1}, {:.1})", position.x, position.y);
        Ok(DropOutcome::Inserted(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, NodeStyle};

    fn drop_at(kind: &str, label: &str, x: f64, y: f64) -> DropEvent {
        DropEvent {
            payload: DragPayload::from_pairs([("type", kind), ("label", label)]),
            screen_position: Point::new(x, y),
        }
    }

    fn always(answer: bool) -> impl FnMut(&Node, NodeKind) -> bool {
        move |_, _| answer
    }

    /// A service node centred on (100, 100) wired to two neighbours.
    fn wired_graph() -> GraphStore {
        let mut graph = GraphStore::new();
        let styled = Node::new("api", NodeKind::Service, Point::new(25.0, 80.0), "API").with_style(NodeStyle {
            stroke: Some(crate::model::SerializableColor::black()),
            ..NodeStyle::default()
        });
        graph.add_node(styled).unwrap();
        graph
            .add_node(Node::new("web", NodeKind::Actor, Point::new(500.0, 500.0), "Web"))
            .unwrap();
        graph
            .add_node(Node::new("db", NodeKind::Store, Point::new(900.0, 500.0), "DB"))
            .unwrap();
        graph.add_edge(Edge::new("e1", "web", "api")).unwrap();
        graph.add_edge(Edge::new("e2", "api", "db")).unwrap();
        graph
    }

    #[test]
    fn test_missing_type_is_ignored() {
        let mut graph = GraphStore::new();
        let resolver = DropResolver::new();
        for payload in [
            DragPayload::from_pairs([("label", "x")]),
            DragPayload::from_pairs([("type", "hexagon")]),
            DragPayload::from_pairs([("type", "")]),
        ] {
            let event = DropEvent {
                payload,
                screen_position: Point::ZERO,
            };
            let outcome = resolver
                .resolve(&event, &mut graph, &Viewport::default(), &mut always(true))
                .unwrap();
            assert_eq!(outcome, DropOutcome::Ignored);
        }
        assert!(graph.is_empty());
    }

    #[test]
    fn test_insert_converts_to_canvas_space() {
        let mut graph = GraphStore::new();
        let viewport = Viewport::new(50.0, 20.0, 2.0);
        let outcome = DropResolver::new()
            .resolve(
                &drop_at("database", "Orders", 250.0, 220.0),
                &mut graph,
                &viewport,
                &mut always(true),
            )
            .unwrap();
        let DropOutcome::Inserted(id) = outcome else {
            panic!("expected insert, got {outcome:?}");
        };
        assert!(id.starts_with("dnd_"));
        let node = graph.node(&id).unwrap();
        assert_eq!(node.kind, NodeKind::Store);
        assert_eq!(node.position, Point::new(100.0, 100.0));
        assert_eq!(node.label(), "Orders");
    }

    #[test]
    fn test_confirmed_swap_keeps_position_style_label() {
        let mut graph = wired_graph();
        let before = graph.node("api").unwrap().clone();
        let mut asked = Vec::new();
        let mut confirm = |existing: &Node, kind: NodeKind| {
            asked.push((existing.id().to_string(), kind));
            true
        };

        let mut event = drop_at("circle", "Ignored label", 130.0, 70.0);
        event.payload.set("application/reactflow/icon", "user");
        let outcome = DropResolver::new()
            .resolve(&event, &mut graph, &Viewport::default(), &mut confirm)
            .unwrap();

        let DropOutcome::Replaced { old, new } = outcome else {
            panic!("expected replace, got {outcome:?}");
        };
        assert_eq!(old, "api");
        assert_eq!(asked, vec![("api".to_string(), NodeKind::Actor)]);
        assert!(!graph.contains_node("api"));
        assert_eq!(graph.node_count(), 3);

        let swapped = graph.node(&new).unwrap();
        assert_eq!(swapped.kind, NodeKind::Actor);
        assert_eq!(swapped.position, before.position);
        assert_eq!(swapped.style, before.style);
        assert_eq!(swapped.label(), "API");
        assert_eq!(swapped.data.icon.as_deref(), Some("user"));

        assert!(graph.edges().iter().all(|e| !e.touches("api")));
        assert_eq!(graph.incident_edges(&new).count(), 2);
        assert!(graph.dangling_edges().is_empty());
    }

    #[test]
    fn test_declined_swap_inserts() {
        let mut graph = wired_graph();
        let outcome = DropResolver::new()
            .resolve(
                &drop_at("default", "New", 110.0, 110.0),
                &mut graph,
                &Viewport::default(),
                &mut always(false),
            )
            .unwrap();
        assert!(matches!(outcome, DropOutcome::Inserted(_)));
        assert!(graph.contains_node("api"));
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_proximity_window() {
        let graph = wired_graph();
        let resolver = DropResolver::new();
        // api centre is (100, 100)
        assert!(resolver.find_candidate(&graph, Point::new(160.0, 40.0)).is_some());
        assert!(resolver.find_candidate(&graph, Point::new(161.0, 100.0)).is_none());
        assert!(resolver.find_candidate(&graph, Point::new(100.0, 161.0)).is_none());
    }

    #[test]
    fn test_annotation_never_a_candidate() {
        let mut graph = GraphStore::new();
        let mut ink = Node::new("draw_1", NodeKind::Annotation, Point::new(0.0, 0.0), "");
        ink.data.width = Some(20.0);
        ink.data.height = Some(20.0);
        graph.add_node(ink).unwrap();
        assert!(DropResolver::new().find_candidate(&graph, Point::new(10.0, 10.0)).is_none());
    }

    #[test]
    fn test_text_drop_defaults() {
        let mut graph = GraphStore::new();
        let event = DropEvent {
            payload: DragPayload::from_pairs([("type", "textNode")]),
            screen_position: Point::new(5.0, 5.0),
        };
        let DropOutcome::Inserted(id) = DropResolver::new()
            .resolve(&event, &mut graph, &Viewport::default(), &mut always(true))
            .unwrap()
        else {
            panic!("expected insert");
        };
        let node = graph.node(&id).unwrap();
        assert_eq!(node.label(), "Double click to edit");
        let style = node.style.as_ref().unwrap();
        assert_eq!((style.width, style.height), (Some(200.0), Some(50.0)));
    }

    #[test]
    fn test_same_inputs_same_outcome_shape() {
        let resolver = DropResolver::new();
        for answer in [true, false] {
            let mut first = wired_graph();
            let mut second = wired_graph();
            let event = drop_at("service", "S", 100.0, 100.0);
            let a = resolver
                .resolve(&event, &mut first, &Viewport::default(), &mut always(answer))
                .unwrap();
            let b = resolver
                .resolve(&event, &mut second, &Viewport::default(), &mut always(answer))
                .unwrap();
            assert_eq!(
                std::mem::discriminant(&a),
                std::mem::discriminant(&b)
            );
            assert_eq!(first.node_count(), second.node_count());
        }
    }
}
