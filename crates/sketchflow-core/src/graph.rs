//! Graph store: the single owner of the node and edge collections.
//!
//! Collections are held behind `Arc` so every mutation can hand back an
//! immutable snapshot. A collection a mutation did not touch keeps its
//! pointer identity, which lets observers diff with `Arc::ptr_eq`.

use crate::model::{Edge, EdgeId, Node, NodeDataPatch, NodeId, NodeKind, NodeStyle};
use kurbo::{Point, Rect};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Graph mutation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Node already exists: {0}")]
    DuplicateNode(NodeId),
    #[error("Edge already exists: {0}")]
    DuplicateEdge(EdgeId),
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("Edge not found: {0}")]
    EdgeNotFound(EdgeId),
    #[error("Edge {edge} references missing node {node}")]
    DanglingEdge { edge: EdgeId, node: NodeId },
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Immutable view of the node collection.
pub type NodeSnapshot = Arc<Vec<Node>>;
/// Immutable view of the edge collection.
pub type EdgeSnapshot = Arc<Vec<Edge>>;

/// Both collections, for mutations that may touch either.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    pub nodes: NodeSnapshot,
    pub edges: EdgeSnapshot,
}

/// What a swap-replacement changes on the replaced node.
///
/// Position and style are kept from the old node unless overridden here.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeReplacement {
    pub id: NodeId,
    pub kind: NodeKind,
    pub data: crate::model::NodeData,
    pub position: Option<Point>,
    pub style: Option<NodeStyle>,
}

/// Owns the diagram's nodes and edges in insertion order.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: NodeSnapshot,
    edges: EdgeSnapshot,
}

impl GraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a complete node/edge set, validating it first.
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> GraphResult<Self> {
        let mut store = Self::new();
        store.replace_all(nodes, edges)?;
        Ok(store)
    }

    // --- queries -------------------------------------------------------

    pub fn nodes(&self) -> &NodeSnapshot {
        &self.nodes
    }

    pub fn edges(&self) -> &EdgeSnapshot {
        &self.edges
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: Arc::clone(&self.nodes),
            edges: Arc::clone(&self.edges),
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Edges with `id` as source or target.
    pub fn incident_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.touches(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Front-most interactive node under `point` (canvas space).
    pub fn node_at(&self, point: Point, tolerance: f64) -> Option<&Node> {
        self.nodes.iter().rev().find(|n| n.hit_test(point, tolerance))
    }

    /// Union of all node bounds.
    pub fn bounds(&self) -> Option<Rect> {
        self.nodes
            .iter()
            .map(Node::bounds)
            .reduce(|acc, b| acc.union(b))
    }

    /// Edges whose endpoints are missing. Always empty outside of a bug.
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| !self.contains_node(&e.source) || !self.contains_node(&e.target))
            .collect()
    }

    fn node_index(&self, id: &str) -> GraphResult<usize> {
        self.nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    fn debug_check(&self) {
        debug_assert!(
            self.dangling_edges().is_empty(),
            "graph invariant broken: dangling edges {:?}",
            self.dangling_edges()
        );
    }

    // --- node mutations ------------------------------------------------

    /// Add a node. Ids must be unique.
    pub fn add_node(&mut self, node: Node) -> GraphResult<NodeSnapshot> {
        if self.contains_node(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        log::debug!("add node {} ({})", node.id, node.kind);
        Arc::make_mut(&mut self.nodes).push(node);
        self.debug_check();
        Ok(Arc::clone(&self.nodes))
    }

    /// Remove a node together with every edge incident to it.
    pub fn remove_node(&mut self, id: &str) -> GraphResult<GraphSnapshot> {
        let index = self.node_index(id)?;
        Arc::make_mut(&mut self.nodes).remove(index);

        if self.edges.iter().any(|e| e.touches(id)) {
            Arc::make_mut(&mut self.edges).retain(|e| !e.touches(id));
        }
        log::debug!("remove node {id}");
        self.debug_check();
        Ok(self.snapshot())
    }

    /// Swap a node for a new one, rewiring incident edges to the new id.
    ///
    /// The replacement takes the old node's slot in iteration order.
    pub fn replace_node(
        &mut self,
        old_id: &str,
        replacement: NodeReplacement,
    ) -> GraphResult<GraphSnapshot> {
        let index = self.node_index(old_id)?;
        if replacement.id != old_id && self.contains_node(&replacement.id) {
            return Err(GraphError::DuplicateNode(replacement.id));
        }

        let nodes = Arc::make_mut(&mut self.nodes);
        let old = &nodes[index];
        let new_node = Node {
            id: replacement.id,
            kind: replacement.kind,
            position: replacement.position.unwrap_or(old.position),
            data: replacement.data,
            style: replacement.style.or_else(|| old.style.clone()),
            interactive: None,
        };
        let new_id = new_node.id.clone();
        nodes[index] = new_node;

        if new_id != old_id && self.edges.iter().any(|e| e.touches(old_id)) {
            for edge in Arc::make_mut(&mut self.edges).iter_mut() {
                if edge.source == old_id {
                    edge.source = new_id.clone();
                }
                if edge.target == old_id {
                    edge.target = new_id.clone();
                }
            }
        }
        log::debug!("replace node {old_id} -> {new_id}");
        self.debug_check();
        Ok(self.snapshot())
    }

    /// Patch a node's data.
    pub fn update_node_data(&mut self, id: &str, patch: NodeDataPatch) -> GraphResult<NodeSnapshot> {
        let index = self.node_index(id)?;
        if !patch.is_empty() {
            patch.apply(&mut Arc::make_mut(&mut self.nodes)[index].data);
        }
        Ok(Arc::clone(&self.nodes))
    }

    /// Move a node to a new canvas position.
    pub fn move_node(&mut self, id: &str, position: Point) -> GraphResult<NodeSnapshot> {
        let index = self.node_index(id)?;
        Arc::make_mut(&mut self.nodes)[index].position = position;
        Ok(Arc::clone(&self.nodes))
    }

    // --- edge mutations ------------------------------------------------

    /// Add an edge. Both endpoints must exist.
    pub fn add_edge(&mut self, edge: Edge) -> GraphResult<EdgeSnapshot> {
        if self.edge(&edge.id).is_some() {
            return Err(GraphError::DuplicateEdge(edge.id));
        }
        for endpoint in [&edge.source, &edge.target] {
            if !self.contains_node(endpoint) {
                return Err(GraphError::DanglingEdge {
                    edge: edge.id.clone(),
                    node: endpoint.clone(),
                });
            }
        }
        log::debug!("add edge {} ({} -> {})", edge.id, edge.source, edge.target);
        Arc::make_mut(&mut self.edges).push(edge);
        self.debug_check();
        Ok(Arc::clone(&self.edges))
    }

    pub fn remove_edge(&mut self, id: &str) -> GraphResult<EdgeSnapshot> {
        let index = self
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| GraphError::EdgeNotFound(id.to_string()))?;
        Arc::make_mut(&mut self.edges).remove(index);
        Ok(Arc::clone(&self.edges))
    }

    /// Set the `animated` flag on every edge.
    pub fn set_edges_animated(&mut self, animated: bool) -> EdgeSnapshot {
        if self.edges.iter().any(|e| e.animated != animated) {
            for edge in Arc::make_mut(&mut self.edges).iter_mut() {
                edge.animated = animated;
            }
        }
        Arc::clone(&self.edges)
    }

    /// Set every edge's dash offset.
    pub fn set_edge_dash_offset(&mut self, offset: f64) -> EdgeSnapshot {
        for edge in Arc::make_mut(&mut self.edges).iter_mut() {
            edge.style.dash_offset = offset;
        }
        Arc::clone(&self.edges)
    }

    /// Restore per-edge animation state captured earlier. Unknown ids are skipped.
    pub fn restore_edge_animation(&mut self, saved: &[(EdgeId, bool, f64)]) -> EdgeSnapshot {
        let edges = Arc::make_mut(&mut self.edges);
        for (id, animated, offset) in saved {
            if let Some(edge) = edges.iter_mut().find(|e| &e.id == id) {
                edge.animated = *animated;
                edge.style.dash_offset = *offset;
            }
        }
        Arc::clone(&self.edges)
    }

    // --- bulk ----------------------------------------------------------

    /// Replace the whole graph. Validates first; on error nothing changes.
    pub fn replace_all(&mut self, nodes: Vec<Node>, edges: Vec<Edge>) -> GraphResult<GraphSnapshot> {
        let mut node_ids = HashSet::with_capacity(nodes.len());
        for node in &nodes {
            if !node_ids.insert(node.id.as_str()) {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }

        let mut edge_ids = HashSet::with_capacity(edges.len());
        for edge in &edges {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(GraphError::DuplicateEdge(edge.id.clone()));
            }
            for endpoint in [&edge.source, &edge.target] {
                if !node_ids.contains(endpoint.as_str()) {
                    return Err(GraphError::DanglingEdge {
                        edge: edge.id.clone(),
                        node: endpoint.clone(),
                    });
                }
            }
        }

        self.nodes = Arc::new(nodes);
        self.edges = Arc::new(edges);
        self.debug_check();
        Ok(self.snapshot())
    }

    /// Remove everything.
    pub fn clear(&mut self) -> GraphSnapshot {
        self.nodes = Arc::default();
        self.edges = Arc::default();
        self.snapshot()
    }
}
