//! Canvas application state.
//!
//! All UI-level transitions (generation, drops, drawing, selection,
//! deletion) are methods on [`Canvas`], which owns the graph and the view.

use crate::drop::{DropEvent, DropOutcome, DropResolver, ReplaceConfirm};
use crate::generation::{DiagramGenerator, GenerationError, GenerationRequest, GenerationResponse};
use crate::gesture::GestureEvent;
use crate::graph::{GraphError, GraphResult, GraphSnapshot, GraphStore};
use crate::input::{KeyEvent, MouseButton, PointerEvent};
use crate::model::{Edge, EdgeId, Node, NodeDataPatch, NodeId, NodeKind, fresh_id};
use crate::stroke::StrokeCapture;
use crate::viewport::Viewport;
use kurbo::{Point, Size};
use thiserror::Error;

/// Where sticker-library clicks place their sticker (canvas space).
pub const STICKER_POSITION: Point = Point::new(100.0, 100.0);

/// Wheel notches to zoom factor.
const ZOOM_PER_SCROLL_UNIT: f64 = 0.001;

/// Screen-pixel tolerance for pointer hit tests.
const HIT_TOLERANCE: f64 = 4.0;

/// Canvas-level errors.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

pub type CanvasResult<T> = Result<T, CanvasError>;

/// What primary-button drags do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    /// Click selects, drag on empty canvas pans.
    #[default]
    Select,
    /// Drag draws freehand ink.
    Draw,
}

/// Selected nodes and edges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n == id)
    }

    pub fn contains_edge(&self, id: &str) -> bool {
        self.edges.iter().any(|e| e == id)
    }
}

/// The editor: graph, view and interaction state.
#[derive(Debug, Clone)]
pub struct Canvas {
    pub graph: GraphStore,
    pub viewport: Viewport,
    pub viewport_size: Size,
    pub tool: ToolMode,
    /// Whether new and ingested edges animate.
    animate_edges: bool,
    pub selection: Selection,
    pub stroke: StrokeCapture,
    pub drop_resolver: DropResolver,
    /// Last gesture cursor position, in screen space.
    pub gesture_cursor: Option<Point>,
    /// Node whose label is being edited; suppresses keyboard deletion.
    editing: Option<NodeId>,
    /// Last pointer position of an in-progress pan.
    pan_anchor: Option<Point>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            graph: GraphStore::new(),
            viewport: Viewport::default(),
            viewport_size: Size::new(1280.0, 800.0),
            tool: ToolMode::Select,
            animate_edges: true,
            selection: Selection::default(),
            stroke: StrokeCapture::new(),
            drop_resolver: DropResolver::new(),
            gesture_cursor: None,
            editing: None,
            pan_anchor: None,
        }
    }

    pub fn set_viewport_size(&mut self, size: Size) {
        self.viewport_size = size;
    }

    pub fn set_tool(&mut self, tool: ToolMode) {
        if tool != self.tool {
            self.stroke.cancel();
            self.pan_anchor = None;
            self.tool = tool;
        }
    }

    pub fn animate_edges(&self) -> bool {
        self.animate_edges
    }

    /// Toggle edge animation for every current and future edge.
    pub fn set_animate_edges(&mut self, animate: bool) {
        self.animate_edges = animate;
        self.graph.set_edges_animated(animate);
    }

    /// Frame the whole diagram.
    pub fn fit_to_content(&mut self) {
        if let Some(bounds) = self.graph.bounds() {
            self.viewport.fit_to_bounds(bounds, self.viewport_size, 50.0);
        }
    }

    // --- generation ------------------------------------------------------

    /// Replace the diagram with a generated one.
    ///
    /// Edges take the current animation flag and the view resets.
    pub fn ingest_generation(&mut self, response: GenerationResponse) -> GraphResult<GraphSnapshot> {
        let GenerationResponse { nodes, mut edges } = response;
        for edge in &mut edges {
            edge.animated = self.animate_edges;
        }
        let snapshot = self.graph.replace_all(nodes, edges)?;
        self.viewport.reset();
        self.selection.clear();
        self.editing = None;
        self.stroke.cancel();
        log::info!(
            "ingested diagram: {} nodes, {} edges",
            snapshot.nodes.len(),
            snapshot.edges.len()
        );
        Ok(snapshot)
    }

    /// Ask a generator for a diagram on `topic` and ingest it.
    ///
    /// A blank topic does nothing and returns `Ok(false)`. On failure the
    /// graph is left as it was.
    pub fn generate(&mut self, generator: &mut dyn DiagramGenerator, topic: &str) -> CanvasResult<bool> {
        let Some(request) = GenerationRequest::new(topic) else {
            return Ok(false);
        };
        let result = generator
            .generate(&request)
            .map_err(CanvasError::from)
            .and_then(|response| self.ingest_generation(response).map_err(CanvasError::from));
        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                log::error!("generation for {:?} failed: {e}", request.topic);
                Err(e)
            }
        }
    }

    // --- nodes -----------------------------------------------------------

    /// Resolve a toolbox drop.
    pub fn handle_drop(&mut self, event: &DropEvent, confirm: &mut dyn ReplaceConfirm) -> GraphResult<DropOutcome> {
        let outcome = self
            .drop_resolver
            .resolve(event, &mut self.graph, &self.viewport, confirm)?;
        if let DropOutcome::Replaced { old, .. } = &outcome {
            self.selection.nodes.retain(|id| id != old);
        }
        Ok(outcome)
    }

    /// Place a sticker from the library at the fixed sticker position.
    pub fn add_sticker(&mut self, icon: &str) -> GraphResult<NodeId> {
        let node = Node::new(fresh_id("sticker"), NodeKind::Sticker, STICKER_POSITION, icon).with_icon(icon);
        let id = node.id().to_string();
        self.graph.add_node(node)?;
        log::debug!("added sticker {icon} as {id}");
        Ok(id)
    }

    pub fn begin_label_edit(&mut self, id: &str) -> GraphResult<()> {
        if !self.graph.contains_node(id) {
            return Err(GraphError::NodeNotFound(id.to_string()));
        }
        self.editing = Some(id.to_string());
        Ok(())
    }

    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    /// Finish a label edit. No-op when nothing is being edited.
    pub fn commit_label_edit(&mut self, label: &str) -> GraphResult<()> {
        match self.editing.take() {
            Some(id) => self.rename_node(&id, label),
            None => Ok(()),
        }
    }

    pub fn rename_node(&mut self, id: &str, label: &str) -> GraphResult<()> {
        self.graph.update_node_data(id, NodeDataPatch::label(label))?;
        Ok(())
    }

    // --- edges -----------------------------------------------------------

    /// Connect two nodes. Reconnecting an existing pair returns its id.
    pub fn connect(&mut self, source: &str, target: &str) -> GraphResult<EdgeId> {
        let id = Edge::connection_id(source, target);
        if self.graph.edge(&id).is_some() {
            return Ok(id);
        }
        let mut edge = Edge::new(id.clone(), source, target);
        edge.animated = self.animate_edges;
        self.graph.add_edge(edge)?;
        Ok(id)
    }

    // --- selection -------------------------------------------------------

    pub fn select_node(&mut self, id: &str, additive: bool) {
        if !additive {
            self.selection.clear();
        }
        if !self.selection.contains_node(id) {
            self.selection.nodes.push(id.to_string());
        }
    }

    pub fn select_edge(&mut self, id: &str, additive: bool) {
        if !additive {
            self.selection.clear();
        }
        if !self.selection.contains_edge(id) {
            self.selection.edges.push(id.to_string());
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Remove every selected node (with its edges) and edge.
    ///
    /// Returns how many nodes and edges were removed in total.
    pub fn delete_selected(&mut self) -> GraphResult<usize> {
        let before = self.graph.node_count() + self.graph.edge_count();
        let selection = std::mem::take(&mut self.selection);
        for id in &selection.nodes {
            if self.graph.contains_node(id) {
                self.graph.remove_node(id)?;
            }
        }
        for id in &selection.edges {
            // May already be gone with one of its endpoints
            if self.graph.edge(id).is_some() {
                self.graph.remove_edge(id)?;
            }
        }
        let removed = before - (self.graph.node_count() + self.graph.edge_count());
        if removed > 0 {
            log::info!("deleted {removed} item(s)");
        }
        Ok(removed)
    }

    // --- input -----------------------------------------------------------

    /// Keyboard handling. Returns whether the key was consumed.
    pub fn handle_key(&mut self, event: &KeyEvent) -> GraphResult<bool> {
        if event.is_delete() && self.editing.is_none() && !self.selection.is_empty() {
            self.delete_selected()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Pointer handling for both tool modes.
    ///
    /// Returns the id of a stroke committed by this event, if any.
    pub fn handle_pointer_event(&mut self, event: &PointerEvent) -> GraphResult<Option<NodeId>> {
        if let PointerEvent::Scroll { position, delta } = event {
            self.viewport.zoom_at(*position, 1.0 - delta.y * ZOOM_PER_SCROLL_UNIT);
            return Ok(None);
        }
        match self.tool {
            ToolMode::Draw => self.draw_pointer(event),
            ToolMode::Select => {
                self.select_pointer(event);
                Ok(None)
            }
        }
    }

    fn draw_pointer(&mut self, event: &PointerEvent) -> GraphResult<Option<NodeId>> {
        match event {
            PointerEvent::Down {
                position,
                button: MouseButton::Left,
            } => {
                self.stroke.start(*position, &self.viewport);
                Ok(None)
            }
            PointerEvent::Move { position } => {
                self.stroke.append(*position, &self.viewport);
                Ok(None)
            }
            PointerEvent::Up {
                position,
                button: MouseButton::Left,
            } => {
                self.stroke.append(*position, &self.viewport);
                self.stroke.finish(&mut self.graph)
            }
            _ => Ok(None),
        }
    }

    fn select_pointer(&mut self, event: &PointerEvent) {
        match event {
            PointerEvent::Down {
                position,
                button: MouseButton::Left,
            } => {
                let canvas_point = self.viewport.to_canvas(*position);
                let tolerance = HIT_TOLERANCE / self.viewport.zoom;
                match self.graph.node_at(canvas_point, tolerance).map(|n| n.id().to_string()) {
                    Some(id) => self.select_node(&id, false),
                    None => {
                        self.selection.clear();
                        self.pan_anchor = Some(*position);
                    }
                }
            }
            PointerEvent::Move { position } => {
                if let Some(anchor) = self.pan_anchor {
                    self.viewport.pan(*position - anchor);
                    self.pan_anchor = Some(*position);
                }
            }
            PointerEvent::Up {
                button: MouseButton::Left,
                ..
            } => {
                self.pan_anchor = None;
            }
            _ => {}
        }
    }

    /// Feed a gesture event. Gesture drawing works in either tool mode.
    pub fn apply_gesture_event(&mut self, event: GestureEvent) -> GraphResult<Option<NodeId>> {
        match event {
            GestureEvent::CursorMove(position) => {
                self.gesture_cursor = Some(position);
                self.stroke.append(position, &self.viewport);
                Ok(None)
            }
            GestureEvent::DrawStart => {
                if let Some(position) = self.gesture_cursor {
                    self.stroke.start(position, &self.viewport);
                }
                Ok(None)
            }
            GestureEvent::DrawEnd => self.stroke.finish(&mut self.graph),
        }
    }

    /// Gesture input went away; abandon any stroke it was drawing.
    pub fn close_gesture_input(&mut self) {
        self.stroke.cancel();
        self.gesture_cursor = None;
    }
}
