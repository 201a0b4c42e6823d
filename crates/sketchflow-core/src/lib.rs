//! SketchFlow Core Library
//!
//! Platform-agnostic graph model and interaction logic for the SketchFlow
//! diagram canvas: viewport mapping, drag-and-drop replacement, freehand
//! ink capture and pinch-gesture recognition.

pub mod canvas;
pub mod drop;
pub mod generation;
pub mod gesture;
pub mod graph;
pub mod input;
pub mod model;
pub mod stroke;
pub mod viewport;

pub use canvas::{Canvas, CanvasError, CanvasResult, Selection, ToolMode};
pub use drop::{DROP_PROXIMITY, DragPayload, DropEvent, DropOutcome, DropResolver, ReplaceConfirm};
pub use generation::{DiagramGenerator, GenerationError, GenerationRequest, GenerationResponse};
pub use gesture::{
    EventQueue, GestureConfig, GestureEvent, GestureListener, GestureRecognizer, GestureSession, GestureState,
    HandPose, LandmarkFrame, LandmarkSource, ListenerSlot, PINCH_THRESHOLD, ReplaySource,
};
pub use graph::{GraphError, GraphResult, GraphSnapshot, GraphStore, NodeReplacement};
pub use input::{KeyEvent, Modifiers, MouseButton, PointerEvent};
pub use model::{Edge, EdgeId, EdgeStyle, Node, NodeData, NodeId, NodeKind, NodeStyle, Outline, SerializableColor};
pub use stroke::{CaptureState, InkStyle, StrokeCapture};
pub use viewport::{Viewport, to_canvas, to_screen};
