//! Renderer trait abstraction.

use kurbo::{Point, Size};
use peniko::Color;
use sketchflow_core::canvas::{Canvas, Selection};
use sketchflow_core::graph::GraphStore;
use sketchflow_core::viewport::Viewport;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Render failed: {0}")]
    RenderFailed(String),
    #[error("Surface error: {0}")]
    Surface(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Grid display style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridStyle {
    /// No grid (plain background).
    None,
    /// Dots at every grid intersection.
    #[default]
    Dots,
}

/// Colours used for a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTheme {
    pub background: Color,
    pub node_fill: Color,
    pub node_stroke: Color,
    pub text: Color,
    /// Backing box behind edge labels.
    pub label_box: Color,
    pub grid: Color,
    pub selection: Color,
    pub cursor: Color,
    /// Current step of a walkthrough.
    pub active_edge: Color,
    /// Every other step of a walkthrough.
    pub dimmed_edge: Color,
}

impl RenderTheme {
    /// On-screen look.
    pub fn screen() -> Self {
        Self {
            background: Color::from_rgba8(248, 250, 252, 255),
            node_fill: Color::from_rgba8(255, 255, 255, 255),
            node_stroke: Color::from_rgba8(26, 25, 43, 255),
            text: Color::from_rgba8(34, 34, 34, 255),
            label_box: Color::from_rgba8(241, 245, 249, 230),
            grid: Color::from_rgba8(203, 213, 225, 255),
            selection: Color::from_rgba8(59, 130, 246, 255), // Blue
            cursor: Color::from_rgba8(220, 38, 38, 200),
            active_edge: Color::from_rgba8(0, 229, 255, 255),
            dimmed_edge: Color::from_rgba8(176, 190, 197, 255),
        }
    }

    /// Export look: opaque white background, white label boxes, black text.
    pub fn export() -> Self {
        Self {
            background: Color::WHITE,
            label_box: Color::WHITE,
            text: Color::BLACK,
            ..Self::screen()
        }
    }
}

impl Default for RenderTheme {
    fn default() -> Self {
        Self::screen()
    }
}

/// Context for a single render frame.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    /// The graph to render.
    pub graph: &'a GraphStore,
    pub viewport: Viewport,
    /// Output size in pixels.
    pub size: Size,
    pub theme: RenderTheme,
    pub grid_style: GridStyle,
    /// Selection to highlight.
    pub selection: Option<&'a Selection>,
    /// Gesture cursor in screen space.
    pub cursor: Option<Point>,
    /// Walkthrough step: this edge is emphasised, the rest are dimmed and
    /// every edge label carries its step number.
    pub active_edge: Option<&'a str>,
}

impl<'a> RenderContext<'a> {
    /// Bare context: no grid, selection or cursor.
    pub fn new(graph: &'a GraphStore, viewport: Viewport, size: Size) -> Self {
        Self {
            graph,
            viewport,
            size,
            theme: RenderTheme::screen(),
            grid_style: GridStyle::None,
            selection: None,
            cursor: None,
            active_edge: None,
        }
    }

    /// Everything the interactive canvas shows, chrome included.
    pub fn from_canvas(canvas: &'a Canvas) -> Self {
        Self {
            grid_style: GridStyle::default(),
            selection: Some(&canvas.selection),
            cursor: canvas.gesture_cursor,
            ..Self::new(&canvas.graph, canvas.viewport, canvas.viewport_size)
        }
    }

    /// The canvas as it is exported: current view, no chrome, export theme.
    pub fn for_export(canvas: &'a Canvas) -> Self {
        Self::new(&canvas.graph, canvas.viewport, canvas.viewport_size).with_theme(RenderTheme::export())
    }

    pub fn with_theme(mut self, theme: RenderTheme) -> Self {
        self.theme = theme;
        self
    }

    pub fn with_active_edge(mut self, id: &'a str) -> Self {
        self.active_edge = Some(id);
        self
    }

    /// Pixel dimensions, rejecting empty or oversized surfaces.
    pub fn pixel_size(&self) -> RenderResult<(u32, u32)> {
        let (w, h) = (self.size.width.round(), self.size.height.round());
        if !(w >= 1.0 && h >= 1.0 && w <= u32::MAX as f64 && h <= u32::MAX as f64) {
            return Err(RendererError::Surface(format!(
                "invalid surface size {}x{}",
                self.size.width, self.size.height
            )));
        }
        Ok((w as u32, h as u32))
    }
}

/// A rendered frame: straight-alpha RGBA8, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterFrame {
    pub rgba_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RasterFrame {
    /// RGBA of one pixel. `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        self.rgba_data.get(i..i + 4)?.try_into().ok()
    }

    pub fn is_opaque(&self) -> bool {
        self.rgba_data.chunks_exact(4).all(|px| px[3] == 255)
    }
}

/// Trait for rendering backends.
pub trait Renderer {
    /// Draw one frame of the context.
    fn render(&mut self, ctx: &RenderContext) -> RenderResult<RasterFrame>;

    /// Wait for the next rendering tick so pending state changes are
    /// visible to the following `render`.
    fn next_tick(&mut self) -> RenderResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_context_drops_chrome() {
        let mut canvas = Canvas::new();
        canvas.gesture_cursor = Some(Point::new(5.0, 5.0));
        canvas.select_node("x", false);

        let screen = RenderContext::from_canvas(&canvas);
        assert_eq!(screen.grid_style, GridStyle::Dots);
        assert!(screen.selection.is_some() && screen.cursor.is_some());

        let export = RenderContext::for_export(&canvas);
        assert_eq!(export.grid_style, GridStyle::None);
        assert!(export.selection.is_none() && export.cursor.is_none());
        assert!(export.active_edge.is_none());
        assert_eq!(export.theme.background, Color::WHITE);
        assert_eq!(export.theme.label_box, Color::WHITE);
        assert_eq!(export.theme.text, Color::BLACK);
    }

    #[test]
    fn test_zero_size_rejected() {
        let graph = GraphStore::new();
        let ctx = RenderContext::new(&graph, Viewport::default(), Size::new(0.0, 10.0));
        assert!(matches!(ctx.pixel_size(), Err(RendererError::Surface(_))));
        let ctx = RenderContext::new(&graph, Viewport::default(), Size::new(3.2, 2.0));
        assert_eq!(ctx.pixel_size().unwrap(), (3, 2));
    }
}
