//! Viewport module: pan/zoom transform between screen and canvas space.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Smallest zoom reachable through [`Viewport::zoom_at`].
pub const MIN_ZOOM: f64 = 0.1;
/// Largest zoom reachable through [`Viewport::zoom_at`].
pub const MAX_ZOOM: f64 = 10.0;

/// The active pan offset and zoom factor.
///
/// `x`/`y` is where the canvas origin lands on screen, `zoom` scales canvas
/// units to pixels. Zoom must stay strictly positive; every conversion
/// divides by it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    /// Create a viewport. `zoom` must be > 0.
    pub fn new(x: f64, y: f64, zoom: f64) -> Self {
        debug_assert!(zoom > 0.0, "viewport zoom must be positive, got {zoom}");
        Self { x, y, zoom }
    }

    /// Pan offset as a vector.
    pub fn offset(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Canvas → screen transform (used by renderers).
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset()) * Affine::scale(self.zoom)
    }

    /// Screen → canvas transform (used for input handling).
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset())
    }

    /// Convert a screen point to canvas coordinates.
    pub fn to_canvas(&self, screen_point: Point) -> Point {
        to_canvas(screen_point, self)
    }

    /// Convert a canvas point to screen coordinates.
    pub fn to_screen(&self, canvas_point: Point) -> Point {
        to_screen(canvas_point, self)
    }

    /// The canvas-space rectangle visible in a surface of `size` pixels.
    pub fn visible_rect(&self, size: Size) -> Rect {
        let top_left = self.to_canvas(Point::ZERO);
        let bottom_right = self.to_canvas(Point::new(size.width, size.height));
        Rect::from_points(top_left, bottom_right)
    }

    /// Pan by a delta in screen pixels.
    pub fn pan(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
    }

    /// Zoom by `factor`, keeping `screen_point` fixed on screen.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }

        let anchor = self.to_canvas(screen_point);
        self.zoom = new_zoom;

        // Shift the pan so the anchor lands back under the cursor
        let moved = self.to_screen(anchor);
        self.x += screen_point.x - moved.x;
        self.y += screen_point.y - moved.y;
    }

    /// Reset to the identity view `{0, 0, 1}`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fit `bounds` (canvas space) inside a surface of `size` pixels.
    pub fn fit_to_bounds(&mut self, bounds: Rect, size: Size, padding: f64) {
        if bounds.is_zero_area() {
            self.reset();
            return;
        }

        let available = Size::new(
            (size.width - padding * 2.0).max(1.0),
            (size.height - padding * 2.0).max(1.0),
        );

        let scale_x = available.width / bounds.width();
        let scale_y = available.height / bounds.height();
        self.zoom = scale_x.min(scale_y).clamp(MIN_ZOOM, MAX_ZOOM);

        let center = bounds.center();
        self.x = size.width / 2.0 - center.x * self.zoom;
        self.y = size.height / 2.0 - center.y * self.zoom;
    }
}

/// `canvas = (screen - pan) / zoom`.
pub fn to_canvas(screen_point: Point, viewport: &Viewport) -> Point {
    Point::new(
        (screen_point.x - viewport.x) / viewport.zoom,
        (screen_point.y - viewport.y) / viewport.zoom,
    )
}

/// `screen = canvas * zoom + pan`.
pub fn to_screen(canvas_point: Point, viewport: &Viewport) -> Point {
    Point::new(
        canvas_point.x * viewport.zoom + viewport.x,
        canvas_point.y * viewport.zoom + viewport.y,
    )
}
