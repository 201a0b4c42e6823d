//! Deterministic CPU rasterizer built on tiny-skia.
//!
//! Labels are laid out as text-coloured runs, one per word, sized by
//! character count. There is no glyph shaping in this backend.

use crate::renderer::{GridStyle, RasterFrame, RenderContext, RenderResult, Renderer, RendererError};
use kurbo::{BezPath, Ellipse, PathEl, Point, Rect, RoundedRect, Shape};
use peniko::Color;
use sketchflow_core::model::{Edge, Node, Outline};
use sketchflow_core::stroke::{parse_polyline, polyline_to_bez};
use sketchflow_core::viewport::Viewport;
use std::borrow::Cow;
use tiny_skia::{FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, StrokeDash, Transform};

/// Grid spacing in canvas units.
const GRID_SIZE: f64 = 20.0;
/// Grids denser than this on screen are skipped.
const MIN_GRID_SPACING_PX: f64 = 4.0;
/// Dash used for animated edges that have no pattern of their own.
const ANIMATED_DASH: [f64; 2] = [5.0, 5.0];
/// Minimum pen width of the current walkthrough step.
const ACTIVE_EDGE_WIDTH: f64 = 5.0;
const DIMMED_EDGE_WIDTH: f64 = 1.0;
const DEFAULT_NODE_STROKE_WIDTH: f64 = 1.5;
/// Advance of one character as a fraction of the font size.
const CHAR_ADVANCE: f64 = 0.55;

/// CPU renderer.
#[derive(Debug, Clone)]
pub struct CpuRenderer {
    /// Curve flattening tolerance (canvas units).
    pub tolerance: f64,
    pub font_size: f64,
    ticks: u64,
}

impl Default for CpuRenderer {
    fn default() -> Self {
        Self {
            tolerance: 0.1,
            font_size: 12.0,
            ticks: 0,
        }
    }
}

impl CpuRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ticks waited so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn draw_grid(&self, pixmap: &mut Pixmap, ctx: &RenderContext, transform: Transform) {
        let zoom = ctx.viewport.zoom;
        if ctx.grid_style == GridStyle::None || GRID_SIZE * zoom < MIN_GRID_SPACING_PX {
            return;
        }
        let visible = ctx.viewport.visible_rect(ctx.size);
        let x_start = (visible.x0 / GRID_SIZE).floor() as i64;
        let x_end = (visible.x1 / GRID_SIZE).ceil() as i64;
        let y_start = (visible.y0 / GRID_SIZE).floor() as i64;
        let y_end = (visible.y1 / GRID_SIZE).ceil() as i64;
        let paint = paint_for(ctx.theme.grid);
        let r = 1.0 / zoom;
        for gx in x_start..=x_end {
            for gy in y_start..=y_end {
                let (x, y) = (gx as f64 * GRID_SIZE, gy as f64 * GRID_SIZE);
                if let Some(rect) = skia_rect(Rect::new(x - r, y - r, x + r, y + r)) {
                    pixmap.fill_rect(rect, &paint, transform, None);
                }
            }
        }
    }

    fn draw_edge(&self, pixmap: &mut Pixmap, ctx: &RenderContext, edge: &Edge, step: usize, transform: Transform) {
        let (Some(source), Some(target)) = (ctx.graph.node(&edge.source), ctx.graph.node(&edge.target)) else {
            return;
        };
        let route = step_route(source, target);

        let own_dash: &[f64] = if edge.style.is_dashed() {
            &edge.style.dash_pattern
        } else if edge.animated {
            &ANIMATED_DASH
        } else {
            &[]
        };
        let (color, width, pattern, text_color) = match ctx.active_edge.map(|id| id == edge.id()) {
            None => (Color::from(edge.style.stroke), edge.style.width, own_dash, ctx.theme.text),
            Some(true) => (
                ctx.theme.active_edge,
                edge.style.width.max(ACTIVE_EDGE_WIDTH),
                &[][..],
                ctx.theme.active_edge,
            ),
            Some(false) => {
                let dimmed: &[f64] = if own_dash.is_empty() { &ANIMATED_DASH } else { own_dash };
                (ctx.theme.dimmed_edge, DIMMED_EDGE_WIDTH, dimmed, ctx.theme.dimmed_edge)
            }
        };
        let stroke = Stroke {
            width: width as f32,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Round,
            dash: dash(pattern, edge.style.dash_offset),
            ..Stroke::default()
        };
        if let Some(path) = to_skia_path(&polyline_to_bez(&route, Point::ZERO)) {
            pixmap.stroke_path(&path, &paint_for(color), &stroke, transform, None);
        }

        let label: Option<Cow<'_, str>> = match (ctx.active_edge, edge.visible_label()) {
            (None, label) => label.map(Cow::Borrowed),
            (Some(_), Some(label)) => Some(Cow::Owned(format!("{}. {label}", step + 1))),
            (Some(_), None) => Some(Cow::Owned(format!("{}.", step + 1))),
        };
        if let Some(label) = label {
            let center = Point::new((route[1].x + route[2].x) / 2.0, route[1].y);
            let width = text_width(&label, self.font_size) + 8.0;
            let height = self.font_size + 6.0;
            let backing = Rect::from_center_size(center, (width, height));
            if let Some(rect) = skia_rect(backing) {
                pixmap.fill_rect(rect, &paint_for(ctx.theme.label_box), transform, None);
            }
            self.draw_text_runs(pixmap, &label, center, text_color, transform);
        }
    }

    fn draw_node(&self, pixmap: &mut Pixmap, ctx: &RenderContext, node: &Node, transform: Transform) {
        let bounds = node.bounds();
        let style = node.style.as_ref();
        let stroke_color = style
            .and_then(|s| s.stroke)
            .map(Color::from)
            .unwrap_or(ctx.theme.node_stroke);
        let stroke_width = style
            .and_then(|s| s.stroke_width)
            .unwrap_or(DEFAULT_NODE_STROKE_WIDTH);
        let fill = paint_for(ctx.theme.node_fill);
        let outline = paint_for(stroke_color);
        let stroke = Stroke {
            width: stroke_width as f32,
            ..Stroke::default()
        };

        match node.kind.geometry().outline {
            Outline::RoundedRect(radius) => {
                let shape = RoundedRect::from_rect(bounds, radius).to_path(self.tolerance);
                fill_and_stroke(pixmap, &shape, &fill, Some((&outline, &stroke)), transform);
            }
            Outline::Ellipse => {
                let shape = Ellipse::from_rect(bounds).to_path(self.tolerance);
                fill_and_stroke(pixmap, &shape, &fill, Some((&outline, &stroke)), transform);
            }
            Outline::Cylinder(cap) => {
                let cap = cap.min(bounds.height());
                let top = Rect::new(bounds.x0, bounds.y0, bounds.x1, bounds.y0 + cap);
                let bottom = Rect::new(bounds.x0, bounds.y1 - cap, bounds.x1, bounds.y1);
                let body = Rect::new(bounds.x0, top.center().y, bounds.x1, bottom.center().y);

                let bottom_cap = Ellipse::from_rect(bottom).to_path(self.tolerance);
                fill_and_stroke(pixmap, &bottom_cap, &fill, Some((&outline, &stroke)), transform);
                fill_and_stroke(pixmap, &body.to_path(self.tolerance), &fill, None, transform);
                let mut sides = BezPath::new();
                sides.move_to((body.x0, body.y0));
                sides.line_to((body.x0, body.y1));
                sides.move_to((body.x1, body.y0));
                sides.line_to((body.x1, body.y1));
                if let Some(path) = to_skia_path(&sides) {
                    pixmap.stroke_path(&path, &outline, &stroke, transform, None);
                }
                let top_cap = Ellipse::from_rect(top).to_path(self.tolerance);
                fill_and_stroke(pixmap, &top_cap, &fill, Some((&outline, &stroke)), transform);
            }
            Outline::Ink => {
                let Some(points) = node.data.path.as_deref().and_then(parse_polyline) else {
                    log::warn!("annotation {} has no drawable path", node.id());
                    return;
                };
                let ink = Stroke {
                    width: stroke_width as f32,
                    line_cap: LineCap::Round,
                    line_join: LineJoin::Round,
                    ..Stroke::default()
                };
                if let Some(path) = to_skia_path(&polyline_to_bez(&points, node.position)) {
                    pixmap.stroke_path(&path, &outline, &ink, transform, None);
                }
                return;
            }
            Outline::Bare => {}
        }

        self.draw_text_runs(pixmap, node.label(), bounds.center(), ctx.theme.text, transform);
    }

    /// Lay out `text` centred on `center` as one filled run per word.
    fn draw_text_runs(&self, pixmap: &mut Pixmap, text: &str, center: Point, color: Color, transform: Transform) {
        let advance = self.font_size * CHAR_ADVANCE;
        let total = text_width(text, self.font_size);
        if total <= 0.0 {
            return;
        }
        let paint = paint_for(color);
        let run_height = self.font_size * 0.6;
        let mut x = center.x - total / 2.0;
        for word in text.split_whitespace() {
            let width = word.chars().count() as f64 * advance;
            let run = Rect::new(x, center.y - run_height / 2.0, x + width, center.y + run_height / 2.0);
            if let Some(rect) = skia_rect(run) {
                pixmap.fill_rect(rect, &paint, transform, None);
            }
            x += width + advance;
        }
    }

    fn draw_selection(&self, pixmap: &mut Pixmap, ctx: &RenderContext, transform: Transform) {
        let Some(selection) = ctx.selection else {
            return;
        };
        let paint = paint_for(ctx.theme.selection);
        let stroke = Stroke {
            width: (2.0 / ctx.viewport.zoom) as f32,
            ..Stroke::default()
        };
        for node in selection.nodes.iter().filter_map(|id| ctx.graph.node(id)) {
            let outline = node.bounds().inflate(4.0, 4.0).to_path(self.tolerance);
            if let Some(path) = to_skia_path(&outline) {
                pixmap.stroke_path(&path, &paint, &stroke, transform, None);
            }
        }
    }

    fn draw_cursor(&self, pixmap: &mut Pixmap, ctx: &RenderContext) {
        let Some(cursor) = ctx.cursor else {
            return;
        };
        if let Some(path) = PathBuilder::from_circle(cursor.x as f32, cursor.y as f32, 6.0) {
            pixmap.fill_path(&path, &paint_for(ctx.theme.cursor), FillRule::Winding, Transform::identity(), None);
        }
    }
}

impl Renderer for CpuRenderer {
    fn render(&mut self, ctx: &RenderContext) -> RenderResult<RasterFrame> {
        let (width, height) = ctx.pixel_size()?;
        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| RendererError::Surface(format!("cannot allocate {width}x{height} pixmap")))?;
        pixmap.fill(skia_color(ctx.theme.background));
        let transform = viewport_transform(&ctx.viewport);

        self.draw_grid(&mut pixmap, ctx, transform);
        for (step, edge) in ctx.graph.edges().iter().enumerate() {
            self.draw_edge(&mut pixmap, ctx, edge, step, transform);
        }
        for node in ctx.graph.nodes().iter() {
            self.draw_node(&mut pixmap, ctx, node, transform);
        }
        self.draw_selection(&mut pixmap, ctx, transform);
        self.draw_cursor(&mut pixmap, ctx);

        let rgba_data = pixmap
            .pixels()
            .iter()
            .flat_map(|px| {
                let c = px.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        Ok(RasterFrame {
            rgba_data,
            width,
            height,
        })
    }

    fn next_tick(&mut self) -> RenderResult<()> {
        self.ticks += 1;
        Ok(())
    }
}

/// Orthogonal route from the bottom of `source` to the top of `target`.
fn step_route(source: &Node, target: &Node) -> [Point; 4] {
    let (sb, tb) = (source.bounds(), target.bounds());
    let start = Point::new(sb.center().x, sb.y1);
    let end = Point::new(tb.center().x, tb.y0);
    let mid_y = (start.y + end.y) / 2.0;
    [start, Point::new(start.x, mid_y), Point::new(end.x, mid_y), end]
}

/// Laid-out width: the words plus one advance between neighbours.
fn text_width(text: &str, font_size: f64) -> f64 {
    let (words, chars) = text
        .split_whitespace()
        .fold((0usize, 0usize), |(w, c), word| (w + 1, c + word.chars().count()));
    let cells = (chars + words.saturating_sub(1)) as f64;
    cells * font_size * CHAR_ADVANCE
}

/// An odd-length pattern is repeated, as SVG does.
fn dash(pattern: &[f64], offset: f64) -> Option<StrokeDash> {
    if pattern.is_empty() {
        return None;
    }
    let mut array: Vec<f32> = pattern.iter().map(|v| *v as f32).collect();
    if array.len() % 2 == 1 {
        array.extend_from_within(..);
    }
    let dash = StrokeDash::new(array, offset as f32);
    if dash.is_none() {
        log::debug!("unusable dash pattern {pattern:?}; drawing solid");
    }
    dash
}

fn fill_and_stroke(
    pixmap: &mut Pixmap,
    shape: &BezPath,
    fill: &Paint,
    outline: Option<(&Paint, &Stroke)>,
    transform: Transform,
) {
    let Some(path) = to_skia_path(shape) else {
        return;
    };
    pixmap.fill_path(&path, fill, FillRule::Winding, transform, None);
    if let Some((paint, stroke)) = outline {
        pixmap.stroke_path(&path, paint, stroke, transform, None);
    }
}

fn viewport_transform(viewport: &Viewport) -> Transform {
    let zoom = viewport.zoom as f32;
    Transform::from_row(zoom, 0.0, 0.0, zoom, viewport.x as f32, viewport.y as f32)
}

fn to_skia_path(path: &BezPath) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for element in path.elements() {
        match *element {
            PathEl::MoveTo(p) => builder.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => builder.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(p1, p2) => builder.quad_to(p1.x as f32, p1.y as f32, p2.x as f32, p2.y as f32),
            PathEl::CurveTo(p1, p2, p3) => builder.cubic_to(
                p1.x as f32,
                p1.y as f32,
                p2.x as f32,
                p2.y as f32,
                p3.x as f32,
                p3.y as f32,
            ),
            PathEl::ClosePath => builder.close(),
        }
    }
    builder.finish()
}

fn skia_rect(rect: Rect) -> Option<tiny_skia::Rect> {
    tiny_skia::Rect::from_ltrb(rect.x0 as f32, rect.y0 as f32, rect.x1 as f32, rect.y1 as f32)
}

fn skia_color(color: Color) -> tiny_skia::Color {
    let c = color.to_rgba8();
    tiny_skia::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn paint_for(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(skia_color(color));
    paint.anti_alias = true;
    paint
}
