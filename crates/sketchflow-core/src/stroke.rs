//! Freehand stroke capture and vectorization.
//!
//! A stroke is collected in canvas space between a draw-start and a
//! draw-end, then committed as a non-interactive annotation node whose
//! path is stored relative to the stroke's bounding-box origin.

use crate::graph::{GraphResult, GraphStore};
use crate::model::{Node, NodeData, NodeId, NodeKind, NodeStyle, SerializableColor, fresh_id};
use crate::viewport::Viewport;
use kurbo::{BezPath, Line, ParamCurveNearest, Point, Rect};

/// Capture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Capturing,
}

/// Ink applied to committed strokes.
#[derive(Debug, Clone, PartialEq)]
pub struct InkStyle {
    pub color: SerializableColor,
    pub width: f64,
}

impl Default for InkStyle {
    fn default() -> Self {
        Self {
            color: SerializableColor::new(0xdc, 0x26, 0x26, 255),
            width: 3.0,
        }
    }
}

/// A stroke reduced to an origin, a size and a relative path.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPath {
    /// Top-left corner of the bounding box (canvas space).
    pub origin: Point,
    pub width: f64,
    pub height: f64,
    /// `M x0,y0 L x1,y1 ...` relative to `origin`.
    pub path: String,
}

/// Accumulates pointer samples into a stroke.
#[derive(Debug, Clone, Default)]
pub struct StrokeCapture {
    state: CaptureState,
    points: Vec<Point>,
    /// Ramer-Douglas-Peucker tolerance for the emitted path (canvas units).
    simplify_tolerance: Option<f64>,
    pub ink: InkStyle,
}

impl StrokeCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simplify committed paths with the given tolerance.
    pub fn with_simplify(mut self, tolerance: f64) -> Self {
        self.simplify_tolerance = (tolerance > 0.0).then_some(tolerance);
        self
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_capturing(&self) -> bool {
        self.state == CaptureState::Capturing
    }

    /// Canvas-space points captured so far.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Begin a stroke at a screen position. Restarts any stroke in progress.
    pub fn start(&mut self, screen_point: Point, viewport: &Viewport) {
        self.points.clear();
        self.points.push(viewport.to_canvas(screen_point));
        self.state = CaptureState::Capturing;
    }

    /// Add a screen position. Ignored unless capturing.
    pub fn append(&mut self, screen_point: Point, viewport: &Viewport) {
        if self.is_capturing() {
            self.points.push(viewport.to_canvas(screen_point));
        }
    }

    /// Abandon the stroke in progress without committing it.
    pub fn cancel(&mut self) {
        if self.is_capturing() {
            log::debug!("stroke abandoned with {} points", self.points.len());
        }
        self.points.clear();
        self.state = CaptureState::Idle;
    }

    /// End the stroke and commit it as an annotation node.
    ///
    /// Returns `Ok(None)` when nothing was committed (not capturing, or a
    /// single-point tap).
    pub fn finish(&mut self, graph: &mut GraphStore) -> GraphResult<Option<NodeId>> {
        if !self.is_capturing() {
            return Ok(None);
        }
        self.state = CaptureState::Idle;
        let points = std::mem::take(&mut self.points);

        let Some(vector) = vectorize(&points, self.simplify_tolerance) else {
            log::debug!("discarding stroke with {} point(s)", points.len());
            return Ok(None);
        };

        let id = fresh_id("draw");
        let node = Node {
            id: id.clone(),
            kind: NodeKind::Annotation,
            position: vector.origin,
            data: NodeData {
                label: String::new(),
                icon: None,
                path: Some(vector.path),
                width: Some(vector.width),
                height: Some(vector.height),
            },
            style: Some(NodeStyle {
                stroke: Some(self.ink.color),
                stroke_width: Some(self.ink.width),
                ..NodeStyle::default()
            }),
            interactive: Some(false),
        };
        graph.add_node(node)?;
        log::info!("committed stroke {id} ({} points)", points.len());
        Ok(Some(id))
    }
}

/// Tight bounding box of a point set.
pub fn bounding_box(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    Some(
        points
            .iter()
            .skip(1)
            .fold(Rect::from_points(*first, *first), |acc, p| acc.union_pt(*p)),
    )
}

/// Turn a canvas-space polyline into a [`VectorPath`]. Needs at least 2 points.
///
/// The box covers every input point; simplification only thins the path.
pub fn vectorize(points: &[Point], simplify_tolerance: Option<f64>) -> Option<VectorPath> {
    if points.len() < 2 {
        return None;
    }
    let bounds = bounding_box(points)?;
    let origin = bounds.origin();

    let emitted = match simplify_tolerance {
        Some(tolerance) => rdp_simplify(points, tolerance),
        None => points.to_vec(),
    };

    let path = emitted
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let command = if i == 0 { 'M' } else { 'L' };
            format!("{command} {},{}", p.x - origin.x, p.y - origin.y)
        })
        .collect::<Vec<_>>()
        .join(" ");

    Some(VectorPath {
        origin,
        // Degenerate strokes still get a 1x1 box
        width: bounds.width().max(1.0),
        height: bounds.height().max(1.0),
        path,
    })
}

/// Parse a path produced by [`vectorize`] back into points.
pub fn parse_polyline(path: &str) -> Option<Vec<Point>> {
    let mut points = Vec::new();
    let mut expect_move = true;
    let mut tokens = path.split_whitespace();

    while let Some(command) = tokens.next() {
        match (command, expect_move) {
            ("M", true) | ("L", false) => {}
            _ => return None,
        }
        expect_move = false;
        let (x, y) = tokens.next()?.split_once(',')?;
        points.push(Point::new(x.parse().ok()?, y.parse().ok()?));
    }

    (!points.is_empty()).then_some(points)
}

/// Polyline as a kurbo path, offset by `origin`.
pub fn polyline_to_bez(points: &[Point], origin: Point) -> BezPath {
    let mut path = BezPath::new();
    let offset = origin.to_vec2();
    if let Some((first, rest)) = points.split_first() {
        path.move_to(*first + offset);
        for p in rest {
            path.line_to(*p + offset);
        }
    }
    path
}

/// Ramer-Douglas-Peucker line simplification.
fn rdp_simplify(points: &[Point], tolerance: f64) -> Vec<Point> {
    let Some(last) = points.len().checked_sub(1).filter(|&n| n >= 2) else {
        return points.to_vec();
    };
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;

    let mut spans = vec![(0, last)];
    while let Some((start, end)) = spans.pop() {
        let chord = Line::new(points[start], points[end]);
        let farthest = (start + 1..end)
            .map(|i| (i, distance_to_segment(chord, points[i])))
            .max_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((i, distance)) = farthest {
            if distance > tolerance {
                keep[i] = true;
                spans.push((start, i));
                spans.push((i, end));
            }
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(point, kept)| kept.then_some(*point))
        .collect()
}

/// Distance to the segment, not the infinite line: strokes double back.
fn distance_to_segment(segment: Line, point: Point) -> f64 {
    if segment.p0 == segment.p1 {
        return point.distance(segment.p0);
    }
    segment.nearest(point, 1e-9).distance_sq.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(points: &[(f64, f64)], viewport: &Viewport) -> StrokeCapture {
        let mut stroke = StrokeCapture::new();
        let mut iter = points.iter();
        if let Some(&(x, y)) = iter.next() {
            stroke.start(Point::new(x, y), viewport);
        }
        for &(x, y) in iter {
            stroke.append(Point::new(x, y), viewport);
        }
        stroke
    }

    #[test]
    fn test_append_ignored_when_idle() {
        let mut stroke = StrokeCapture::new();
        stroke.append(Point::new(1.0, 1.0), &Viewport::default());
        assert!(stroke.points().is_empty());
        assert_eq!(stroke.state(), CaptureState::Idle);
    }

    #[test]
    fn test_single_point_is_discarded() {
        let mut graph = GraphStore::new();
        let mut stroke = capture(&[(5.0, 5.0)], &Viewport::default());
        assert!(stroke.is_capturing());
        assert_eq!(stroke.finish(&mut graph).unwrap(), None);
        assert!(graph.is_empty());
        assert_eq!(stroke.state(), CaptureState::Idle);
    }

    #[test]
    fn test_commit_creates_tight_annotation() {
        let viewport = Viewport::new(100.0, 50.0, 2.0);
        let screen = [(120.0, 70.0), (180.0, 60.0), (140.0, 150.0)];
        let mut graph = GraphStore::new();
        let mut stroke = capture(&screen, &viewport);
        let canvas: Vec<Point> = stroke.points().to_vec();

        let id = stroke.finish(&mut graph).unwrap().unwrap();
        assert_eq!(graph.node_count(), 1);

        let node = graph.node(&id).unwrap();
        assert_eq!(node.kind, NodeKind::Annotation);
        assert!(!node.is_interactive());
        // Canvas points: (10,10), (40,5), (20,50)
        assert_eq!(node.position, Point::new(10.0, 5.0));
        assert_eq!(node.data.width, Some(30.0));
        assert_eq!(node.data.height, Some(45.0));
        assert_eq!(node.data.path.as_deref(), Some("M 0,5 L 30,0 L 10,45"));

        let bounds = node.bounds();
        for p in canvas {
            assert!(p.x >= bounds.x0 && p.x <= bounds.x1);
            assert!(p.y >= bounds.y0 && p.y <= bounds.y1);
        }
    }

    #[test]
    fn test_degenerate_stroke_gets_unit_box() {
        let mut graph = GraphStore::new();
        let mut stroke = capture(&[(7.0, 7.0), (7.0, 7.0)], &Viewport::default());
        let id = stroke.finish(&mut graph).unwrap().unwrap();
        let node = graph.node(&id).unwrap();
        assert_eq!(node.data.width, Some(1.0));
        assert_eq!(node.data.height, Some(1.0));
    }

    #[test]
    fn test_cancel_abandons_stroke() {
        let mut graph = GraphStore::new();
        let mut stroke = capture(&[(0.0, 0.0), (10.0, 10.0)], &Viewport::default());
        stroke.cancel();
        assert_eq!(stroke.finish(&mut graph).unwrap(), None);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_parse_polyline_roundtrip() {
        let points = vec![Point::new(0.0, 2.5), Point::new(12.0, 0.0), Point::new(3.0, 9.0)];
        let vector = vectorize(&points, None).unwrap();
        let parsed = parse_polyline(&vector.path).unwrap();
        assert_eq!(parsed, points);
        assert!(parse_polyline("L 1,2").is_none());
        assert!(parse_polyline("M 1;2").is_none());
        assert!(parse_polyline("").is_none());
    }

    #[test]
    fn test_simplify_keeps_bounds() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.1),
            Point::new(2.0, 0.0),
            Point::new(3.0, 0.1),
            Point::new(4.0, 0.0),
        ];
        let vector = vectorize(&points, Some(0.5)).unwrap();
        assert_eq!(vector.path, "M 0,0 L 4,0");
        assert!((vector.width - 4.0).abs() < f64::EPSILON);
        // The 0.1 wobble is gone from the path but still inside the box
        assert!((vector.height - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_simplify_keeps_turnaround() {
        // Out and back along one line: the far end is off the chord segment
        let points = [Point::new(0.0, 0.0), Point::new(5.0, 0.0), Point::new(10.0, 0.0), Point::new(2.0, 0.0)];
        assert_eq!(
            rdp_simplify(&points, 0.5),
            vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(2.0, 0.0)]
        );
        assert_eq!(rdp_simplify(&points[..2], 0.5), points[..2].to_vec());
    }
}
