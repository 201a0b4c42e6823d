//! Still (PNG) and animated (GIF) export of the canvas.
//!
//! Every mode captures the current view through a [`Renderer`] with the
//! export theme and no chrome. Edge animation state is saved up front and
//! put back afterwards whether or not the capture succeeded.
//!
//! Two animations are available: marching dashes along every edge, and a
//! walkthrough that steps through the edges in order, one frame each.

use crate::renderer::{RasterFrame, RenderContext, Renderer, RendererError};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use sketchflow_core::canvas::Canvas;
use sketchflow_core::model::EdgeId;
use thiserror::Error;

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Capture failed: {0}")]
    Render(#[from] RendererError),
    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),
    #[error("GIF encoding failed: {0}")]
    Gif(#[from] image::ImageError),
    #[error("Frame buffer does not match {width}x{height}")]
    FrameSize { width: u32, height: u32 },
    #[error("An export is already in progress")]
    Busy,
    #[error("Animated export needs at least one frame")]
    NoFrames,
    #[error("Walkthrough export needs at least one edge")]
    NoEdges,
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Animated export settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    pub frames: u32,
    /// Dash offset advance per frame.
    pub step: f64,
    pub frame_delay_ms: u32,
    /// How long each walkthrough step stays on screen.
    pub step_delay_ms: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            frames: 20,
            step: 1.0,
            frame_delay_ms: 100,
            step_delay_ms: 1000,
        }
    }
}

/// Per-edge `(id, animated, dash_offset)` captured before an export.
type SavedAnimation = Vec<(EdgeId, bool, f64)>;

/// Drives renders of a canvas and encodes them.
#[derive(Debug, Default)]
pub struct ExportPipeline {
    pub config: ExportConfig,
    saved: Option<SavedAnimation>,
}

impl ExportPipeline {
    pub fn new(config: ExportConfig) -> Self {
        Self { config, saved: None }
    }

    /// Whether an export holds saved animation state.
    pub fn is_busy(&self) -> bool {
        self.saved.is_some()
    }

    /// Capture the current view as a single frame with edge animation
    /// paused.
    pub fn capture_still(&mut self, canvas: &mut Canvas, renderer: &mut dyn Renderer) -> ExportResult<RasterFrame> {
        self.save(canvas)?;
        canvas.graph.set_edges_animated(false);
        let result = renderer
            .next_tick()
            .and_then(|()| renderer.render(&RenderContext::for_export(canvas)));
        self.restore(canvas);
        if let Err(e) = &result {
            log::error!("still export aborted: {e}");
        }
        Ok(result?)
    }

    /// Capture one frame per dash offset `0, -step, -2*step, ...`.
    pub fn capture_animation(
        &mut self,
        canvas: &mut Canvas,
        renderer: &mut dyn Renderer,
    ) -> ExportResult<Vec<RasterFrame>> {
        if self.config.frames == 0 {
            return Err(ExportError::NoFrames);
        }
        self.save(canvas)?;
        let result = self.capture_frames(canvas, renderer);
        self.restore(canvas);
        if let Err(e) = &result {
            log::error!("animated export aborted: {e}");
        }
        Ok(result?)
    }

    /// Capture one frame per edge, in store order, with that edge
    /// emphasised. Edge animation is paused throughout.
    pub fn capture_walkthrough(
        &mut self,
        canvas: &mut Canvas,
        renderer: &mut dyn Renderer,
    ) -> ExportResult<Vec<RasterFrame>> {
        let steps: Vec<EdgeId> = canvas.graph.edges().iter().map(|e| e.id().to_string()).collect();
        if steps.is_empty() {
            return Err(ExportError::NoEdges);
        }
        self.save(canvas)?;
        canvas.graph.set_edges_animated(false);
        let result = capture_steps(canvas, renderer, &steps);
        self.restore(canvas);
        if let Err(e) = &result {
            log::error!("walkthrough export aborted: {e}");
        }
        Ok(result?)
    }

    /// Still export encoded as PNG.
    pub fn export_png(&mut self, canvas: &mut Canvas, renderer: &mut dyn Renderer) -> ExportResult<Vec<u8>> {
        let frame = self.capture_still(canvas, renderer)?;
        let png = encode_png(&frame)?;
        log::info!("exported {}x{} PNG ({} bytes)", frame.width, frame.height, png.len());
        Ok(png)
    }

    /// Animated export encoded as an endlessly looping GIF.
    pub fn export_gif(&mut self, canvas: &mut Canvas, renderer: &mut dyn Renderer) -> ExportResult<Vec<u8>> {
        let frames = self.capture_animation(canvas, renderer)?;
        let gif = encode_gif(&frames, self.config.frame_delay_ms)?;
        log::info!("exported {}-frame GIF ({} bytes)", frames.len(), gif.len());
        Ok(gif)
    }

    /// Walkthrough export encoded as an endlessly looping GIF.
    pub fn export_walkthrough_gif(
        &mut self,
        canvas: &mut Canvas,
        renderer: &mut dyn Renderer,
    ) -> ExportResult<Vec<u8>> {
        let frames = self.capture_walkthrough(canvas, renderer)?;
        let gif = encode_gif(&frames, self.config.step_delay_ms)?;
        log::info!("exported {}-step walkthrough GIF ({} bytes)", frames.len(), gif.len());
        Ok(gif)
    }

    fn capture_frames(&self, canvas: &mut Canvas, renderer: &mut dyn Renderer) -> ExportResult<Vec<RasterFrame>> {
        let mut frames = Vec::with_capacity(self.config.frames as usize);
        for i in 0..self.config.frames {
            canvas.graph.set_edge_dash_offset(-(i as f64) * self.config.step);
            renderer.next_tick()?;
            frames.push(renderer.render(&RenderContext::for_export(canvas))?);
        }
        Ok(frames)
    }

    fn save(&mut self, canvas: &Canvas) -> ExportResult<()> {
        if self.saved.is_some() {
            return Err(ExportError::Busy);
        }
        self.saved = Some(
            canvas
                .graph
                .edges()
                .iter()
                .map(|e| (e.id().to_string(), e.animated, e.style.dash_offset))
                .collect(),
        );
        Ok(())
    }

    fn restore(&mut self, canvas: &mut Canvas) {
        if let Some(saved) = self.saved.take() {
            canvas.graph.restore_edge_animation(&saved);
        }
    }
}

fn capture_steps(canvas: &Canvas, renderer: &mut dyn Renderer, steps: &[EdgeId]) -> ExportResult<Vec<RasterFrame>> {
    let mut frames = Vec::with_capacity(steps.len());
    for id in steps {
        renderer.next_tick()?;
        frames.push(renderer.render(&RenderContext::for_export(canvas).with_active_edge(id))?);
    }
    Ok(frames)
}

/// Encode a frame as an 8-bit RGBA PNG.
pub fn encode_png(frame: &RasterFrame) -> ExportResult<Vec<u8>> {
    check_size(frame)?;
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, frame.width, frame.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&frame.rgba_data)?;
        writer.finish()?;
    }
    Ok(png_data)
}

/// Encode frames as a GIF that loops forever.
pub fn encode_gif(frames: &[RasterFrame], frame_delay_ms: u32) -> ExportResult<Vec<u8>> {
    if frames.is_empty() {
        return Err(ExportError::NoFrames);
    }
    let mut gif_data = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut gif_data);
        encoder.set_repeat(Repeat::Infinite)?;
        for frame in frames {
            let image = RgbaImage::from_raw(frame.width, frame.height, frame.rgba_data.clone()).ok_or(
                ExportError::FrameSize {
                    width: frame.width,
                    height: frame.height,
                },
            )?;
            let delay = Delay::from_numer_denom_ms(frame_delay_ms, 1);
            encoder.encode_frame(Frame::from_parts(image, 0, 0, delay))?;
        }
    }
    Ok(gif_data)
}

fn check_size(frame: &RasterFrame) -> ExportResult<()> {
    if frame.rgba_data.len() != frame.width as usize * frame.height as usize * 4 {
        return Err(ExportError::FrameSize {
            width: frame.width,
            height: frame.height,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuRenderer;
    use crate::renderer::{GridStyle, RenderResult};
    use image::AnimationDecoder;
    use image::codecs::gif::GifDecoder;
    use kurbo::{Point, Size};
    use peniko::Color;
    use sketchflow_core::generation::GenerationResponse;
    use sketchflow_core::model::{Edge, Node, NodeKind};
    use std::io::Cursor;

    /// Records what each capture saw; optionally fails at one frame.
    #[derive(Default)]
    struct Recording {
        offsets: Vec<f64>,
        animated: Vec<bool>,
        active: Vec<Option<String>>,
        ticks: usize,
        fail_at: Option<usize>,
    }

    impl Renderer for Recording {
        fn render(&mut self, ctx: &RenderContext) -> RenderResult<RasterFrame> {
            if self.fail_at == Some(self.offsets.len()) {
                return Err(RendererError::RenderFailed("device lost".into()));
            }
            assert_eq!(ctx.theme.background, Color::WHITE);
            assert_eq!(ctx.grid_style, GridStyle::None);
            assert!(ctx.selection.is_none() && ctx.cursor.is_none());
            let edge = &ctx.graph.edges()[0];
            self.offsets.push(edge.style.dash_offset);
            self.animated.push(edge.animated);
            self.active.push(ctx.active_edge.map(str::to_string));
            Ok(RasterFrame {
                rgba_data: vec![255; 4 * 4],
                width: 2,
                height: 2,
            })
        }

        fn next_tick(&mut self) -> RenderResult<()> {
            self.ticks += 1;
            Ok(())
        }
    }

    fn canvas() -> Canvas {
        let mut canvas = Canvas::new();
        canvas
            .ingest_generation(GenerationResponse {
                nodes: vec![
                    Node::new("A", NodeKind::Service, Point::new(10.0, 10.0), "A"),
                    Node::new("B", NodeKind::Service, Point::new(10.0, 120.0), "B"),
                ],
                edges: vec![Edge::new("e", "A", "B")],
            })
            .unwrap();
        canvas.graph.set_edge_dash_offset(7.0);
        canvas.gesture_cursor = Some(Point::new(1.0, 1.0));
        canvas.select_node("A", false);
        canvas.set_viewport_size(Size::new(200.0, 200.0));
        canvas
    }

    fn edge_state(canvas: &Canvas) -> (bool, f64) {
        let edge = &canvas.graph.edges()[0];
        (edge.animated, edge.style.dash_offset)
    }

    #[test]
    fn test_animation_offsets_per_frame() {
        let mut canvas = canvas();
        let mut renderer = Recording::default();
        let frames = ExportPipeline::default()
            .capture_animation(&mut canvas, &mut renderer)
            .unwrap();
        assert_eq!(frames.len(), 20);
        assert_eq!(renderer.ticks, 20);
        let expected: Vec<f64> = (0..20).map(|i| -(i as f64)).collect();
        assert_eq!(renderer.offsets, expected);
        assert_eq!(edge_state(&canvas), (true, 7.0));
    }

    #[test]
    fn test_still_pauses_then_restores() {
        let mut canvas = canvas();
        let mut renderer = Recording::default();
        let mut pipeline = ExportPipeline::default();
        let png = pipeline.export_png(&mut canvas, &mut renderer).unwrap();
        assert_eq!(renderer.animated, vec![false]);
        assert_eq!(renderer.ticks, 1);
        assert_eq!(edge_state(&canvas), (true, 7.0));
        assert!(!pipeline.is_busy());
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn test_failure_aborts_and_restores() {
        let mut canvas = canvas();
        let mut renderer = Recording {
            fail_at: Some(5),
            ..Recording::default()
        };
        let mut pipeline = ExportPipeline::default();
        let err = pipeline.export_gif(&mut canvas, &mut renderer).unwrap_err();
        assert!(matches!(err, ExportError::Render(_)));
        assert_eq!(renderer.offsets.len(), 5);
        assert_eq!(edge_state(&canvas), (true, 7.0));
        assert!(!pipeline.is_busy());

        // Pipeline is usable again
        renderer.fail_at = None;
        assert!(pipeline.export_gif(&mut canvas, &mut renderer).is_ok());
    }

    #[test]
    fn test_still_failure_restores() {
        let mut canvas = canvas();
        let mut renderer = Recording {
            fail_at: Some(0),
            ..Recording::default()
        };
        let mut pipeline = ExportPipeline::default();
        let err = pipeline.export_png(&mut canvas, &mut renderer).unwrap_err();
        assert!(matches!(err, ExportError::Render(_)));
        assert_eq!(edge_state(&canvas), (true, 7.0));
        assert!(!pipeline.is_busy());
    }

    #[test]
    fn test_busy_pipeline_rejects_export() {
        let mut canvas = canvas();
        let mut pipeline = ExportPipeline::default();
        pipeline.saved = Some(Vec::new());
        let err = pipeline
            .export_png(&mut canvas, &mut Recording::default())
            .unwrap_err();
        assert!(matches!(err, ExportError::Busy));
    }

    #[test]
    fn test_gif_has_every_frame_and_loops() {
        let mut canvas = canvas();
        canvas.set_viewport_size(Size::new(64.0, 160.0));
        let gif = ExportPipeline::default()
            .export_gif(&mut canvas, &mut CpuRenderer::new())
            .unwrap();
        let decoder = GifDecoder::new(Cursor::new(gif)).unwrap();
        let frames = decoder.into_frames().collect_frames().unwrap();
        assert_eq!(frames.len(), 20);
        assert_eq!(frames[0].buffer().dimensions(), (64, 160));
    }

    fn three_step_canvas() -> Canvas {
        let mut canvas = Canvas::new();
        canvas
            .ingest_generation(GenerationResponse {
                nodes: vec![
                    Node::new("A", NodeKind::Actor, Point::new(10.0, 10.0), "A"),
                    Node::new("B", NodeKind::Service, Point::new(10.0, 120.0), "B"),
                    Node::new("C", NodeKind::Store, Point::new(10.0, 230.0), "C"),
                ],
                edges: vec![
                    Edge::new("s2", "B", "C").with_label("persist"),
                    Edge::new("s1", "A", "B").with_label("request"),
                    Edge::new("s3", "C", "A"),
                ],
            })
            .unwrap();
        canvas.set_viewport_size(Size::new(200.0, 320.0));
        canvas
    }

    #[test]
    fn test_walkthrough_one_frame_per_edge_in_order() {
        let mut canvas = three_step_canvas();
        let mut renderer = Recording::default();
        let mut pipeline = ExportPipeline::default();
        let frames = pipeline.capture_walkthrough(&mut canvas, &mut renderer).unwrap();
        assert_eq!(frames.len(), canvas.graph.edge_count());
        assert_eq!(renderer.ticks, 3);
        let active: Vec<_> = renderer.active.iter().map(|a| a.as_deref()).collect();
        assert_eq!(active, vec![Some("s2"), Some("s1"), Some("s3")]);
        // Paused while stepping, restored afterwards
        assert_eq!(renderer.animated, vec![false; 3]);
        assert!(canvas.graph.edges().iter().all(|e| e.animated));
        assert!(!pipeline.is_busy());
    }

    #[test]
    fn test_walkthrough_frames_differ_per_step() {
        let mut canvas = three_step_canvas();
        let frames = ExportPipeline::default()
            .capture_walkthrough(&mut canvas, &mut CpuRenderer::new())
            .unwrap();
        assert_ne!(frames[0], frames[1]);
        assert_ne!(frames[1], frames[2]);

        let gif = ExportPipeline::default()
            .export_walkthrough_gif(&mut canvas, &mut CpuRenderer::new())
            .unwrap();
        let decoded = GifDecoder::new(Cursor::new(gif))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(decoded.len(), 3);
    }

    #[test]
    fn test_walkthrough_without_edges_rejected() {
        let mut canvas = Canvas::new();
        let mut pipeline = ExportPipeline::default();
        let err = pipeline
            .capture_walkthrough(&mut canvas, &mut Recording::default())
            .unwrap_err();
        assert!(matches!(err, ExportError::NoEdges));
        assert!(!pipeline.is_busy());
    }

    #[test]
    fn test_walkthrough_failure_restores() {
        let mut canvas = three_step_canvas();
        canvas.graph.set_edge_dash_offset(3.0);
        let mut renderer = Recording {
            fail_at: Some(1),
            ..Recording::default()
        };
        let mut pipeline = ExportPipeline::default();
        assert!(pipeline.export_walkthrough_gif(&mut canvas, &mut renderer).is_err());
        assert!(canvas.graph.edges().iter().all(|e| e.animated && e.style.dash_offset == 3.0));
        assert!(!pipeline.is_busy());
    }

    #[test]
    fn test_zero_frames_rejected() {
        let mut canvas = canvas();
        let mut pipeline = ExportPipeline::new(ExportConfig {
            frames: 0,
            ..ExportConfig::default()
        });
        assert!(matches!(
            pipeline.export_gif(&mut canvas, &mut Recording::default()),
            Err(ExportError::NoFrames)
        ));
        assert!(!pipeline.is_busy());
    }

    #[test]
    fn test_png_rejects_short_buffer() {
        let frame = RasterFrame {
            rgba_data: vec![0; 3],
            width: 1,
            height: 1,
        };
        assert!(matches!(encode_png(&frame), Err(ExportError::FrameSize { .. })));
    }
}
