//! SketchFlow application shell.
//!
//! Loads a diagram, optionally replays recorded hand-landmark frames as
//! ink, and writes PNG / GIF exports of the resulting canvas.

use kurbo::Size;
use sketchflow_core::canvas::Canvas;
use sketchflow_core::generation::{GenerationError, GenerationResponse};
use sketchflow_core::gesture::{EventQueue, GestureConfig, GestureRecognizer, GestureSession, ReplaySource};
use sketchflow_core::graph::GraphError;
use sketchflow_core::stroke::StrokeCapture;
use sketchflow_render::{
    CpuRenderer, ExportConfig, ExportError, ExportPipeline, RenderContext, Renderer, RendererError, encode_png,
};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid diagram: {0}")]
    Diagram(#[from] GenerationError),
    #[error("Invalid landmark recording: {0}")]
    Landmarks(#[from] serde_json::Error),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl From<RendererError> for AppError {
    fn from(e: RendererError) -> Self {
        AppError::Export(ExportError::Render(e))
    }
}

/// Run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub diagram: PathBuf,
    pub png: Option<PathBuf>,
    pub gif: Option<PathBuf>,
    /// Step-by-step GIF, one frame per edge.
    pub walkthrough: Option<PathBuf>,
    /// The on-screen view (grid, selection, gesture cursor) as PNG.
    pub preview: Option<PathBuf>,
    /// Recorded landmark frames to replay as gesture ink.
    pub ink: Option<PathBuf>,
    /// Simplification tolerance for replayed ink, in canvas units.
    pub simplify: Option<f64>,
    pub width: u32,
    pub height: u32,
    pub animate_edges: bool,
    /// Frame the whole diagram instead of the default view.
    pub fit: bool,
    pub export: ExportConfig,
    pub gesture: GestureConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            diagram: PathBuf::from("diagram.json"),
            png: None,
            gif: None,
            walkthrough: None,
            preview: None,
            ink: None,
            simplify: None,
            width: 1280,
            height: 800,
            animate_edges: true,
            fit: false,
            export: ExportConfig::default(),
            gesture: GestureConfig::default(),
        }
    }
}

/// Summary of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub nodes: usize,
    pub edges: usize,
    pub strokes: usize,
    pub written: Vec<PathBuf>,
}

/// Execute one load / replay / export cycle.
pub fn run(config: &AppConfig) -> Result<RunReport, AppError> {
    let (mut canvas, strokes) = prepare_canvas(config)?;
    let mut report = RunReport {
        nodes: canvas.graph.node_count(),
        edges: canvas.graph.edge_count(),
        strokes,
        written: Vec::new(),
    };

    let mut renderer = CpuRenderer::new();
    if let Some(path) = &config.preview {
        let frame = renderer.render(&RenderContext::from_canvas(&canvas))?;
        write(path, &encode_png(&frame)?)?;
        report.written.push(path.clone());
    }

    let mut pipeline = ExportPipeline::new(config.export.clone());
    if let Some(path) = &config.png {
        let data = pipeline.export_png(&mut canvas, &mut renderer)?;
        write(path, &data)?;
        report.written.push(path.clone());
    }
    if let Some(path) = &config.gif {
        let data = pipeline.export_gif(&mut canvas, &mut renderer)?;
        write(path, &data)?;
        report.written.push(path.clone());
    }
    if let Some(path) = &config.walkthrough {
        let data = pipeline.export_walkthrough_gif(&mut canvas, &mut renderer)?;
        write(path, &data)?;
        report.written.push(path.clone());
    }

    if report.written.is_empty() {
        log::warn!("no output requested; pass --png, --gif, --walkthrough or --preview");
    }
    Ok(report)
}

/// Load the diagram and replay any ink. Returns the canvas and the number
/// of strokes committed.
fn prepare_canvas(config: &AppConfig) -> Result<(Canvas, usize), AppError> {
    let mut canvas = Canvas::new();
    canvas.set_viewport_size(Size::new(config.width as f64, config.height as f64));
    canvas.set_animate_edges(config.animate_edges);
    if let Some(tolerance) = config.simplify {
        canvas.stroke = StrokeCapture::new().with_simplify(tolerance);
    }

    let diagram = read_to_string(&config.diagram)?;
    canvas.ingest_generation(GenerationResponse::from_json(&diagram)?)?;
    if config.fit {
        canvas.fit_to_content();
    }

    let strokes = match &config.ink {
        Some(path) => replay_ink(&mut canvas, path, &config.gesture)?,
        None => 0,
    };
    Ok((canvas, strokes))
}

/// Feed a landmark recording through the recognizer into the canvas.
/// Returns how many strokes were committed.
fn replay_ink(canvas: &mut Canvas, path: &Path, gesture: &GestureConfig) -> Result<usize, AppError> {
    let source = ReplaySource::from_json(&read_to_string(path)?)?;
    log::info!("replaying {} landmark frames from {}", source.remaining(), path.display());

    let recognizer = GestureRecognizer::new(GestureConfig {
        screen_size: canvas.viewport_size,
        ..gesture.clone()
    });
    let queue = EventQueue::new();
    recognizer.listener_slot().set(queue.clone());

    let mut session = GestureSession::new(source, recognizer);
    let mut strokes = 0;
    while session.step().is_some() {
        for event in queue.drain() {
            if canvas.apply_gesture_event(event)?.is_some() {
                strokes += 1;
            }
        }
    }

    // Recording ended; a pinch still held is abandoned
    session.close();
    canvas.close_gesture_input();
    Ok(strokes)
}

fn read_to_string(path: &Path) -> Result<String, AppError> {
    fs::read_to_string(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, data: &[u8]) -> Result<(), AppError> {
    fs::write(path, data).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("wrote {}", path.display());
    Ok(())
}
