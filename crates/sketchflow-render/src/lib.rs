//! SketchFlow Render Library
//!
//! Renderer abstraction, a deterministic CPU rasterizer, and the export
//! pipeline that turns canvas captures into PNG stills and looping GIFs.

pub mod cpu;
pub mod export;
mod renderer;

pub use cpu::CpuRenderer;
pub use export::{ExportConfig, ExportError, ExportPipeline, ExportResult, encode_gif, encode_png};
pub use renderer::{GridStyle, RasterFrame, RenderContext, RenderResult, RenderTheme, Renderer, RendererError};
