//! Command-line entry point.

use clap::Parser;
use sketchflow_app::{AppConfig, run};
use sketchflow_render::ExportConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "sketchflow", version, about = "Render and animate SketchFlow diagrams")]
struct Cli {
    /// Diagram JSON (`{nodes, edges}`).
    diagram: PathBuf,

    /// Write a PNG still here.
    #[arg(long)]
    png: Option<PathBuf>,

    /// Write a looping GIF here.
    #[arg(long)]
    gif: Option<PathBuf>,

    /// Write a GIF that steps through the edges one at a time.
    #[arg(long)]
    walkthrough: Option<PathBuf>,

    /// Write the on-screen view, grid and cursor included, as PNG.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Replay recorded hand-landmark frames as ink before exporting.
    #[arg(long)]
    ink: Option<PathBuf>,

    /// Simplify replayed ink with this tolerance (canvas units).
    #[arg(long)]
    simplify: Option<f64>,

    /// Seconds each walkthrough step is shown.
    #[arg(long, default_value_t = 1.0)]
    step_seconds: f64,

    /// GIF frame count.
    #[arg(long, default_value_t = 20)]
    frames: u32,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 800)]
    height: u32,

    /// Draw edges solid instead of animated.
    #[arg(long, default_value_t = false)]
    static_edges: bool,

    /// Frame the whole diagram.
    #[arg(long, default_value_t = false)]
    fit: bool,
}

impl From<Cli> for AppConfig {
    fn from(cli: Cli) -> Self {
        let defaults = AppConfig::default();
        Self {
            diagram: cli.diagram,
            png: cli.png,
            gif: cli.gif,
            walkthrough: cli.walkthrough,
            preview: cli.preview,
            ink: cli.ink,
            simplify: cli.simplify,
            width: cli.width,
            height: cli.height,
            animate_edges: !cli.static_edges,
            fit: cli.fit,
            export: ExportConfig {
                frames: cli.frames,
                step_delay_ms: (cli.step_seconds.max(0.0) * 1000.0).round() as u32,
                ..defaults.export
            },
            gesture: defaults.gesture,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Starting SketchFlow");

    let config = AppConfig::from(Cli::parse());
    match run(&config) {
        Ok(report) => {
            log::info!(
                "done: {} nodes, {} edges, {} strokes, {} file(s) written",
                report.nodes,
                report.edges,
                report.strokes,
                report.written.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            eprintln!("sketchflow: {e}");
            ExitCode::FAILURE
        }
    }
}
