mod app;
mod backdrop;
mod camera;
mod loader;
mod model;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use winit::dpi::LogicalSize;

use orrery_engine::device::GpuInit;
use orrery_engine::logging::{init_logging, LoggingConfig};
use orrery_engine::window::{Runtime, RuntimeConfig};

use crate::app::Viewer;

/// Minimal hardware-accelerated STL viewer.
#[derive(Debug, Parser)]
#[command(name = "orrery", version)]
struct Cli {
    /// Path to the model file (binary or ASCII STL).
    model: PathBuf,

    /// Window title. Defaults to the model file name.
    #[arg(long)]
    title: Option<String>,

    /// Initial window width in logical pixels.
    #[arg(long, default_value_t = 1024.0)]
    width: f64,

    /// Initial window height in logical pixels.
    #[arg(long, default_value_t = 768.0)]
    height: f64,

    /// Log filter, e.g. "info" or "orrery_viewer=debug" (overrides RUST_LOG).
    #[arg(long)]
    log: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(LoggingConfig {
        env_filter: cli.log.clone(),
        ..Default::default()
    });

    let title = cli.title.clone().unwrap_or_else(|| {
        let name = cli
            .model
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        format!("{name} - orrery")
    });

    let viewer = Viewer::new(&cli.model)?;

    Runtime::run(
        RuntimeConfig {
            title,
            initial_size: LogicalSize::new(cli.width, cli.height),
        },
        GpuInit::default(),
        viewer,
    )
}
