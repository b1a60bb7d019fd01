mod app;
mod config;
mod display;
mod pages;
mod render;
mod timer;
mod types;
mod viewer;

use anyhow::{Context as AnyhowContext, Result};
use eframe::{egui, run_native, NativeOptions};
use std::env;
use std::path::PathBuf;

use app::MangaApp;

fn main() -> Result<()> {
    env_logger::init();

    let open_path = env::args_os().nth(1).map(PathBuf::from);
    let config = config::load_config()
        .context("Failed to load configuration")?
        .resolve(open_path);

    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([config.window.width, config.window.height])
        .with_title("Manga Viewer")
        .with_maximized(config.window.maximized);

    let native_options = NativeOptions {
        viewport,
        ..Default::default()
    };

    run_native(
        "Manga Viewer",
        native_options,
        Box::new(|cc| Ok(Box::new(MangaApp::new(cc, config)))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to start application: {}", e))
}
