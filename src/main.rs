use eframe::{egui, NativeOptions};

mod config;
mod frame_driver;
mod scene;
mod screens;
mod ui_components;
mod utils;
mod visualizer;

const APP_NAME: &str = "Audio Visualizer";
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<(), eframe::Error> {
    // Set RUST_LOG=debug for verbose output, RUST_LOG=trace for per-frame logs
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("wgpu_core", log::LevelFilter::Warn)
        .filter_module("wgpu_hal", log::LevelFilter::Warn)
        .filter_module("naga", log::LevelFilter::Warn)
        .init();

    log::info!("[Main] Starting {} v{}", APP_NAME, APP_VERSION);

    let config = config::VisualizerConfig::load();

    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_NAME)
            .with_inner_size([config.window_width, config.window_height])
            .with_drag_and_drop(true),
        renderer: eframe::Renderer::Wgpu,
        ..Default::default()
    };

    eframe::run_native(
        APP_NAME,
        options,
        Box::new(move |cc| {
            utils::apply_visualizer_theme(&cc.egui_ctx);
            Ok(Box::new(screens::visualizer::VisualizerApp::new(cc, config)))
        }),
    )
}
