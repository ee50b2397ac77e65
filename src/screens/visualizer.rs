use eframe::egui;
use std::time::Instant;

use crate::config::VisualizerConfig;
use crate::ui_components::audio_controls::{self, AudioControlsAction};
use crate::ui_components::settings_panel::{self, PanelValues};
use crate::utils::audio::open_output;
use crate::utils::audio_file::AudioInput;
use crate::utils::{VisualizerCallback, VisualizerRenderer};
use crate::visualizer::Visualizer;

pub struct VisualizerApp {
    visualizer: Visualizer,
    panel: PanelValues,
    volume: f32,
    renderer_ready: bool,
    renderer_error: Option<String>,
}

impl VisualizerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: VisualizerConfig) -> Self {
        log::info!("Initializing VisualizerApp...");

        let output = open_output(config.initial_volume, config.loop_playback);
        let visualizer = Visualizer::new(&config, output, Instant::now());

        let mut renderer_ready = false;
        let mut renderer_error = None;
        if let Some(render_state) = cc.wgpu_render_state.as_ref() {
            match VisualizerRenderer::new(
                &render_state.device,
                render_state.target_format,
                config.tone_mapping,
            ) {
                Ok(renderer) => {
                    render_state
                        .renderer
                        .write()
                        .callback_resources
                        .insert(renderer);
                    renderer_ready = true;
                }
                Err(err) => {
                    log::error!("Renderer setup failed, running without 3D view: {}", err);
                    renderer_error = Some(err.to_string());
                }
            }
        } else {
            log::error!("wgpu render state unavailable, running without 3D view");
            renderer_error = Some("wgpu renderer unavailable".to_string());
        }

        log::info!("VisualizerApp initialization complete");
        Self {
            visualizer,
            panel: PanelValues::default(),
            volume: config.initial_volume,
            renderer_ready,
            renderer_error,
        }
    }

    /// The last file dropped onto the window replaces the current track
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        let Some(file) = dropped.into_iter().last() else {
            return;
        };

        let input = if let Some(path) = file.path {
            AudioInput::File(path)
        } else if let Some(bytes) = file.bytes {
            AudioInput::Bytes {
                name: file.name,
                bytes,
            }
        } else {
            log::warn!("Dropped file {} has neither path nor contents", file.name);
            return;
        };
        self.visualizer.select_file(input);
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context, now: Instant) {
        if ctx.input(|i| i.key_pressed(egui::Key::P)) {
            if self.visualizer.is_running() {
                self.visualizer.stop();
            } else {
                self.visualizer.start(now);
            }
        }
    }

    fn show_viewport(&mut self, ctx: &egui::Context, now: Instant) {
        egui::CentralPanel::default()
            .frame(egui::Frame::default().fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let rect = ui.max_rect();
                let response = ui.allocate_rect(rect, egui::Sense::click());

                self.visualizer.resize(rect.width(), rect.height());
                if let Some(pos) = ctx.input(|i| i.pointer.latest_pos()) {
                    self.visualizer
                        .pointer_moved(pos.x - rect.min.x, pos.y - rect.min.y);
                }
                if response.clicked() {
                    self.visualizer.viewport_clicked();
                }

                let Some(frame) = self.visualizer.frame(now) else {
                    return;
                };

                if self.renderer_ready {
                    let ppp = ctx.pixels_per_point();
                    let cb = VisualizerCallback {
                        frame,
                        mesh: self.visualizer.scene().mesh().clone(),
                        target_size: [
                            (rect.width() * ppp).round() as u32,
                            (rect.height() * ppp).round() as u32,
                        ],
                    };
                    ui.painter()
                        .add(egui_wgpu::Callback::new_paint_callback(rect, cb));
                } else if let Some(err) = &self.renderer_error {
                    ui.centered_and_justified(|ui| {
                        ui.label(
                            egui::RichText::new(err)
                                .monospace()
                                .color(egui::Color32::from_rgb(230, 110, 110)),
                        );
                    });
                }
            });
    }
}

impl eframe::App for VisualizerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        self.visualizer.poll_audio(now);
        self.handle_dropped_files(ctx);
        self.handle_shortcuts(ctx, now);

        // Panel edits land before this frame's render inputs are built
        for change in settings_panel::render(ctx, &mut self.panel) {
            change.apply(self.visualizer.scene_mut());
        }

        let status = self.visualizer.status();
        match audio_controls::render(ctx, &mut self.volume, &status, self.visualizer.frequency()) {
            AudioControlsAction::OpenFile(path) => {
                self.visualizer.select_file(AudioInput::File(path));
            }
            AudioControlsAction::SetVolume(volume) => self.visualizer.set_volume(volume),
            AudioControlsAction::None => {}
        }

        self.show_viewport(ctx, now);

        if self.visualizer.is_running() {
            ctx.request_repaint();
        }
    }
}

impl Drop for VisualizerApp {
    fn drop(&mut self) {
        self.visualizer.stop();
        log::info!("VisualizerApp shut down");
    }
}
