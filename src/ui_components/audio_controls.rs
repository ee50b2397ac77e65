use eframe::egui;
use std::path::PathBuf;

use crate::visualizer::PlaybackStatus;

/// Actions that can be triggered from the Audio window
#[derive(Debug, Clone, PartialEq)]
pub enum AudioControlsAction {
    OpenFile(PathBuf),
    SetVolume(f32),
    None,
}

/// Status line text and color
pub fn status_text(status: &PlaybackStatus) -> (String, egui::Color32) {
    let dim = egui::Color32::from_rgb(140, 140, 150);
    let good = egui::Color32::from_rgb(120, 220, 120);
    match status {
        PlaybackStatus::Idle => ("No audio loaded".to_string(), dim),
        PlaybackStatus::Loading(name) => (format!("Loading {}...", name), dim),
        PlaybackStatus::WaitingForClick(name) => {
            (format!("{} ready, click the view to play", name), egui::Color32::from_rgb(220, 200, 120))
        }
        PlaybackStatus::Playing(name) => (format!("Playing {}", name), good),
        PlaybackStatus::Stopped(name) => (format!("Stopped: {}", name), dim),
        PlaybackStatus::Failed(message) => (message.clone(), egui::Color32::from_rgb(230, 110, 110)),
    }
}

/// Render the Audio window: file input, volume slider and live level
pub fn render(
    ctx: &egui::Context,
    volume: &mut f32,
    status: &PlaybackStatus,
    frequency: f32,
) -> AudioControlsAction {
    let mut action = AudioControlsAction::None;

    egui::Window::new("Audio")
        .id(egui::Id::new("visualizer_audio_window"))
        .anchor(egui::Align2::LEFT_TOP, egui::vec2(10.0, 10.0))
        .resizable(false)
        .default_width(260.0)
        .show(ctx, |ui| {
            egui::Frame::group(ui.style())
                .fill(egui::Color32::from_rgb(25, 25, 30))
                .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(60, 60, 70)))
                .corner_radius(6.0)
                .inner_margin(12.0)
                .show(ui, |ui| {
                    if ui
                        .add_sized(
                            [ui.available_width(), 30.0],
                            egui::Button::new(egui::RichText::new("Load Audio File...").size(13.0)),
                        )
                        .clicked()
                    {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Audio", &["mp3", "wav", "ogg", "flac"])
                            .pick_file()
                        {
                            action = AudioControlsAction::OpenFile(path);
                        }
                    }

                    ui.add_space(8.0);

                    if ui
                        .add(egui::Slider::new(volume, 0.0..=1.0).text("Volume"))
                        .changed()
                    {
                        action = AudioControlsAction::SetVolume(*volume);
                    }

                    ui.add_space(8.0);

                    let (text, color) = status_text(status);
                    ui.label(egui::RichText::new(text).size(12.0).color(color));

                    ui.add(
                        egui::ProgressBar::new((frequency / 255.0).clamp(0.0, 1.0))
                            .text(format!("{:.1}", frequency))
                            .desired_width(ui.available_width()),
                    );
                });
        });

    action
}
