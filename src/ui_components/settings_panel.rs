use eframe::egui;

use crate::scene::SceneState;

/// Values shown by the panel. They start from their own defaults and are
/// never read back from the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelValues {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub threshold: f32,
    pub strength: f32,
    pub radius: f32,
}

impl Default for PanelValues {
    fn default() -> Self {
        Self {
            red: 1.0,
            green: 1.0,
            blue: 1.0,
            threshold: 0.15,
            strength: 0.5,
            radius: 1.0,
        }
    }
}

/// A single slider edit, applied straight to the scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelChange {
    Red(f32),
    Green(f32),
    Blue(f32),
    Threshold(f32),
    Strength(f32),
    Radius(f32),
}

impl PanelChange {
    pub fn apply(self, scene: &mut SceneState) {
        log::debug!("Panel change: {:?}", self);
        match self {
            PanelChange::Red(v) => scene.uniforms.red = v,
            PanelChange::Green(v) => scene.uniforms.green = v,
            PanelChange::Blue(v) => scene.uniforms.blue = v,
            PanelChange::Threshold(v) => scene.bloom.threshold = v,
            PanelChange::Strength(v) => scene.bloom.strength = v,
            PanelChange::Radius(v) => scene.bloom.radius = v,
        }
    }
}

fn slider(
    ui: &mut egui::Ui,
    value: &mut f32,
    max: f32,
    label: &str,
    make: fn(f32) -> PanelChange,
    changes: &mut Vec<PanelChange>,
) {
    if ui
        .add(egui::Slider::new(value, 0.0..=max).text(label))
        .changed()
    {
        changes.push(make(*value));
    }
}

/// Render the settings window; returns the edits made this frame
pub fn render(ctx: &egui::Context, values: &mut PanelValues) -> Vec<PanelChange> {
    let mut changes = Vec::new();

    egui::Window::new("Controls")
        .id(egui::Id::new("visualizer_settings_window"))
        .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-10.0, 10.0))
        .resizable(false)
        .default_width(260.0)
        .show(ctx, |ui| {
            egui::CollapsingHeader::new("Colors")
                .default_open(false)
                .show(ui, |ui| {
                    slider(ui, &mut values.red, 1.0, "red", PanelChange::Red, &mut changes);
                    slider(ui, &mut values.green, 1.0, "green", PanelChange::Green, &mut changes);
                    slider(ui, &mut values.blue, 1.0, "blue", PanelChange::Blue, &mut changes);
                });

            egui::CollapsingHeader::new("Bloom")
                .default_open(false)
                .show(ui, |ui| {
                    slider(ui, &mut values.threshold, 1.0, "threshold", PanelChange::Threshold, &mut changes);
                    slider(ui, &mut values.strength, 3.0, "strength", PanelChange::Strength, &mut changes);
                    slider(ui, &mut values.radius, 1.0, "radius", PanelChange::Radius, &mut changes);
                });
        });

    changes
}
