// theme.rs - Dark theme for the visualizer overlay
use eframe::egui::{self, Color32, Context, CornerRadius, FontFamily, FontId, Margin, Visuals};

/// Black viewport with compact, dark overlay windows
pub fn apply_visualizer_theme(ctx: &Context) {
    let mut style = (*ctx.style()).clone();
    style.visuals = Visuals::dark();

    // The 3D view sits on pure black
    style.visuals.panel_fill = Color32::from_rgb(0, 0, 0);
    style.visuals.extreme_bg_color = Color32::from_rgb(12, 12, 14);

    // Overlay windows
    style.visuals.window_fill = Color32::from_rgba_unmultiplied(20, 20, 24, 235);
    style.visuals.window_corner_radius = CornerRadius::same(6);
    style.visuals.widgets.inactive.corner_radius = CornerRadius::same(4);
    style.visuals.widgets.hovered.corner_radius = CornerRadius::same(4);
    style.visuals.widgets.active.corner_radius = CornerRadius::same(4);

    // Spacing
    style.spacing.item_spacing = egui::vec2(8.0, 6.0);
    style.spacing.window_margin = Margin::same(8);
    style.spacing.slider_width = 140.0;

    style.override_font_id = Some(FontId::new(13.0, FontFamily::Proportional));

    ctx.set_style(style);
}
