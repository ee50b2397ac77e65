pub mod audio_controls;
pub mod settings_panel;
