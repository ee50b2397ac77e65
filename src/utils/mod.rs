pub mod analyser;
pub mod audio;
pub mod audio_file;
pub mod audio_loader;
pub mod bloom;
pub mod camera;
pub mod errors;
pub mod mesh;
pub mod pipeline;
pub mod shader_constants;
pub mod shader_validator;
pub mod theme;

pub use errors::{Result, VisualizerError};
pub use pipeline::{VisualizerCallback, VisualizerRenderer};
pub use theme::apply_visualizer_theme;
