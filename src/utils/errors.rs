use thiserror::Error;

/// Errors surfaced by the visualizer.
///
/// Only audio decoding fails at runtime; the remaining variants cover
/// startup (config, shaders, output device).
#[derive(Debug, Error)]
pub enum VisualizerError {
    #[error("failed to read audio from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {name}: {message}")]
    Decode { name: String, message: String },

    #[error("{0} contains no audio samples")]
    EmptyAudio(String),

    #[error("decode of {0} was cancelled")]
    Cancelled(String),

    #[error("shader error:\n{0}")]
    Shader(String),

    #[error("invalid config {path}: {message}")]
    Config { path: String, message: String },

    #[error("audio output unavailable: {0}")]
    AudioOutput(String),
}

pub type Result<T> = std::result::Result<T, VisualizerError>;
