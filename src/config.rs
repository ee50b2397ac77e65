//! Startup configuration
//!
//! Read once from `$VISUALIZER_CONFIG` or `<config_dir>/audio-visualizer/config.json`.
//! Every field is optional; anything missing or invalid falls back to the
//! built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::analyser::{DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING};
use crate::utils::{Result, VisualizerError};

pub const CONFIG_ENV_VAR: &str = "VISUALIZER_CONFIG";
const CONFIG_DIR_NAME: &str = "audio-visualizer";
const CONFIG_FILE_NAME: &str = "config.json";

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32768;

/// Tone mapping applied by the output pass before writing to the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToneMapping {
    #[default]
    None,
    Reinhard,
    Aces,
}

impl ToneMapping {
    /// Selector value understood by `output.wgsl`
    pub fn shader_index(self) -> u32 {
        match self {
            ToneMapping::None => 0,
            ToneMapping::Reinhard => 1,
            ToneMapping::Aces => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    pub window_width: f32,
    pub window_height: f32,
    /// Track decoded when no file is chosen within the grace window
    pub default_track: PathBuf,
    pub grace_window_ms: u64,
    pub initial_volume: f32,
    pub loop_playback: bool,
    pub tone_mapping: ToneMapping,
    /// Analyser window; must be a power of two in 32..=32768
    pub analyser_fft_size: usize,
    pub analyser_smoothing: f32,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            window_width: 1280.0,
            window_height: 720.0,
            default_track: PathBuf::from("audio/Beats.mp3"),
            grace_window_ms: 1000,
            initial_volume: 1.0,
            loop_playback: false,
            tone_mapping: ToneMapping::None,
            analyser_fft_size: DEFAULT_FFT_SIZE,
            analyser_smoothing: DEFAULT_SMOOTHING,
        }
    }
}

impl VisualizerConfig {
    /// Parse a JSON config, filling missing fields with defaults
    pub fn from_json(json_str: &str) -> std::result::Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(json_str)?;
        Ok(config.sanitized())
    }

    /// Location of the config file, if one can be determined
    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| VisualizerError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text).map_err(|e| VisualizerError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load the config, never failing: problems are logged and defaults used
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            log::debug!("No config directory available, using defaults");
            return Self::default();
        };

        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    pub fn grace_window(&self) -> Duration {
        Duration::from_millis(self.grace_window_ms)
    }

    fn sanitized(mut self) -> Self {
        let fft = self.analyser_fft_size;
        if !fft.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft) {
            log::warn!(
                "analyser_fft_size {} is not a power of two in {}..={}, using {}",
                fft,
                MIN_FFT_SIZE,
                MAX_FFT_SIZE,
                MIN_FFT_SIZE
            );
            self.analyser_fft_size = MIN_FFT_SIZE;
        }
        self.analyser_smoothing = self.analyser_smoothing.clamp(0.0, 1.0);
        if self.window_width < 1.0 || self.window_height < 1.0 {
            let defaults = Self::default();
            self.window_width = defaults.window_width;
            self.window_height = defaults.window_height;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = VisualizerConfig::from_json("{}").unwrap();
        assert_eq!(config, VisualizerConfig::default());
        assert_eq!(config.grace_window(), Duration::from_secs(1));
        assert_eq!(config.default_track, PathBuf::from("audio/Beats.mp3"));
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let config = VisualizerConfig::from_json(
            r#"{ "default_track": "music/loop.ogg", "tone_mapping": "aces", "loop_playback": true }"#,
        )
        .unwrap();
        assert_eq!(config.default_track, PathBuf::from("music/loop.ogg"));
        assert_eq!(config.tone_mapping, ToneMapping::Aces);
        assert!(config.loop_playback);
        assert_eq!(config.analyser_fft_size, 32);
        assert_eq!(config.grace_window_ms, 1000);
    }

    #[test]
    fn test_invalid_fft_size_falls_back() {
        let config = VisualizerConfig::from_json(r#"{ "analyser_fft_size": 100 }"#).unwrap();
        assert_eq!(config.analyser_fft_size, 32);

        let config = VisualizerConfig::from_json(r#"{ "analyser_fft_size": 2048 }"#).unwrap();
        assert_eq!(config.analyser_fft_size, 2048);
    }

    #[test]
    fn test_smoothing_is_clamped() {
        let config = VisualizerConfig::from_json(r#"{ "analyser_smoothing": 4.0 }"#).unwrap();
        assert_eq!(config.analyser_smoothing, 1.0);
    }

    #[test]
    fn test_unknown_tone_mapping_is_an_error() {
        assert!(VisualizerConfig::from_json(r#"{ "tone_mapping": "filmic" }"#).is_err());
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = VisualizerConfig::load_from(Path::new("/definitely/not/here/config.json"));
        assert!(matches!(result, Err(VisualizerError::Io { .. })));
    }

    #[test]
    fn test_tone_mapping_shader_index() {
        assert_eq!(ToneMapping::None.shader_index(), 0);
        assert_eq!(ToneMapping::Reinhard.shader_index(), 1);
        assert_eq!(ToneMapping::Aces.shader_index(), 2);
    }
}
