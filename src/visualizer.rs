//! The visualizer core: scene, frame driver, audio and loader wired together.
//!
//! The eframe app forwards window events here and asks for one frame per
//! refresh. Nothing in this module touches the GPU or a real audio device,
//! so the whole event flow runs in tests.

use std::time::Instant;

use log::{error, info};

use crate::config::VisualizerConfig;
use crate::frame_driver::{FrameDriver, FrameInputs};
use crate::scene::SceneState;
use crate::utils::analyser::FrequencyAnalyser;
use crate::utils::audio::{AudioOutput, AudioSource, TrackOrigin};
use crate::utils::audio_file::AudioInput;
use crate::utils::audio_loader::{AudioLoader, LoadEvent};

/// What the audio side is doing, for the status line
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackStatus {
    Idle,
    Loading(String),
    /// Default track decoded; a click on the viewport starts it
    WaitingForClick(String),
    Playing(String),
    Stopped(String),
    Failed(String),
}

pub struct Visualizer {
    scene: SceneState,
    driver: FrameDriver,
    audio: AudioSource,
    loader: AudioLoader,
    analyser: FrequencyAnalyser,
    play_on_click: bool,
    last_failure: Option<String>,
}

impl Visualizer {
    /// Build the visualizer and start its frame driver at `now`
    pub fn new(config: &VisualizerConfig, output: Box<dyn AudioOutput>, now: Instant) -> Self {
        let mut driver = FrameDriver::new();
        driver.start(now);

        Self {
            scene: SceneState::new(config.window_width, config.window_height),
            driver,
            audio: AudioSource::new(output, config.initial_volume),
            loader: AudioLoader::new(config.default_track.clone(), config.grace_window(), now),
            analyser: FrequencyAnalyser::new(config.analyser_fft_size, config.analyser_smoothing),
            play_on_click: false,
            last_failure: None,
        }
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneState {
        &mut self.scene
    }

    pub fn resize(&mut self, width: f32, height: f32) -> bool {
        self.scene.resize(width, height)
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        self.scene.pointer_moved(x, y);
    }

    /// A click on the viewport plays the current buffer once the default
    /// track has armed click-to-play
    pub fn viewport_clicked(&mut self) -> bool {
        if !self.play_on_click {
            return false;
        }
        self.audio.play()
    }

    /// Stop and drop whatever is active, then decode `input`
    pub fn select_file(&mut self, input: AudioInput) -> u64 {
        info!("Audio file selected: {}", input.label());
        self.audio.clear();
        self.last_failure = None;
        self.loader.select(input)
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.audio.set_volume(volume);
    }

    /// Apply finished decodes; starts the grace-window default load when due
    pub fn poll_audio(&mut self, now: Instant) {
        while let Some(event) = self.loader.poll(now) {
            match event {
                LoadEvent::Ready {
                    origin: TrackOrigin::UserFile,
                    audio,
                    ..
                } => {
                    self.audio.set_buffer(audio, TrackOrigin::UserFile);
                    self.audio.play();
                }
                LoadEvent::Ready {
                    origin: TrackOrigin::DefaultTrack,
                    audio,
                    ..
                } => {
                    info!("Default track ready: {} (click to play)", audio.name);
                    self.audio.set_buffer(audio, TrackOrigin::DefaultTrack);
                    self.play_on_click = true;
                }
                LoadEvent::Failed {
                    ticket,
                    origin,
                    label,
                    error,
                } => {
                    error!("Load #{} ({:?}) of {} failed: {}", ticket, origin, label, error);
                    self.last_failure = Some(format!("{}: {}", label, error));
                }
            }
        }
    }

    /// Render inputs for this refresh, `None` while the driver is stopped
    pub fn frame(&mut self, now: Instant) -> Option<FrameInputs> {
        if !self.driver.is_running() {
            return None;
        }
        let frequency = self.audio.average_frequency(&mut self.analyser);
        self.driver.tick(&mut self.scene, now, frequency)
    }

    pub fn start(&mut self, now: Instant) {
        self.driver.start(now);
    }

    pub fn stop(&mut self) {
        self.driver.stop();
    }

    pub fn is_running(&self) -> bool {
        self.driver.is_running()
    }

    /// Last frequency pushed into the uniforms
    pub fn frequency(&self) -> f32 {
        self.scene.uniforms.frequency
    }

    pub fn status(&self) -> PlaybackStatus {
        if let Some(label) = self.loader.pending_label() {
            return PlaybackStatus::Loading(label.to_string());
        }
        match self.audio.track() {
            Some((audio, _)) if self.audio.is_playing() => PlaybackStatus::Playing(audio.name.clone()),
            Some((audio, TrackOrigin::DefaultTrack)) if self.play_on_click => {
                PlaybackStatus::WaitingForClick(audio.name.clone())
            }
            Some((audio, _)) => PlaybackStatus::Stopped(audio.name.clone()),
            None => match &self.last_failure {
                Some(message) => PlaybackStatus::Failed(message.clone()),
                None => PlaybackStatus::Idle,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::audio::tests::{Event, RecordingOutput};
    use crate::utils::audio_file::tests::{wav_bytes, wav_input};
    use std::path::PathBuf;
    use std::time::Duration;

    fn config() -> VisualizerConfig {
        VisualizerConfig {
            window_width: 800.0,
            window_height: 600.0,
            default_track: PathBuf::from("/no/such/Beats.mp3"),
            ..VisualizerConfig::default()
        }
    }

    fn poll_until(vis: &mut Visualizer, now: Instant, done: impl Fn(&Visualizer) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done(vis) {
            assert!(Instant::now() < deadline, "condition never reached");
            std::thread::sleep(Duration::from_millis(5));
            vis.poll_audio(now);
        }
    }

    #[test]
    fn test_frequency_is_zero_without_buffer() {
        let (output, _) = RecordingOutput::new();
        let start = Instant::now();
        let mut vis = Visualizer::new(&config(), Box::new(output), start);
        let frame = vis.frame(start + Duration::from_millis(16)).unwrap();
        assert_eq!(frame.uniforms.frequency, 0.0);
        assert_eq!(vis.status(), PlaybackStatus::Idle);
    }

    #[test]
    fn test_selected_file_plays_and_drives_frequency() {
        let (output, _) = RecordingOutput::new();
        let start = Instant::now();
        let mut vis = Visualizer::new(&config(), Box::new(output), start);

        vis.select_file(wav_input("song.wav", 400));
        assert_eq!(vis.status(), PlaybackStatus::Loading("song.wav".into()));
        poll_until(&mut vis, start, |v| {
            v.status() == PlaybackStatus::Playing("song.wav".into())
        });

        let frame = vis.frame(start + Duration::from_millis(16)).unwrap();
        assert!(frame.uniforms.frequency > 0.0);
    }

    #[test]
    fn test_new_selection_stops_previous_buffer_first() {
        let (output, events) = RecordingOutput::new();
        let start = Instant::now();
        let mut vis = Visualizer::new(&config(), Box::new(output), start);

        vis.select_file(wav_input("a.wav", 200));
        poll_until(&mut vis, start, |v| v.status() == PlaybackStatus::Playing("a.wav".into()));

        vis.select_file(wav_input("b.wav", 200));
        // Previous buffer is silenced before the new decode even finishes
        let frame = vis.frame(start).unwrap();
        assert_eq!(frame.uniforms.frequency, 0.0);

        poll_until(&mut vis, start, |v| v.status() == PlaybackStatus::Playing("b.wav".into()));

        let events = events.borrow();
        let play_a = events.iter().position(|e| *e == Event::Play("a.wav".into())).unwrap();
        let play_b = events.iter().position(|e| *e == Event::Play("b.wav".into())).unwrap();
        assert!(events[play_a..play_b].contains(&Event::Stop));
    }

    #[test]
    fn test_default_track_waits_for_click() {
        let path = std::env::temp_dir().join(format!("visualizer-click-{}.wav", std::process::id()));
        std::fs::write(&path, wav_bytes(8000, 1, &[2000; 800])).unwrap();

        let (output, _) = RecordingOutput::new();
        let start = Instant::now();
        let cfg = VisualizerConfig {
            default_track: path.clone(),
            ..config()
        };
        let mut vis = Visualizer::new(&cfg, Box::new(output), start);

        assert!(!vis.viewport_clicked());
        let later = start + Duration::from_millis(1000);
        poll_until(&mut vis, later, |v| {
            matches!(v.status(), PlaybackStatus::WaitingForClick(_))
        });
        std::fs::remove_file(&path).ok();

        assert_eq!(vis.frame(later).unwrap().uniforms.frequency, 0.0);
        assert!(vis.viewport_clicked());
        assert!(matches!(vis.status(), PlaybackStatus::Playing(_)));
    }

    #[test]
    fn test_failed_default_load_keeps_running() {
        let (output, _) = RecordingOutput::new();
        let start = Instant::now();
        let mut vis = Visualizer::new(&config(), Box::new(output), start);
        let later = start + Duration::from_secs(2);
        poll_until(&mut vis, later, |v| matches!(v.status(), PlaybackStatus::Failed(_)));

        let frame = vis.frame(later).unwrap();
        assert_eq!(frame.uniforms.frequency, 0.0);
        assert!(!vis.viewport_clicked());
    }

    #[test]
    fn test_color_change_reaches_next_frame() {
        let (output, _) = RecordingOutput::new();
        let start = Instant::now();
        let mut vis = Visualizer::new(&config(), Box::new(output), start);

        vis.scene_mut().uniforms.red = 0.7;
        vis.scene_mut().bloom.strength = 2.0;
        let frame = vis.frame(start).unwrap();
        assert_eq!(frame.uniforms.color[0], 0.7);
        assert_eq!(frame.bloom.strength, 2.0);
    }

    #[test]
    fn test_stopped_visualizer_produces_no_frame() {
        let (output, _) = RecordingOutput::new();
        let start = Instant::now();
        let mut vis = Visualizer::new(&config(), Box::new(output), start);
        assert!(vis.is_running());
        vis.stop();
        assert!(vis.frame(start).is_none());
        vis.start(start);
        assert!(vis.frame(start).is_some());
    }

    #[test]
    fn test_volume_passes_through() {
        let (output, events) = RecordingOutput::new();
        let mut vis = Visualizer::new(&config(), Box::new(output), Instant::now());
        vis.set_volume(0.25);
        assert_eq!(events.borrow().last(), Some(&Event::Volume(0.25)));
    }
}
