//! Per-refresh frame driver.
//!
//! The host calls [`FrameDriver::tick`] once per display refresh. A stopped
//! driver produces nothing, which is how the render loop is torn down.

use std::time::Instant;

use crate::scene::{BloomParams, SceneState};
use crate::utils::pipeline::SceneUniforms;

/// Everything the renderer needs for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInputs {
    pub uniforms: SceneUniforms,
    pub bloom: BloomParams,
}

#[derive(Debug, Default)]
pub struct FrameDriver {
    started_at: Option<Instant>,
    frames: u64,
}

impl FrameDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the loop; the elapsed clock begins at `now`
    pub fn start(&mut self, now: Instant) {
        log::info!("Frame driver started");
        self.started_at = Some(now);
        self.frames = 0;
    }

    pub fn stop(&mut self) {
        if self.started_at.take().is_some() {
            log::info!("Frame driver stopped after {} frames", self.frames);
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Seconds since start, monotonic
    pub fn elapsed(&self, now: Instant) -> Option<f32> {
        self.started_at
            .map(|start| now.saturating_duration_since(start).as_secs_f32())
    }

    /// Advance one frame: ease the camera, refresh time and frequency, and
    /// hand back the render inputs. `None` while stopped.
    pub fn tick(
        &mut self,
        scene: &mut SceneState,
        now: Instant,
        frequency: f32,
    ) -> Option<FrameInputs> {
        let elapsed = self.elapsed(now)?;

        scene.camera.ease_toward(scene.pointer);
        scene.camera.look_at_origin();

        scene.uniforms.elapsed_time = elapsed;
        scene.uniforms.frequency = frequency.max(0.0);

        self.frames += 1;
        log::trace!(
            "frame {} t={:.3} freq={:.1} camera=({:.2}, {:.2})",
            self.frames,
            elapsed,
            scene.uniforms.frequency,
            scene.camera.position.x,
            scene.camera.position.y
        );

        Some(FrameInputs {
            uniforms: SceneUniforms::new(scene.camera.view_projection(), &scene.uniforms),
            bloom: scene.bloom,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::camera::PointerOffset;
    use std::time::Duration;

    #[test]
    fn test_stopped_driver_yields_nothing() {
        let mut driver = FrameDriver::new();
        let mut scene = SceneState::new(800.0, 600.0);
        assert!(!driver.is_running());
        assert!(driver.tick(&mut scene, Instant::now(), 10.0).is_none());
        assert_eq!(scene.uniforms.frequency, 0.0);
    }

    #[test]
    fn test_tick_updates_time_and_frequency() {
        let mut driver = FrameDriver::new();
        let mut scene = SceneState::new(800.0, 600.0);
        let start = Instant::now();
        driver.start(start);

        let frame = driver
            .tick(&mut scene, start + Duration::from_millis(1500), 42.0)
            .unwrap();
        assert!((scene.uniforms.elapsed_time - 1.5).abs() < 1e-6);
        assert_eq!(scene.uniforms.frequency, 42.0);
        assert!((frame.uniforms.time - 1.5).abs() < 1e-6);
        assert_eq!(frame.uniforms.frequency, 42.0);
    }

    #[test]
    fn test_tick_eases_camera_toward_pointer() {
        let mut driver = FrameDriver::new();
        let mut scene = SceneState::new(800.0, 600.0);
        scene.pointer = PointerOffset { x: 2.0, y: 1.0 };
        let (x0, y0) = (scene.camera.position.x, scene.camera.position.y);
        let start = Instant::now();
        driver.start(start);
        driver.tick(&mut scene, start, 0.0);

        assert!((scene.camera.position.x - (x0 + (2.0 - x0) * 0.05)).abs() < 1e-6);
        assert!((scene.camera.position.y - (y0 + (-1.0 - y0) * 0.5)).abs() < 1e-6);
        assert_eq!(scene.camera.target, glam::Vec3::ZERO);
    }

    #[test]
    fn test_stop_then_restart_resets_clock() {
        let mut driver = FrameDriver::new();
        let mut scene = SceneState::new(800.0, 600.0);
        let start = Instant::now();
        driver.start(start);
        driver.tick(&mut scene, start + Duration::from_secs(5), 0.0);

        driver.stop();
        assert!(driver.tick(&mut scene, start + Duration::from_secs(6), 0.0).is_none());

        driver.start(start + Duration::from_secs(10));
        driver.tick(&mut scene, start + Duration::from_secs(11), 0.0);
        assert!((scene.uniforms.elapsed_time - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_frequency_is_floored() {
        let mut driver = FrameDriver::new();
        let mut scene = SceneState::new(800.0, 600.0);
        let start = Instant::now();
        driver.start(start);
        driver.tick(&mut scene, start, -3.0);
        assert_eq!(scene.uniforms.frequency, 0.0);
    }

    #[test]
    fn test_bloom_params_flow_into_frame() {
        let mut driver = FrameDriver::new();
        let mut scene = SceneState::new(800.0, 600.0);
        scene.bloom.strength = 2.0;
        let start = Instant::now();
        driver.start(start);
        let frame = driver.tick(&mut scene, start, 0.0).unwrap();
        assert_eq!(frame.bloom.strength, 2.0);
    }
}
