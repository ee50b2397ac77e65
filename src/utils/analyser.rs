//! Frequency analyser driving the `frequency` uniform
//!
//! Keeps the most recent `fft_size` mono samples and, on request, produces a
//! byte spectrum in the style of a Web Audio analyser: Blackman window, FFT,
//! magnitude smoothing over time, decibel scaling into 0..=255.
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::collections::VecDeque;
use std::sync::Arc;

// ============================================================================
// ANALYSER CONSTANTS
// ============================================================================

pub const DEFAULT_FFT_SIZE: usize = 32;
pub const DEFAULT_SMOOTHING: f32 = 0.8;

// Decibel range mapped onto 0..=255
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

// ============================================================================

pub struct FrequencyAnalyser {
    fft_size: usize,
    smoothing: f32,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    samples: VecDeque<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl FrequencyAnalyser {
    /// `fft_size` must be a power of two (the config layer enforces it)
    pub fn new(fft_size: usize, smoothing: f32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Blackman window, alpha = 0.16
        let n = fft_size as f32;
        let window = (0..fft_size)
            .map(|i| {
                let x = i as f32 / n;
                0.42 - 0.5 * (2.0 * std::f32::consts::PI * x).cos()
                    + 0.08 * (4.0 * std::f32::consts::PI * x).cos()
            })
            .collect();

        Self {
            fft_size,
            smoothing: smoothing.clamp(0.0, 1.0),
            fft,
            window,
            samples: VecDeque::from(vec![0.0; fft_size]),
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex { re: 0.0, im: 0.0 }; fft_size],
        }
    }

    /// Append mono samples, keeping only the newest `fft_size`
    pub fn push_samples(&mut self, samples: &[f32]) {
        let keep = samples.len().min(self.fft_size);
        for &s in &samples[samples.len() - keep..] {
            self.samples.pop_front();
            self.samples.push_back(s);
        }
    }

    /// Forget all history; the next spectrum reads as silence
    pub fn reset(&mut self) {
        self.samples.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|m| *m = 0.0);
    }

    /// Byte spectrum of the current window, one value per bin
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        for (i, (slot, &sample)) in self.scratch.iter_mut().zip(self.samples.iter()).enumerate() {
            *slot = Complex {
                re: sample * self.window[i],
                im: 0.0,
            };
        }
        self.fft.process(&mut self.scratch);

        let scale = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        let range = MAX_DECIBELS - MIN_DECIBELS;

        self.smoothed
            .iter_mut()
            .zip(self.scratch.iter())
            .map(|(smoothed, bin)| {
                let magnitude = bin.norm() * scale;
                *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
                if *smoothed <= 0.0 {
                    return 0;
                }
                let db = 20.0 * smoothed.log10();
                let scaled = (255.0 / range) * (db - MIN_DECIBELS);
                scaled.clamp(0.0, 255.0).floor() as u8
            })
            .collect()
    }

    /// Mean of the byte spectrum, in 0.0..=255.0
    pub fn average_frequency(&mut self) -> f32 {
        let data = self.byte_frequency_data();
        if data.is_empty() {
            return 0.0;
        }
        data.iter().map(|&v| v as f32).sum::<f32>() / data.len() as f32
    }
}
