use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

use log::{debug, error, info, trace, warn};

use super::analyser::FrequencyAnalyser;
use super::audio_file::DecodedAudio;
use super::errors::{Result, VisualizerError};

/// Mono frames per block sent from the mixer thread to the analyser
const TAP_BLOCK_FRAMES: usize = 256;
/// Blocks buffered before the tap starts dropping (UI not draining)
const TAP_QUEUE_BLOCKS: usize = 64;

/// Playback backend seam
///
/// The real implementation drives a `rodio` sink; tests substitute a
/// recorder.
pub trait AudioOutput {
    /// Start `audio` from the beginning
    fn play(&mut self, audio: &DecodedAudio);
    fn stop(&mut self);
    fn set_volume(&mut self, volume: f32);
    fn is_playing(&self) -> bool;
    /// Move any samples heard since the last call into the analyser
    fn drain_into(&mut self, analyser: &mut FrequencyAnalyser);
}

/// Wrapper that taps the samples handed to the mixer, downmixes them to mono,
/// applies the playback gain and ships them off in blocks for analysis.
struct TappedSource<I> {
    inner: I,
    tx: SyncSender<Vec<f32>>,
    gain: Arc<AtomicU32>,
    channels: u16,
    frame_sum: f32,
    frame_pos: u16,
    block: Vec<f32>,
}

impl<I> TappedSource<I>
where
    I: rodio::Source<Item = f32>,
{
    fn new(inner: I, tx: SyncSender<Vec<f32>>, gain: Arc<AtomicU32>) -> Self {
        let channels = inner.channels().max(1);
        Self {
            inner,
            tx,
            gain,
            channels,
            frame_sum: 0.0,
            frame_pos: 0,
            block: Vec::with_capacity(TAP_BLOCK_FRAMES),
        }
    }

    fn flush(&mut self) {
        let block = std::mem::replace(&mut self.block, Vec::with_capacity(TAP_BLOCK_FRAMES));
        match self.tx.try_send(block) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => trace!("Analyser queue full, dropping block"),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

impl<I> Iterator for TappedSource<I>
where
    I: rodio::Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.inner.next()?;

        self.frame_sum += sample;
        self.frame_pos += 1;
        if self.frame_pos == self.channels {
            let gain = f32::from_bits(self.gain.load(Ordering::Relaxed));
            self.block.push(self.frame_sum / self.channels as f32 * gain);
            self.frame_sum = 0.0;
            self.frame_pos = 0;
            if self.block.len() >= TAP_BLOCK_FRAMES {
                self.flush();
            }
        }

        Some(sample)
    }
}

impl<I> rodio::Source for TappedSource<I>
where
    I: rodio::Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<std::time::Duration> {
        self.inner.total_duration()
    }
}

/// Queue between the mixer thread and the analyser, plus the gain the
/// tapped samples are scaled by
pub struct AnalyserTap {
    tx: SyncSender<Vec<f32>>,
    rx: Receiver<Vec<f32>>,
    gain: Arc<AtomicU32>,
}

impl AnalyserTap {
    pub fn new(queue_blocks: usize, volume: f32) -> Self {
        let (tx, rx) = mpsc::sync_channel(queue_blocks);
        Self {
            tx,
            rx,
            gain: Arc::new(AtomicU32::new(volume.to_bits())),
        }
    }

    pub fn set_volume(&self, volume: f32) {
        self.gain.store(volume.to_bits(), Ordering::Relaxed);
    }

    /// Playable source for `audio`. The tap sits outside the repeat so every
    /// loop pass is analysed as it is mixed.
    pub fn source(
        &self,
        audio: &DecodedAudio,
        looping: bool,
    ) -> Box<dyn rodio::Source<Item = f32> + Send> {
        let samples = audio.samples.to_vec();
        let buffer = rodio::buffer::SamplesBuffer::new(audio.channels, audio.sample_rate, samples);
        if looping {
            Box::new(TappedSource::new(
                rodio::Source::repeat_infinite(buffer),
                self.tx.clone(),
                self.gain.clone(),
            ))
        } else {
            Box::new(TappedSource::new(buffer, self.tx.clone(), self.gain.clone()))
        }
    }

    /// Drop everything still queued
    pub fn discard(&self) {
        while self.rx.try_recv().is_ok() {}
    }

    pub fn drain_into(&self, analyser: &mut FrequencyAnalyser) {
        for block in self.rx.try_iter() {
            analyser.push_samples(&block);
        }
    }
}

/// Playback through the default output device
pub struct RodioOutput {
    _stream: rodio::OutputStream,
    handle: rodio::OutputStreamHandle,
    sink: Option<rodio::Sink>,
    volume: f32,
    looping: bool,
    tap: AnalyserTap,
}

impl RodioOutput {
    pub fn new(volume: f32, looping: bool) -> Result<Self> {
        let (stream, handle) = rodio::OutputStream::try_default()
            .map_err(|e| VisualizerError::AudioOutput(e.to_string()))?;
        info!("Audio output stream opened");
        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
            volume,
            looping,
            tap: AnalyserTap::new(TAP_QUEUE_BLOCKS, volume),
        })
    }
}

impl AudioOutput for RodioOutput {
    fn play(&mut self, audio: &DecodedAudio) {
        self.stop();

        let sink = match rodio::Sink::try_new(&self.handle) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to create sink for {}: {}", audio.name, e);
                return;
            }
        };
        sink.set_volume(self.volume);
        sink.append(self.tap.source(audio, self.looping));

        debug!("Playback started: {} (looping: {})", audio.name, self.looping);
        self.sink = Some(sink);
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            debug!("Stopping sink");
            sink.stop();
        }
        // Anything still queued belongs to the old buffer
        self.tap.discard();
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.tap.set_volume(volume);
        if let Some(sink) = &self.sink {
            sink.set_volume(volume);
        }
    }

    fn is_playing(&self) -> bool {
        self.sink
            .as_ref()
            .map(|sink| !sink.empty() && !sink.is_paused())
            .unwrap_or(false)
    }

    fn drain_into(&mut self, analyser: &mut FrequencyAnalyser) {
        self.tap.drain_into(analyser);
    }
}

/// Stand-in when no output device could be opened. Tracks play state but
/// produces no sound and feeds no samples.
#[derive(Debug, Default)]
pub struct SilentOutput {
    playing: bool,
}

impl AudioOutput for SilentOutput {
    fn play(&mut self, audio: &DecodedAudio) {
        debug!("Silent output: pretending to play {}", audio.name);
        self.playing = true;
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn set_volume(&mut self, _volume: f32) {}

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn drain_into(&mut self, _analyser: &mut FrequencyAnalyser) {}
}

/// Open the default device, falling back to silence
pub fn open_output(volume: f32, looping: bool) -> Box<dyn AudioOutput> {
    match RodioOutput::new(volume, looping) {
        Ok(output) => Box::new(output),
        Err(e) => {
            warn!("{}; running without sound", e);
            Box::new(SilentOutput::default())
        }
    }
}

/// Where the active buffer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOrigin {
    UserFile,
    DefaultTrack,
}

/// The single active audio buffer and its playback state
pub struct AudioSource {
    output: Box<dyn AudioOutput>,
    buffer: Option<(DecodedAudio, TrackOrigin)>,
    volume: f32,
}

impl AudioSource {
    pub fn new(mut output: Box<dyn AudioOutput>, volume: f32) -> Self {
        output.set_volume(volume);
        Self {
            output,
            buffer: None,
            volume,
        }
    }

    /// Attach a new buffer. The previous one is stopped first; the new one
    /// is not started.
    pub fn set_buffer(&mut self, audio: DecodedAudio, origin: TrackOrigin) {
        self.output.stop();
        info!("Audio buffer set: {} ({:?})", audio.name, origin);
        self.buffer = Some((audio, origin));
    }

    /// Stop and drop the active buffer
    pub fn clear(&mut self) {
        self.output.stop();
        if let Some((audio, _)) = self.buffer.take() {
            debug!("Audio buffer cleared: {}", audio.name);
        }
    }

    /// Start the active buffer; false when there is none. A buffer that is
    /// already playing keeps going.
    pub fn play(&mut self) -> bool {
        if self.is_playing() {
            debug!("Already playing");
            return true;
        }
        match &self.buffer {
            Some((audio, _)) => {
                self.output.play(audio);
                true
            }
            None => {
                debug!("play() without a buffer ignored");
                false
            }
        }
    }

    /// Sets the literal value; range checking is the caller's business
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.output.set_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn track(&self) -> Option<(&DecodedAudio, TrackOrigin)> {
        self.buffer.as_ref().map(|(audio, origin)| (audio, *origin))
    }

    pub fn is_playing(&self) -> bool {
        self.buffer.is_some() && self.output.is_playing()
    }

    /// Average analyser amplitude; 0 unless a buffer is playing
    pub fn average_frequency(&mut self, analyser: &mut FrequencyAnalyser) -> f32 {
        self.output.drain_into(analyser);
        if !self.is_playing() {
            analyser.reset();
            return 0.0;
        }
        analyser.average_frequency()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::utils::analyser::{DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Event {
        Play(String),
        Stop,
        Volume(f32),
    }

    /// Output that records calls and feeds a fixed tone while playing
    #[derive(Default)]
    pub(crate) struct RecordingOutput {
        pub(crate) events: Rc<RefCell<Vec<Event>>>,
        playing: Option<String>,
    }

    impl RecordingOutput {
        pub(crate) fn new() -> (Self, Rc<RefCell<Vec<Event>>>) {
            let output = Self::default();
            let events = output.events.clone();
            (output, events)
        }
    }

    impl AudioOutput for RecordingOutput {
        fn play(&mut self, audio: &DecodedAudio) {
            assert!(self.playing.is_none(), "two buffers audible at once");
            self.playing = Some(audio.name.clone());
            self.events.borrow_mut().push(Event::Play(audio.name.clone()));
        }

        fn stop(&mut self) {
            self.playing = None;
            self.events.borrow_mut().push(Event::Stop);
        }

        fn set_volume(&mut self, volume: f32) {
            self.events.borrow_mut().push(Event::Volume(volume));
        }

        fn is_playing(&self) -> bool {
            self.playing.is_some()
        }

        fn drain_into(&mut self, analyser: &mut FrequencyAnalyser) {
            if self.playing.is_some() {
                let tone: Vec<f32> = (0..64)
                    .map(|i| (2.0 * std::f32::consts::PI * 4.0 * i as f32 / 32.0).sin() * 0.8)
                    .collect();
                analyser.push_samples(&tone);
            }
        }
    }

    pub(crate) fn track(name: &str) -> DecodedAudio {
        DecodedAudio {
            name: name.to_string(),
            channels: 1,
            sample_rate: 8000,
            samples: Arc::from(vec![0.25f32; 800]),
        }
    }

    fn analyser() -> FrequencyAnalyser {
        FrequencyAnalyser::new(DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING)
    }

    #[test]
    fn test_frequency_is_zero_without_buffer() {
        let (output, _) = RecordingOutput::new();
        let mut source = AudioSource::new(Box::new(output), 1.0);
        let mut analyser = analyser();
        assert!(!source.play());
        assert_eq!(source.average_frequency(&mut analyser), 0.0);
    }

    #[test]
    fn test_frequency_is_positive_while_playing() {
        let (output, _) = RecordingOutput::new();
        let mut source = AudioSource::new(Box::new(output), 1.0);
        let mut analyser = analyser();
        source.set_buffer(track("a"), TrackOrigin::UserFile);
        assert_eq!(source.average_frequency(&mut analyser), 0.0);

        assert!(source.play());
        let level = source.average_frequency(&mut analyser);
        assert!(level > 0.0);
    }

    #[test]
    fn test_replacing_buffer_stops_previous_first() {
        let (output, events) = RecordingOutput::new();
        let mut source = AudioSource::new(Box::new(output), 1.0);
        source.set_buffer(track("a"), TrackOrigin::UserFile);
        source.play();
        source.set_buffer(track("b"), TrackOrigin::UserFile);
        source.play();

        let events = events.borrow();
        let tail: Vec<_> = events
            .iter()
            .filter(|e| !matches!(e, Event::Volume(_)))
            .cloned()
            .collect();
        assert_eq!(
            tail,
            vec![
                Event::Stop,
                Event::Play("a".into()),
                Event::Stop,
                Event::Play("b".into())
            ]
        );
    }

    #[test]
    fn test_clear_stops_and_zeroes_frequency() {
        let (output, _) = RecordingOutput::new();
        let mut source = AudioSource::new(Box::new(output), 1.0);
        let mut analyser = analyser();
        source.set_buffer(track("a"), TrackOrigin::DefaultTrack);
        source.play();
        assert!(source.average_frequency(&mut analyser) > 0.0);

        source.clear();
        assert!(source.track().is_none());
        assert!(!source.is_playing());
        assert_eq!(source.average_frequency(&mut analyser), 0.0);
    }

    #[test]
    fn test_volume_is_passed_through_unclamped() {
        let (output, events) = RecordingOutput::new();
        let mut source = AudioSource::new(Box::new(output), 0.5);
        source.set_volume(1.7);
        assert_eq!(source.volume(), 1.7);
        assert_eq!(
            events.borrow().as_slice(),
            &[Event::Volume(0.5), Event::Volume(1.7)]
        );
    }

    fn mono(name: &str, samples: Vec<f32>) -> DecodedAudio {
        DecodedAudio {
            name: name.to_string(),
            channels: 1,
            sample_rate: 8000,
            samples: Arc::from(samples),
        }
    }

    fn queued(tap: &AnalyserTap) -> Vec<Vec<f32>> {
        tap.rx.try_iter().collect()
    }

    #[test]
    fn test_tap_downmixes_stereo_into_blocks() {
        let tap = AnalyserTap::new(8, 1.0);
        let stereo = DecodedAudio {
            name: "stereo".to_string(),
            channels: 2,
            sample_rate: 8000,
            samples: Arc::from([0.8f32, 0.2].repeat(TAP_BLOCK_FRAMES)),
        };

        let mut source = tap.source(&stereo, false);
        // One frame short of a block: nothing sent yet
        let heard: Vec<f32> = source.by_ref().take((TAP_BLOCK_FRAMES - 1) * 2).collect();
        assert_eq!(heard.len(), (TAP_BLOCK_FRAMES - 1) * 2);
        assert!(queued(&tap).is_empty());

        // Samples reach the mixer unchanged
        assert_eq!(source.by_ref().count(), 2);
        let blocks = queued(&tap);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].len(), TAP_BLOCK_FRAMES);
        assert!(blocks[0].iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_tap_keeps_feeding_across_loops() {
        let tap = AnalyserTap::new(16, 1.0);
        let audio = mono("loop", vec![0.5; 100]);
        let source = tap.source(&audio, true);

        // Ten passes over the buffer
        let heard: Vec<f32> = source.take(1000).collect();
        assert_eq!(heard.len(), 1000);

        let blocks = queued(&tap);
        assert_eq!(blocks.len(), 1000 / TAP_BLOCK_FRAMES);
        assert!(blocks.iter().flatten().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_tap_follows_volume() {
        let tap = AnalyserTap::new(8, 1.0);
        let audio = mono("tone", vec![0.6; TAP_BLOCK_FRAMES * 2]);
        let mut source = tap.source(&audio, false);

        tap.set_volume(0.0);
        source.by_ref().take(TAP_BLOCK_FRAMES).for_each(drop);
        tap.set_volume(0.5);
        source.by_ref().take(TAP_BLOCK_FRAMES).for_each(drop);

        let blocks = queued(&tap);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].iter().all(|&s| s == 0.0));
        assert!(blocks[1].iter().all(|&s| (s - 0.3).abs() < 1e-6));
    }

    #[test]
    fn test_full_queue_drops_blocks() {
        let tap = AnalyserTap::new(1, 1.0);
        let audio = mono("long", vec![0.1; TAP_BLOCK_FRAMES * 3]);
        assert_eq!(tap.source(&audio, false).count(), TAP_BLOCK_FRAMES * 3);
        assert_eq!(queued(&tap).len(), 1);
    }

    #[test]
    fn test_discard_and_drain() {
        let tap = AnalyserTap::new(8, 1.0);
        let tone: Vec<f32> = (0..TAP_BLOCK_FRAMES)
            .map(|i| (2.0 * std::f32::consts::PI * 4.0 * i as f32 / 32.0).sin() * 0.8)
            .collect();
        let audio = mono("tone", tone);

        tap.source(&audio, false).for_each(drop);
        tap.discard();
        let mut analyser = analyser();
        tap.drain_into(&mut analyser);
        assert_eq!(analyser.average_frequency(), 0.0);

        tap.source(&audio, false).for_each(drop);
        tap.drain_into(&mut analyser);
        assert!(analyser.average_frequency() > 0.0);
        assert!(queued(&tap).is_empty());
    }

    #[test]
    fn test_silent_output_tracks_state() {
        let mut output = SilentOutput::default();
        output.play(&track("x"));
        assert!(output.is_playing());
        output.stop();
        assert!(!output.is_playing());
    }
}
