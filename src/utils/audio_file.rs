use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use rodio::{Decoder, Source};

use super::errors::{Result, VisualizerError};

/// How often the decode loop checks its cancel flag
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Where a track comes from
#[derive(Debug, Clone)]
pub enum AudioInput {
    File(PathBuf),
    /// In-memory data, e.g. a file dropped onto the window without a path
    Bytes { name: String, bytes: Arc<[u8]> },
}

impl AudioInput {
    pub fn label(&self) -> String {
        match self {
            AudioInput::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            AudioInput::Bytes { name, .. } => name.clone(),
        }
    }

    fn read(&self) -> Result<Vec<u8>> {
        match self {
            AudioInput::File(path) => std::fs::read(path).map_err(|source| VisualizerError::Io {
                path: path.display().to_string(),
                source,
            }),
            AudioInput::Bytes { bytes, .. } => Ok(bytes.to_vec()),
        }
    }
}

/// Fully decoded, interleaved PCM
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub name: String,
    pub channels: u16,
    pub sample_rate: u32,
    pub samples: Arc<[f32]>,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

/// Decode a whole track into memory, giving up early once `cancel` is set
pub fn decode_audio(input: &AudioInput, cancel: &AtomicBool) -> Result<DecodedAudio> {
    let name = input.label();
    let bytes = input.read()?;
    debug!("Decoding {} ({} bytes)", name, bytes.len());

    let decoder = Decoder::new(Cursor::new(bytes)).map_err(|e| VisualizerError::Decode {
        name: name.clone(),
        message: e.to_string(),
    })?;

    let channels = decoder.channels();
    let sample_rate = decoder.sample_rate();

    let mut samples = Vec::new();
    for (i, sample) in decoder.convert_samples::<f32>().enumerate() {
        if i % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
            return Err(VisualizerError::Cancelled(name));
        }
        samples.push(sample);
    }

    if cancel.load(Ordering::Relaxed) {
        return Err(VisualizerError::Cancelled(name));
    }
    if samples.is_empty() || channels == 0 {
        return Err(VisualizerError::EmptyAudio(name));
    }

    let audio = DecodedAudio {
        name,
        channels,
        sample_rate,
        samples: samples.into(),
    };
    info!(
        "Decoded {}: {} Hz, {} channels, {:.1}s",
        audio.name,
        audio.sample_rate,
        audio.channels,
        audio.duration().as_secs_f32()
    );
    Ok(audio)
}

/// A decode running on its own thread
///
/// Dropping the task or calling [`DecodeTask::cancel`] makes the worker stop
/// at its next check and discard its result.
pub struct DecodeTask {
    ticket: u64,
    label: String,
    cancel: Arc<AtomicBool>,
    rx: Receiver<Result<DecodedAudio>>,
}

impl DecodeTask {
    pub fn spawn(ticket: u64, input: AudioInput) -> Self {
        let label = input.label();
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let worker_cancel = cancel.clone();
        std::thread::spawn(move || {
            let result = decode_audio(&input, &worker_cancel);
            if tx.send(result).is_err() {
                debug!("Decode #{} finished after its task was dropped", ticket);
            }
        });

        debug!("Spawned decode #{} for {}", ticket, label);
        Self {
            ticket,
            label,
            cancel,
            rx,
        }
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cancel(&self) {
        debug!("Cancelling decode #{} ({})", self.ticket, self.label);
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Non-blocking poll; `Some` once the worker has finished
    pub fn try_result(&self) -> Option<Result<DecodedAudio>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                warn!("Decode worker for {} exited without a result", self.label);
                Some(Err(VisualizerError::Cancelled(self.label.clone())))
            }
        }
    }
}

impl Drop for DecodeTask {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}
