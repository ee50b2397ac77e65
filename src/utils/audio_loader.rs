use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, error, info};

use super::audio::TrackOrigin;
use super::audio_file::{AudioInput, DecodeTask, DecodedAudio};
use super::errors::VisualizerError;

/// Outcome of a finished decode
#[derive(Debug)]
pub enum LoadEvent {
    Ready {
        ticket: u64,
        origin: TrackOrigin,
        audio: DecodedAudio,
    },
    Failed {
        ticket: u64,
        origin: TrackOrigin,
        label: String,
        error: VisualizerError,
    },
}

/// Chooses between user selections and the default track
///
/// The default track is requested at most once, and only if the user has
/// not picked a file before the grace window runs out. Only the newest
/// request can produce an event; older decodes are cancelled.
pub struct AudioLoader {
    default_track: PathBuf,
    grace: Duration,
    created_at: Instant,
    user_selected: bool,
    default_loads: u32,
    next_ticket: u64,
    pending: Option<(DecodeTask, TrackOrigin)>,
}

impl AudioLoader {
    pub fn new(default_track: PathBuf, grace: Duration, now: Instant) -> Self {
        Self {
            default_track,
            grace,
            created_at: now,
            user_selected: false,
            default_loads: 0,
            next_ticket: 0,
            pending: None,
        }
    }

    /// Start decoding a user file. Any in-flight decode is cancelled.
    pub fn select(&mut self, input: AudioInput) -> u64 {
        self.user_selected = true;
        self.spawn(input, TrackOrigin::UserFile)
    }

    /// Times the default track has been requested (0 or 1)
    #[cfg(test)]
    pub fn default_loads(&self) -> u32 {
        self.default_loads
    }

    #[cfg(test)]
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_label(&self) -> Option<&str> {
        self.pending.as_ref().map(|(task, _)| task.label())
    }

    /// Kick off the default track once the grace window has passed, then
    /// report the pending decode if it has finished.
    pub fn poll(&mut self, now: Instant) -> Option<LoadEvent> {
        if !self.user_selected
            && self.default_loads == 0
            && now.saturating_duration_since(self.created_at) >= self.grace
        {
            self.default_loads += 1;
            info!(
                "No file selected within {} ms, loading default track {}",
                self.grace.as_millis(),
                self.default_track.display()
            );
            self.spawn(
                AudioInput::File(self.default_track.clone()),
                TrackOrigin::DefaultTrack,
            );
        }

        let result = self.pending.as_ref()?.0.try_result()?;
        let (task, origin) = self.pending.take()?;
        let ticket = task.ticket();

        match result {
            Ok(audio) => Some(LoadEvent::Ready {
                ticket,
                origin,
                audio,
            }),
            Err(VisualizerError::Cancelled(label)) => {
                debug!("Decode #{} of {} was cancelled", ticket, label);
                None
            }
            Err(error) => {
                error!("Error decoding audio data: {}", error);
                Some(LoadEvent::Failed {
                    ticket,
                    origin,
                    label: task.label().to_string(),
                    error,
                })
            }
        }
    }

    fn spawn(&mut self, input: AudioInput, origin: TrackOrigin) -> u64 {
        if let Some((previous, _)) = self.pending.take() {
            previous.cancel();
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending = Some((DecodeTask::spawn(ticket, input), origin));
        ticket
    }
}
