use tracing::info;

use crate::error::AudioError;

/// Where the overlay sends its donation sounds.
pub trait AudioSink: Send {
    /// Starts `url` from the beginning, replacing whatever was playing.
    fn play(&mut self, url: &str) -> Result<(), AudioError>;

    fn stop(&mut self);
}

/// Announces clips in the log. The process renders markup only, so actual
/// playback is left to whatever displays the rendered overlay.
#[derive(Debug, Default)]
pub struct LogAudio {
    playing: Option<String>,
}

impl AudioSink for LogAudio {
    fn play(&mut self, url: &str) -> Result<(), AudioError> {
        info!(url, "Playing audio");
        self.playing = Some(url.to_owned());
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(url) = self.playing.take() {
            info!(url, "Stopping audio");
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum AudioEvent {
        Play(String),
        Stop,
    }

    /// Records calls; optionally rejects every `play` like a browser blocking
    /// autoplay.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingAudio {
        pub events: Arc<Mutex<Vec<AudioEvent>>>,
        pub reject: bool,
    }

    impl RecordingAudio {
        pub fn events(&self) -> Vec<AudioEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl AudioSink for RecordingAudio {
        fn play(&mut self, url: &str) -> Result<(), AudioError> {
            self.events
                .lock()
                .unwrap()
                .push(AudioEvent::Play(url.to_owned()));
            if self.reject {
                return Err(AudioError::Rejected {
                    url: url.to_owned(),
                    reason: "autoplay is not allowed".to_owned(),
                });
            }
            Ok(())
        }

        fn stop(&mut self) {
            self.events.lock().unwrap().push(AudioEvent::Stop);
        }
    }
}
