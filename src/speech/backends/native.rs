//! Native TTS backend using the tts crate
//!
//! This backend uses the `tts` crate which provides a unified interface to:
//! - Speech Dispatcher on Linux (via native bindings)
//! - AVFoundation on macOS/iOS (via native bindings)
//! - WinRT / SAPI on Windows
//!
//! Completion is reported through the crate's utterance callbacks where the
//! platform has them, and by polling `is_speaking` where it does not.

use crate::speech::channel::{
    Completion, SpeechChannel, Utterance, UtteranceOutcome, VoiceGender, VoiceHandle,
};
use crate::{lock, PodcastError, Result};
use log::{debug, error, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tts::{Features, Gender, Tts as TtsCrate, UtteranceId, Voice};

/// How often to poll `is_speaking` on platforms without callbacks
const SPEAKING_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Completions that arrived before `speak` returned their id
const EARLY_COMPLETION_LIMIT: usize = 8;

/// Rough speaking pace for platforms that report nothing at all
const ESTIMATED_WORDS_PER_SECOND: f32 = 2.5;

/// Bookkeeping shared with the platform callbacks
#[derive(Default)]
struct Tracker {
    /// The single in-flight utterance
    pending: Option<(UtteranceId, oneshot::Sender<UtteranceOutcome>)>,

    /// Callback results that beat `speak` back to us
    early: Vec<(UtteranceId, UtteranceOutcome)>,
}

impl Tracker {
    fn complete(&mut self, id: UtteranceId, outcome: UtteranceOutcome) {
        match self.pending.take() {
            Some((pending_id, tx)) if pending_id == id => {
                let _ = tx.send(outcome);
            }
            other => {
                self.pending = other;
                self.early.push((id, outcome));
                if self.early.len() > EARLY_COMPLETION_LIMIT {
                    self.early.remove(0);
                }
            }
        }
    }

    fn track(&mut self, id: UtteranceId, tx: oneshot::Sender<UtteranceOutcome>) {
        if let Some(pos) = self.early.iter().position(|(early_id, _)| *early_id == id) {
            let (_, outcome) = self.early.remove(pos);
            let _ = tx.send(outcome);
            return;
        }
        // Replacing an older sender drops it, which reads as an interruption
        self.pending = Some((id, tx));
    }

    fn interrupt(&mut self) {
        if let Some((_, tx)) = self.pending.take() {
            let _ = tx.send(UtteranceOutcome::Interrupted);
        }
        self.early.clear();
    }
}

/// Native TTS backend using the tts crate
pub struct NativeChannel {
    /// The tts crate's TTS instance
    tts: TtsCrate,

    /// What this platform backend can do
    features: Features,

    /// In-flight utterance, when callbacks are available
    tracker: Arc<Mutex<Tracker>>,

    /// Stops the polling watcher of the in-flight utterance
    watcher: Option<oneshot::Sender<()>>,
}

impl NativeChannel {
    /// Create a new native TTS channel
    ///
    /// Initializes the platform-appropriate TTS backend and hooks up
    /// utterance callbacks when the platform supports them.
    pub fn new() -> Result<Self> {
        debug!("Creating native TTS backend");

        let tts = TtsCrate::default()
            .map_err(|e| PodcastError::Speech(format!("Failed to initialize TTS: {}", e)))?;
        let features = tts.supported_features();
        let tracker = Arc::new(Mutex::new(Tracker::default()));

        if features.utterance_callbacks {
            let on_end = Arc::clone(&tracker);
            tts.on_utterance_end(Some(Box::new(move |id| {
                lock(&on_end).complete(id, UtteranceOutcome::Finished);
            })))
            .map_err(|e| PodcastError::Speech(format!("Failed to register callback: {}", e)))?;

            let on_stop = Arc::clone(&tracker);
            tts.on_utterance_stop(Some(Box::new(move |id| {
                lock(&on_stop).complete(id, UtteranceOutcome::Interrupted);
            })))
            .map_err(|e| PodcastError::Speech(format!("Failed to register callback: {}", e)))?;
        } else {
            warn!("Utterance callbacks not supported; polling for completion");
        }

        debug!("Native TTS backend created successfully");

        Ok(Self {
            tts,
            features,
            tracker,
            watcher: None,
        })
    }

    /// Map a rate multiplier onto the platform's rate range
    fn convert_rate(multiplier: f32, normal: f32, min: f32, max: f32) -> f32 {
        (normal * multiplier).clamp(min, max)
    }

    fn to_handle(voice: &Voice, default_id: Option<&str>) -> VoiceHandle {
        let id = voice.id();
        VoiceHandle {
            is_default: default_id == Some(id.as_str()),
            id,
            name: voice.name(),
            language: voice.language().to_string(),
            gender: voice.gender().map(|g| match g {
                Gender::Male => VoiceGender::Male,
                Gender::Female => VoiceGender::Female,
            }),
        }
    }

    fn apply_voice(&mut self, wanted: &VoiceHandle) -> Result<()> {
        if !self.features.voice {
            debug!("Voice selection not supported on this platform");
            return Ok(());
        }

        let voices = self
            .tts
            .voices()
            .map_err(|e| PodcastError::Speech(format!("Failed to get voices: {}", e)))?;

        match voices.iter().find(|v| v.id() == wanted.id) {
            Some(voice) => self
                .tts
                .set_voice(voice)
                .map_err(|e| PodcastError::Speech(format!("Failed to set voice: {}", e))),
            None => {
                warn!("Voice {} is no longer installed; using current voice", wanted);
                Ok(())
            }
        }
    }

    fn apply_prosody(&mut self, utterance: &Utterance) -> Result<()> {
        if self.features.rate {
            let rate = Self::convert_rate(
                utterance.rate,
                self.tts.normal_rate(),
                self.tts.min_rate(),
                self.tts.max_rate(),
            );
            self.tts
                .set_rate(rate)
                .map_err(|e| PodcastError::Speech(format!("Failed to set rate: {}", e)))?;
        }

        if self.features.pitch {
            let pitch = Self::convert_rate(
                utterance.pitch,
                self.tts.normal_pitch(),
                self.tts.min_pitch(),
                self.tts.max_pitch(),
            );
            self.tts
                .set_pitch(pitch)
                .map_err(|e| PodcastError::Speech(format!("Failed to set pitch: {}", e)))?;
        }

        if self.features.volume {
            self.tts
                .set_volume(utterance.volume.clamp(0.0, 1.0))
                .map_err(|e| PodcastError::Speech(format!("Failed to set volume: {}", e)))?;
        }

        Ok(())
    }

    /// Completion for platforms without utterance callbacks
    fn watch_completion(&mut self, utterance: &Utterance) -> Completion {
        let (tx, rx) = oneshot::channel();
        let (stop_tx, mut stop_rx) = oneshot::channel();
        self.watcher = Some(stop_tx);

        let tts = self.tts.clone();
        let can_poll = self.features.is_speaking;
        let words = utterance.text.split_whitespace().count() as f32;
        let estimate = Duration::from_secs_f32(
            words / (ESTIMATED_WORDS_PER_SECOND * utterance.rate.max(0.1)),
        );

        tokio::spawn(async move {
            let finished = async {
                if !can_poll {
                    tokio::time::sleep(estimate).await;
                    return UtteranceOutcome::Finished;
                }
                loop {
                    tokio::time::sleep(SPEAKING_POLL_INTERVAL).await;
                    match tts.is_speaking() {
                        Ok(true) => continue,
                        Ok(false) => return UtteranceOutcome::Finished,
                        Err(e) => return UtteranceOutcome::Failed(e.to_string()),
                    }
                }
            };

            let outcome = tokio::select! {
                outcome = finished => outcome,
                _ = &mut stop_rx => UtteranceOutcome::Interrupted,
            };
            let _ = tx.send(outcome);
        });

        rx
    }
}

impl SpeechChannel for NativeChannel {
    fn name(&self) -> &'static str {
        "native"
    }

    fn voices(&self) -> Result<Vec<VoiceHandle>> {
        let voices = self
            .tts
            .voices()
            .map_err(|e| PodcastError::Speech(format!("Failed to get voices: {}", e)))?;

        let default_id = if self.features.get_voice {
            self.tts.voice().ok().flatten().map(|v| v.id())
        } else {
            None
        };

        Ok(voices
            .iter()
            .map(|v| Self::to_handle(v, default_id.as_deref()))
            .collect())
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<Completion> {
        if utterance.text.trim().is_empty() {
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(UtteranceOutcome::Finished);
            return Ok(rx);
        }

        if let Some(voice) = &utterance.voice {
            self.apply_voice(voice)?;
        }
        self.apply_prosody(utterance)?;

        debug!("Speaking: {}", utterance.text);
        let id = self.tts.speak(utterance.text.as_str(), false).map_err(|e| {
            error!("Failed to speak: {}", e);
            PodcastError::Speech(format!("Speak failed: {}", e))
        })?;

        match id {
            Some(id) if self.features.utterance_callbacks => {
                let (tx, rx) = oneshot::channel();
                lock(&self.tracker).track(id, tx);
                Ok(rx)
            }
            _ => Ok(self.watch_completion(utterance)),
        }
    }

    fn cancel(&mut self) -> Result<()> {
        debug!("Canceling speech");
        if let Some(stop) = self.watcher.take() {
            let _ = stop.send(());
        }
        lock(&self.tracker).interrupt();

        if !self.features.stop {
            warn!("Stopping speech not supported on this platform");
            return Ok(());
        }

        self.tts.stop().map_err(|e| {
            error!("Failed to cancel speech: {}", e);
            PodcastError::Speech(format!("Cancel failed: {}", e))
        })?;

        Ok(())
    }
}
