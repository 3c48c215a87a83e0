//! Dialogue sequencer
//!
//! Speaks a list of segments strictly in order, one utterance at a time,
//! with a short pause whenever the speaker changes. Liveness is checked at
//! every suspension point, so a stop halts playback within one utterance
//! cancellation rather than at the end of the list.
//!
//! Pausing suspends the utterance in place when the backend supports it.
//! Otherwise the utterance is cancelled and playback picks up again at the
//! next segment on resume.

use super::control::{PlaybackControl, PlaybackState, SessionToken};
use super::events::{PlaybackObserver, PlaybackSummary};
use crate::dialogue::DialogueSegment;
use crate::lock;
use crate::speech::{ResolvedVoices, SegmentPlayer, SharedChannel, SpeakOutcome, VoiceResolver};
use crate::state::{clamp_speed, PlaybackSettings};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Silence between two different speakers
pub const DEFAULT_SPEAKER_PAUSE: Duration = Duration::from_millis(300);

/// What a call to [`DialogueSequencer::pause`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseMode {
    /// The utterance is suspended and will continue from where it stopped
    Suspended,
    /// The backend cannot pause; the utterance was cancelled and playback
    /// continues from the next segment
    Cancelled,
    /// Nothing was playing
    NotPlaying,
}

/// Settings and the voices resolved from them
struct Tuning {
    settings: PlaybackSettings,
    voices: ResolvedVoices,
}

/// The active session's queue and position
struct Queue {
    session: u64,
    segments: Arc<[DialogueSegment]>,
    index: usize,
}

impl Queue {
    fn empty() -> Self {
        Self {
            session: 0,
            segments: Arc::from(Vec::new()),
            index: 0,
        }
    }
}

/// Drives sequential playback of dialogue segments
pub struct DialogueSequencer {
    channel: SharedChannel,
    player: SegmentPlayer,
    resolver: VoiceResolver,
    control: PlaybackControl,
    next_session: AtomicU64,
    tuning: Mutex<Tuning>,
    queue: Mutex<Queue>,
    speaker_pause: Duration,
}

impl DialogueSequencer {
    /// Create a sequencer on `channel`, resolving voices for `settings`
    pub fn new(channel: SharedChannel, settings: PlaybackSettings) -> Self {
        let resolver = VoiceResolver::new(Arc::clone(&channel));
        let settings = PlaybackSettings {
            speed: clamp_speed(settings.speed),
            ..settings
        };
        let voices = resolver.resolve_settings(&settings);

        Self {
            player: SegmentPlayer::new(Arc::clone(&channel)),
            channel,
            resolver,
            control: PlaybackControl::new(),
            next_session: AtomicU64::new(0),
            tuning: Mutex::new(Tuning { settings, voices }),
            queue: Mutex::new(Queue::empty()),
            speaker_pause: DEFAULT_SPEAKER_PAUSE,
        }
    }

    pub fn with_speaker_pause(mut self, pause: Duration) -> Self {
        self.speaker_pause = pause;
        self
    }

    pub fn state(&self) -> PlaybackState {
        self.control.state()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Index of the segment being spoken; 0 when idle
    pub fn current_index(&self) -> usize {
        lock(&self.queue).index
    }

    /// Segments in the active queue; 0 when idle or stopped
    pub fn queue_len(&self) -> usize {
        lock(&self.queue).segments.len()
    }

    pub fn settings(&self) -> PlaybackSettings {
        lock(&self.tuning).settings.clone()
    }

    pub fn voices(&self) -> ResolvedVoices {
        lock(&self.tuning).voices.clone()
    }

    /// Replace the settings; takes effect from the next segment
    pub fn apply_settings(&self, settings: PlaybackSettings) {
        let settings = PlaybackSettings {
            speed: clamp_speed(settings.speed),
            ..settings
        };
        let voices = self.resolver.resolve_settings(&settings);
        if voices.is_shared() {
            info!("Only one voice available; both speakers will share it");
        }
        *lock(&self.tuning) = Tuning { settings, voices };
    }

    /// Re-resolve voices after the platform registry changed
    pub fn refresh_voices(&self) {
        let settings = self.settings();
        let voices = self.resolver.resolve_settings(&settings);
        let mut tuning = lock(&self.tuning);
        // Settings may have changed while resolving
        if tuning.settings == settings {
            tuning.voices = voices;
        }
    }

    /// Change the speed; takes effect from the next segment
    pub fn set_speed(&self, speed: f32) -> f32 {
        let speed = clamp_speed(speed);
        lock(&self.tuning).settings.speed = speed;
        speed
    }

    /// Speak `segments` in order, reporting to `observer`
    ///
    /// Supersedes any session already running; that session's loop exits
    /// at its next liveness check without firing further callbacks.
    pub async fn speak_dialogue(
        &self,
        segments: Vec<DialogueSegment>,
        observer: &dyn PlaybackObserver,
    ) -> PlaybackSummary {
        let session = self.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        let segments: Arc<[DialogueSegment]> = Arc::from(segments);
        let total = segments.len();

        *lock(&self.queue) = Queue {
            session,
            segments: Arc::clone(&segments),
            index: 0,
        };
        let mut token = self.control.begin(session);
        self.cancel_in_flight();
        info!("Session {}: playing {} segments", session, total);

        let guard = SessionGuard {
            sequencer: self,
            session,
        };
        let spoken = self.play(&segments, &mut token, observer).await;
        drop(guard);

        let summary = PlaybackSummary {
            session,
            spoken,
            total,
            completed: spoken == total,
        };
        info!(
            "Session {}: {} of {} segments spoken",
            session, summary.spoken, summary.total
        );
        observer.on_finished(&summary);
        summary
    }

    async fn play(
        &self,
        segments: &[DialogueSegment],
        token: &mut SessionToken,
        observer: &dyn PlaybackObserver,
    ) -> usize {
        let total = segments.len();
        let mut spoken = 0;

        for (index, segment) in segments.iter().enumerate() {
            if !token.wait_resumed().await {
                break;
            }
            self.set_index(token.session(), index);

            let changed = index > 0 && segments[index - 1].speaker != segment.speaker;
            if changed && !self.speaker_gap(token).await {
                break;
            }

            // Read per segment so setting changes apply from the next one
            let (voice, speed) = {
                let tuning = lock(&self.tuning);
                (
                    tuning.voices.for_speaker(segment.speaker).cloned(),
                    tuning.settings.speed,
                )
            };

            if !token.wait_resumed().await {
                break;
            }
            observer.on_segment_start(index, segment);

            let outcome = loop {
                let outcome = self.player.speak(&segment.text, voice.as_ref(), speed, token).await;
                // Paused before the utterance went out; speak it once resumed
                if outcome != SpeakOutcome::Skipped || !token.wait_resumed().await {
                    break outcome;
                }
            };
            debug!("Segment {} ({}): {:?}", index, segment.speaker, outcome);

            if !token.wait_resumed().await {
                break;
            }
            observer.on_segment_end(index, segment);
            spoken = index + 1;
            observer.on_progress(spoken, total);
        }

        spoken
    }

    /// Inter-speaker silence; false if the session was cancelled meanwhile
    async fn speaker_gap(&self, token: &mut SessionToken) -> bool {
        if self.speaker_pause.is_zero() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.speaker_pause) => true,
            _ = token.cancelled() => false,
        }
    }

    fn set_index(&self, session: u64, index: usize) {
        let mut queue = lock(&self.queue);
        if queue.session == session {
            queue.index = index;
        }
    }

    fn cancel_in_flight(&self) {
        if let Err(e) = lock(&self.channel).cancel() {
            debug!("Cancel failed: {}", e);
        }
    }

    /// Pause playback
    pub fn pause(&self) -> PauseMode {
        if !self.control.pause() {
            return PauseMode::NotPlaying;
        }

        let mut channel = lock(&self.channel);
        match channel.pause() {
            Ok(()) => {
                debug!("Paused in place on {}", channel.name());
                PauseMode::Suspended
            }
            Err(e) => {
                debug!("Pause unavailable ({}); cancelling the utterance", e);
                if let Err(e) = channel.cancel() {
                    warn!("Cancel failed: {}", e);
                }
                PauseMode::Cancelled
            }
        }
    }

    /// Resume a paused session; false if nothing was paused
    pub fn resume(&self) -> bool {
        if !self.control.resume() {
            return false;
        }
        if let Err(e) = lock(&self.channel).resume() {
            debug!("Resume: {}", e);
        }
        true
    }

    /// Stop playback immediately; safe to call in any state
    ///
    /// Returns true if a session was playing or paused.
    pub fn stop(&self) -> bool {
        let stopped = self.control.stop();
        {
            let mut queue = lock(&self.queue);
            queue.segments = Arc::from(Vec::new());
            queue.index = 0;
        }
        self.cancel_in_flight();
        if stopped {
            info!("Playback stopped");
        }
        stopped
    }
}

/// Returns the sequencer to idle when a session ends, even if its future
/// is dropped part way through
struct SessionGuard<'a> {
    sequencer: &'a DialogueSequencer,
    session: u64,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let sequencer = self.sequencer;
        if sequencer.control.finish(self.session) {
            let mut queue = lock(&sequencer.queue);
            if queue.session == self.session {
                *queue = Queue::empty();
            }
        }
    }
}

/// Re-resolve voices whenever the backend announces a registry change
///
/// Runs until the backend drops its notifier; returns at once for backends
/// that never announce changes.
pub async fn follow_registry(sequencer: Arc<DialogueSequencer>) {
    let updates = lock(&sequencer.channel).registry_updates();
    let Some(mut updates) = updates else {
        return;
    };

    while updates.changed().await.is_ok() {
        debug!("Voice registry changed");
        sequencer.refresh_voices();
    }
}
