//! Dialogue playback: liveness, lifecycle events and the sequencer

pub mod control;
pub mod events;
pub mod sequencer;

pub use control::{PlaybackControl, PlaybackState, SessionToken};
pub use events::{PlaybackEvent, PlaybackObserver, PlaybackSummary};
pub use sequencer::{follow_registry, DialogueSequencer, PauseMode, DEFAULT_SPEAKER_PAUSE};
