//! Speech synthesis system
//!
//! Leaf components of playback: the platform channel, voice resolution,
//! and speaking a single segment.

pub mod backends;
pub mod channel;
pub mod player;
pub mod voices;

pub use channel::{
    create_channel, share, BackendKind, Completion, SharedChannel, SpeechChannel, Utterance,
    UtteranceOutcome, VoiceGender, VoiceHandle,
};
pub use player::{SegmentPlayer, SpeakOutcome};
pub use voices::{ResolvedVoices, VoiceResolver};
