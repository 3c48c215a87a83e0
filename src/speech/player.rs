//! Segment player
//!
//! Speaks one segment on the shared channel and waits for it to end.
//! Never fails: interruption is the expected result of a stop, and any
//! other synthesis failure is logged and treated as the end of the segment.

use crate::playback::control::SessionToken;
use crate::speech::channel::{SharedChannel, Utterance, UtteranceOutcome, VoiceHandle};
use crate::lock;
use log::{debug, warn};

/// Pitch for voices that sound female
const HIGHER_PITCH: f32 = 1.1;

/// Pitch for everything else
const LOWER_PITCH: f32 = 0.9;

/// How a call to [`SegmentPlayer::speak`] ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// The session was not live, nothing was sent to the channel
    Skipped,
    Finished,
    Interrupted,
    /// Synthesis failed; already logged
    Failed,
}

/// Speaks single segments on the shared speech channel
#[derive(Clone)]
pub struct SegmentPlayer {
    channel: SharedChannel,
}

impl SegmentPlayer {
    pub fn new(channel: SharedChannel) -> Self {
        Self { channel }
    }

    /// Slight pitch difference between voices
    pub fn pitch_for(voice: Option<&VoiceHandle>) -> f32 {
        match voice {
            Some(voice) if voice.sounds_female() => HIGHER_PITCH,
            _ => LOWER_PITCH,
        }
    }

    /// Speak `text` and wait for it to finish, be interrupted, or fail
    ///
    /// Returns early, without touching the channel, if the session is no
    /// longer live. Returns as soon as the session is cancelled even if
    /// the platform never reports the interruption.
    pub async fn speak(
        &self,
        text: &str,
        voice: Option<&VoiceHandle>,
        speed: f32,
        token: &mut SessionToken,
    ) -> SpeakOutcome {
        if !token.is_live() {
            return SpeakOutcome::Skipped;
        }

        let utterance = Utterance {
            text: text.to_string(),
            voice: voice.cloned(),
            rate: speed,
            pitch: Self::pitch_for(voice),
            volume: 1.0,
        };

        let completion = {
            let mut channel = lock(&self.channel);

            // At most one utterance in flight on the platform channel
            if let Err(e) = channel.cancel() {
                debug!("Cancel before speaking failed: {}", e);
            }

            if !token.is_live() {
                return SpeakOutcome::Skipped;
            }

            match channel.speak(&utterance) {
                Ok(completion) => completion,
                Err(e) => {
                    warn!("Speech error: {}", e);
                    return SpeakOutcome::Failed;
                }
            }
        };

        tokio::select! {
            outcome = completion => match outcome {
                Ok(UtteranceOutcome::Finished) => SpeakOutcome::Finished,
                Ok(UtteranceOutcome::Interrupted) | Err(_) => SpeakOutcome::Interrupted,
                Ok(UtteranceOutcome::Failed(reason)) => {
                    warn!("Speech error: {}", reason);
                    SpeakOutcome::Failed
                }
            },
            _ = token.cancelled() => SpeakOutcome::Interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::channel::VoiceGender;

    #[test]
    fn test_pitch_for() {
        let female = VoiceHandle::new("1", "Victoria", "en-US").with_gender(VoiceGender::Female);
        let male = VoiceHandle::new("2", "Fred", "en-US").with_gender(VoiceGender::Male);
        assert_eq!(SegmentPlayer::pitch_for(Some(&female)), HIGHER_PITCH);
        assert_eq!(SegmentPlayer::pitch_for(Some(&male)), LOWER_PITCH);
        assert_eq!(SegmentPlayer::pitch_for(None), LOWER_PITCH);
    }
}
