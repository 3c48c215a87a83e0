//! Playback lifecycle events
//!
//! Observers are called synchronously from the sequencer loop, in order:
//! start, end and progress for segment `i` all happen before anything for
//! segment `i + 1`. Every method has a no-op default.

use crate::dialogue::DialogueSegment;
use tokio::sync::mpsc;

/// How a playback session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub session: u64,
    /// Segments whose end was reported
    pub spoken: usize,
    pub total: usize,
    /// Every segment was spoken without a stop
    pub completed: bool,
}

/// Typed form of the observer callbacks
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    SegmentStarted { index: usize, segment: DialogueSegment },
    SegmentEnded { index: usize, segment: DialogueSegment },
    ProgressUpdated { current: usize, total: usize },
    PlaybackStopped(PlaybackSummary),
}

/// Receives playback lifecycle callbacks
pub trait PlaybackObserver: Send + Sync {
    /// Segment `index` is about to be spoken
    fn on_segment_start(&self, _index: usize, _segment: &DialogueSegment) {}

    /// Segment `index` finished speaking
    fn on_segment_end(&self, _index: usize, _segment: &DialogueSegment) {}

    /// `current` of `total` segments are done
    fn on_progress(&self, _current: usize, _total: usize) {}

    /// The session is over, by exhaustion or stop; always called last
    fn on_finished(&self, _summary: &PlaybackSummary) {}
}

impl PlaybackObserver for () {}

/// Forward callbacks as events; a closed receiver is ignored
impl PlaybackObserver for mpsc::UnboundedSender<PlaybackEvent> {
    fn on_segment_start(&self, index: usize, segment: &DialogueSegment) {
        let _ = self.send(PlaybackEvent::SegmentStarted {
            index,
            segment: segment.clone(),
        });
    }

    fn on_segment_end(&self, index: usize, segment: &DialogueSegment) {
        let _ = self.send(PlaybackEvent::SegmentEnded {
            index,
            segment: segment.clone(),
        });
    }

    fn on_progress(&self, current: usize, total: usize) {
        let _ = self.send(PlaybackEvent::ProgressUpdated { current, total });
    }

    fn on_finished(&self, summary: &PlaybackSummary) {
        let _ = self.send(PlaybackEvent::PlaybackStopped(*summary));
    }
}
