//! Live captions on the terminal
//!
//! Prints each segment as it starts, labelled with the speaker's name and
//! coloured per speaker, and a progress counter as segments settle.

use crate::dialogue::{DialogueSegment, SpeakerId};
use crate::lock;
use crate::playback::{PlaybackObserver, PlaybackSummary};
use crate::state::Theme;
use log::debug;
use std::io::{self, Write};
use std::sync::Mutex;

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

/// Caption observer writing to any byte sink
pub struct CaptionPrinter {
    out: Mutex<Box<dyn Write + Send>>,
    theme: Theme,
    color: bool,
}

impl CaptionPrinter {
    /// Captions on stdout, coloured
    pub fn stdout(theme: Theme) -> Self {
        Self::new(Box::new(io::stdout()), theme, true)
    }

    pub fn new(out: Box<dyn Write + Send>, theme: Theme, color: bool) -> Self {
        Self {
            out: Mutex::new(out),
            theme,
            color,
        }
    }

    fn speaker_color(&self, speaker: SpeakerId) -> &'static str {
        match (self.theme, speaker) {
            (Theme::Dark, SpeakerId::Speaker1) => "\x1b[1;96m",
            (Theme::Dark, SpeakerId::Speaker2) => "\x1b[1;93m",
            (Theme::Light, SpeakerId::Speaker1) => "\x1b[1;34m",
            (Theme::Light, SpeakerId::Speaker2) => "\x1b[1;35m",
        }
    }

    fn write_line(&self, line: &str) {
        let mut out = lock(&self.out);
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            debug!("Failed to write caption: {}", e);
        }
    }

    /// Caption text for a segment
    pub fn format_segment(&self, segment: &DialogueSegment) -> String {
        let label = segment.speaker.label();
        if self.color {
            format!(
                "{}{}:{} {}",
                self.speaker_color(segment.speaker),
                label,
                RESET,
                segment.text
            )
        } else {
            format!("{}: {}", label, segment.text)
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.color {
            format!("{}{}{}", DIM, text, RESET)
        } else {
            text.to_string()
        }
    }
}

impl PlaybackObserver for CaptionPrinter {
    fn on_segment_start(&self, _index: usize, segment: &DialogueSegment) {
        self.write_line(&self.format_segment(segment));
    }

    fn on_progress(&self, current: usize, total: usize) {
        self.write_line(&self.dim(&format!("  [{}/{}]", current, total)));
    }

    fn on_finished(&self, summary: &PlaybackSummary) {
        let line = if summary.completed {
            "Finished.".to_string()
        } else {
            format!("Stopped after {} of {} segments.", summary.spoken, summary.total)
        };
        self.write_line(&self.dim(&line));
    }
}
