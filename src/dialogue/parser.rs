//! Parsing generated dialogue text into segments
//!
//! Generated text is free-form: turns are usually lines prefixed with a
//! speaker label ("Host:", "Expert -", "Q:"), sometimes with invented names
//! ("Alex: ... Sam: ..."), sometimes several turns on one line, and
//! sometimes no labels at all.

use super::fallback::sentences;
use super::segment::{correct_alternation, DialogueSegment, SpeakerId};
use crate::{PodcastError, Result};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

/// Label separators: colon, fullwidth colon, or a dash followed by a space
const SEPARATOR: &str = r"[ \t]*(?:[:：]|-(?:[ \t]|$))[ \t]*";

/// A label of up to three words starting with a capital, followed by a colon
static UNKNOWN_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\p{Lu}[\p{L}\p{N}'’.]*(?:[ \t][\p{L}\p{N}'’.]+){0,2})[ \t]*[:：][ \t]*")
        .expect("valid label regex")
});

/// A sentence end followed by another speaker's label on the same line;
/// group 1 is the word the sentence ends on
static INLINE_TURN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([\p{L}\p{N}.]*)[.!?…]["'”’)\]]*[ \t]+(\p{Lu}[\p{L}\p{N}'’]*(?:[ \t][\p{L}\p{N}'’]+){0,2})[ \t]*[:：]"#)
        .expect("valid inline turn regex")
});

/// Words whose trailing period does not end a sentence
const ABBREVIATIONS: [&str; 11] = [
    "mr", "mrs", "ms", "dr", "prof", "st", "jr", "sr", "vs", "etc", "inc",
];

/// The label found at the start of a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    /// Matched a known host/expert pattern
    Known(SpeakerId),
    /// Some other `Name:` label; speakers are assumed to alternate
    Unknown(String),
}

/// Table of label patterns to speaker roles
pub struct LabelTable {
    rules: Vec<(Regex, SpeakerId)>,
}

impl LabelTable {
    /// A table with no rules; every label is unknown
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a rule: `names` is a regex alternation matched case-insensitively
    /// at the start of a line, before a separator
    pub fn with_rule(mut self, names: &str, speaker: SpeakerId) -> Result<Self> {
        let pattern = format!(r"^(?i:{}){}", names, SEPARATOR);
        let regex = Regex::new(&pattern)
            .map_err(|e| PodcastError::Config(format!("Invalid label pattern '{}': {}", names, e)))?;
        self.rules.push((regex, speaker));
        Ok(self)
    }

    /// Split a line into its label (if any) and the spoken remainder
    pub fn classify<'a>(&self, line: &'a str) -> (Option<Label>, &'a str) {
        let line = strip_markup(line);

        for (regex, speaker) in &self.rules {
            if let Some(m) = regex.find(line) {
                return (Some(Label::Known(*speaker)), strip_markup(&line[m.end()..]));
            }
        }

        if let Some(caps) = UNKNOWN_LABEL.captures(line) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                return (None, line);
            };
            return (
                Some(Label::Unknown(name.as_str().to_string())),
                strip_markup(&line[whole.end()..]),
            );
        }

        (None, line)
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        static DEFAULT_RULES: [(&str, SpeakerId); 2] = [
            (
                r"host|speaker[ \t]*1|person[ \t]*a|interviewer|question|q",
                SpeakerId::Speaker1,
            ),
            (
                r"expert|speaker[ \t]*2|person[ \t]*b|interviewee|answer|a",
                SpeakerId::Speaker2,
            ),
        ];

        let mut table = Self::empty();
        for (names, speaker) in DEFAULT_RULES {
            let pattern = format!(r"^(?i:{}){}", names, SEPARATOR);
            if let Ok(regex) = Regex::new(&pattern) {
                table.rules.push((regex, speaker));
            }
        }
        table
    }
}

/// Markdown emphasis and quoting models like to wrap labels in
fn strip_markup(text: &str) -> &str {
    text.trim_start_matches(|c: char| c == '*' || c == '_' || c == '#' || c == '>' || c.is_whitespace())
        .trim_end()
}

/// Split a line where a new `Name:` label follows a sentence end
pub fn split_inline_turns(line: &str) -> Vec<&str> {
    let mut turns = Vec::new();
    let mut start = 0;

    for caps in INLINE_TURN.captures_iter(line) {
        let (Some(word), Some(name)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        if line[word.end()..].starts_with('.') && is_abbreviation(word.as_str()) {
            continue;
        }
        turns.push(line[start..name.start()].trim());
        start = name.start();
    }
    turns.push(line[start..].trim());

    turns.retain(|turn| !turn.is_empty());
    turns
}

/// "U.S", "e.g", single initials and common titles
fn is_abbreviation(word: &str) -> bool {
    if word.contains('.') || word.chars().count() == 1 {
        return true;
    }
    let lower = word.to_lowercase();
    ABBREVIATIONS.contains(&lower.as_str())
}

/// Parse generated text with the default label table
pub fn parse_dialogue(raw: &str) -> Vec<DialogueSegment> {
    parse_dialogue_with(raw, &LabelTable::default())
}

/// Parse generated text into ordered segments
///
/// Unlabelled lines continue the open segment. If every segment lands on
/// the same speaker, speakers are forced to alternate. If nothing could be
/// recovered, sentences of the raw text alternate instead.
pub fn parse_dialogue_with(raw: &str, table: &LabelTable) -> Vec<DialogueSegment> {
    let mut segments: Vec<DialogueSegment> = Vec::new();
    let mut open: Option<DialogueSegment> = None;

    let lines = raw.lines().map(str::trim).filter(|line| !line.is_empty());
    for turn in lines.flat_map(split_inline_turns) {
        let (label, rest) = table.classify(turn);

        let Some(label) = label else {
            match open.as_mut() {
                Some(segment) => append(&mut segment.text, rest),
                None => open = Some(DialogueSegment::new(SpeakerId::Speaker1, rest)),
            }
            continue;
        };

        let previous = open
            .as_ref()
            .or_else(|| segments.last())
            .map(|segment| segment.speaker);
        flush(&mut open, &mut segments);

        let speaker = match label {
            Label::Known(speaker) => speaker,
            Label::Unknown(_) => previous.map_or(SpeakerId::Speaker1, SpeakerId::other),
        };
        open = Some(DialogueSegment::new(speaker, rest));
    }
    flush(&mut open, &mut segments);

    if segments.is_empty() {
        debug!("No dialogue turns recovered; alternating sentences");
        return sentences(raw)
            .into_iter()
            .enumerate()
            .map(|(index, sentence)| DialogueSegment::new(SpeakerId::alternating(index), sentence))
            .collect();
    }

    if correct_alternation(&mut segments) {
        debug!("All {} turns had one speaker; forced alternation", segments.len());
    }
    segments
}

fn append(text: &mut String, more: &str) {
    if more.is_empty() {
        return;
    }
    if !text.is_empty() {
        text.push(' ');
    }
    text.push_str(more);
}

fn flush(open: &mut Option<DialogueSegment>, segments: &mut Vec<DialogueSegment>) {
    if let Some(mut segment) = open.take() {
        let trimmed = segment.text.trim();
        if !trimmed.is_empty() {
            segment.text = trimmed.to_string();
            segments.push(segment);
        }
    }
}
