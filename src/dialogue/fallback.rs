//! Rule-based dialogue fallback
//!
//! Used whenever the remote generator is unavailable or returns nothing
//! usable. Alternates sentences (or paragraphs) between the two speakers
//! behind a short host introduction. Always yields at least two segments,
//! one per speaker.

use super::segment::{DialogueSegment, SpeakerId};
use once_cell::sync::Lazy;
use regex::Regex;

/// Sentences this short are usually headings, bylines or captions
const MIN_SENTENCE_CHARS: usize = 20;

/// Paragraphs this short are usually navigation or boilerplate
const MIN_PARAGRAPH_CHARS: usize = 50;

/// The host chimes in every this many sentences
const INTERJECTION_EVERY: usize = 4;

/// Expert's line when the text has nothing speakable at all
const NOTHING_TO_SAY: &str = "There isn't much here to talk about.";

static SENTENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.!?]+[.!?]*").expect("valid sentence regex"));

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n\s*").expect("valid paragraph regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Sentences longer than 20 characters, whitespace collapsed
///
/// A sentence is a run of text ending in `.`, `!` or `?`; trailing text
/// without a terminator gets a period.
pub fn sentences(text: &str) -> Vec<String> {
    SENTENCE
        .find_iter(text)
        .filter_map(|m| {
            let sentence = collapse_whitespace(m.as_str());
            let body = sentence.trim_end_matches(|c: char| matches!(c, '.' | '!' | '?')).trim_end();
            if body.chars().count() <= MIN_SENTENCE_CHARS {
                return None;
            }
            if body.len() == sentence.len() {
                Some(format!("{}.", body))
            } else {
                Some(sentence)
            }
        })
        .collect()
}

/// Paragraphs longer than 50 characters, whitespace collapsed
pub fn paragraphs(text: &str) -> Vec<String> {
    PARAGRAPH_BREAK
        .split(text)
        .map(collapse_whitespace)
        .filter(|p| p.chars().count() > MIN_PARAGRAPH_CHARS)
        .collect()
}

/// Convert an article to dialogue without any model
pub fn rule_based_conversion(article_text: &str, title: &str) -> Vec<DialogueSegment> {
    let found = sentences(article_text);
    if found.is_empty() {
        return from_paragraphs(article_text, title);
    }

    let mut segments = Vec::with_capacity(found.len() + found.len() / INTERJECTION_EVERY + 1);
    segments.push(DialogueSegment::new(
        SpeakerId::Speaker1,
        format!("Today we're discussing {}. Let me tell you about it.", topic(title)),
    ));

    for (index, sentence) in found.into_iter().enumerate() {
        if index > 0 && index % INTERJECTION_EVERY == 0 {
            segments.push(DialogueSegment::new(
                SpeakerId::Speaker1,
                "That's interesting. Tell me more.",
            ));
        }
        // The expert opens, right after the host's introduction
        segments.push(DialogueSegment::new(SpeakerId::alternating(index).other(), sentence));
    }

    segments
}

fn from_paragraphs(article_text: &str, title: &str) -> Vec<DialogueSegment> {
    let mut found = paragraphs(article_text);
    if found.is_empty() {
        let whole = collapse_whitespace(article_text);
        if whole.is_empty() {
            found.push(NOTHING_TO_SAY.to_string());
        } else {
            found.push(whole);
        }
    }

    let mut segments = vec![DialogueSegment::new(
        SpeakerId::Speaker1,
        format!("Let's talk about {}.", topic(title)),
    )];

    for (index, paragraph) in found.into_iter().enumerate() {
        let speaker = SpeakerId::alternating(index).other();
        if speaker == SpeakerId::Speaker1 {
            segments.push(DialogueSegment::new(
                SpeakerId::Speaker1,
                "What do you think about that?",
            ));
        }
        segments.push(DialogueSegment::new(speaker, paragraph));
    }

    segments
}

fn topic(title: &str) -> &str {
    let title = title.trim().trim_end_matches(|c: char| matches!(c, '.' | '!' | '?'));
    if title.is_empty() {
        "this article"
    } else {
        title
    }
}
