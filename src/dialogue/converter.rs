//! Article to dialogue conversion
//!
//! Tries the remote generator chunk by chunk and falls back to the
//! rule-based segmenter on any failure.

use super::fallback::rule_based_conversion;
use super::generator::TextGenerator;
use super::parser::parse_dialogue;
use super::segment::{DialogueSegment, SpeakerId};
use crate::{PodcastError, Result};
use log::{debug, info, warn};

/// Shorter input is treated as a failed extraction
pub const MIN_ARTICLE_CHARS: usize = 100;

/// Words per generation chunk; small models have short context windows
pub const CHUNK_WORDS: usize = 500;

/// Characters of the opening turn quoted in the host's introduction
const INTRO_PREVIEW_CHARS: usize = 100;

const HOST_INTERJECTIONS: [&str; 3] = ["That's interesting.", "Tell me more about that.", "I see."];
const EXPERT_INTERJECTIONS: [&str; 3] = ["Right.", "Exactly.", "Good point."];

/// Split text into chunks of at most `max_words` whitespace-separated words
pub fn split_into_chunks(text: &str, max_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(max_words.max(1))
        .map(|chunk| chunk.join(" "))
        .collect()
}

/// Prompt for one chunk; the first chunk asks for an introduction
pub fn create_prompt(chunk: &str, is_first: bool, title: &str) -> String {
    if is_first {
        format!(
            "Convert this article into a natural conversation between two people \
             (Host and Expert) discussing the topic. Make it engaging and podcast-style. \
             Start with an introduction.\n\nTitle: {}\n\nArticle: {}\n\nConversation:",
            title, chunk
        )
    } else {
        format!(
            "Continue the conversation about this topic:\n\n{}\n\nConversation:",
            chunk
        )
    }
}

/// Rule-based touch-ups on a parsed chunk
///
/// The first chunk gets a host introduction. Wherever one speaker would talk
/// twice in a row, the other speaker interjects. Interjections rotate through
/// a fixed list so output is reproducible.
pub fn enhance_dialogue(segments: Vec<DialogueSegment>, chunk_index: usize) -> Vec<DialogueSegment> {
    let mut enhanced = Vec::with_capacity(segments.len() + 1);
    let mut rotation = 0usize;

    for (index, segment) in segments.into_iter().enumerate() {
        if index == 0 && chunk_index == 0 {
            let preview: String = segment.text.chars().take(INTRO_PREVIEW_CHARS).collect();
            enhanced.push(DialogueSegment::new(
                SpeakerId::Speaker1,
                format!("Today we're discussing: {}...", preview),
            ));
        }

        let repeats = enhanced
            .last()
            .map_or(false, |last: &DialogueSegment| last.speaker == segment.speaker);
        if repeats {
            let speaker = segment.speaker.other();
            let phrases = match speaker {
                SpeakerId::Speaker1 => &HOST_INTERJECTIONS,
                SpeakerId::Speaker2 => &EXPERT_INTERJECTIONS,
            };
            enhanced.push(DialogueSegment::new(speaker, phrases[rotation % phrases.len()]));
            rotation += 1;
        }

        enhanced.push(segment);
    }

    enhanced
}

/// Convert an article into dialogue
///
/// Fails only when the text is too short to be an article. Without a
/// generator, or when generation fails or yields nothing, the rule-based
/// segmenter is used.
pub async fn convert_to_dialogue(
    generator: Option<&dyn TextGenerator>,
    article_text: &str,
    title: &str,
) -> Result<Vec<DialogueSegment>> {
    let length = article_text.trim().chars().count();
    if length < MIN_ARTICLE_CHARS {
        return Err(PodcastError::InsufficientContent {
            length,
            minimum: MIN_ARTICLE_CHARS,
        });
    }

    let Some(generator) = generator else {
        debug!("No generator configured; using rule-based conversion");
        return Ok(rule_based_conversion(article_text, title));
    };

    match generate_dialogue(generator, article_text, title).await {
        Ok(segments) if !segments.is_empty() => {
            info!("Generated {} dialogue segments", segments.len());
            Ok(segments)
        }
        Ok(_) => {
            warn!("Generator produced no dialogue; using rule-based conversion");
            Ok(rule_based_conversion(article_text, title))
        }
        Err(e) => {
            warn!("Dialogue generation failed: {}; using rule-based conversion", e);
            Ok(rule_based_conversion(article_text, title))
        }
    }
}

async fn generate_dialogue(
    generator: &dyn TextGenerator,
    article_text: &str,
    title: &str,
) -> Result<Vec<DialogueSegment>> {
    generator.ensure_ready().await?;

    let chunks = split_into_chunks(article_text, CHUNK_WORDS);
    let mut dialogue = Vec::new();

    for (index, chunk) in chunks.iter().enumerate() {
        debug!("Generating chunk {}/{}", index + 1, chunks.len());
        let request = generator.request(create_prompt(chunk, index == 0, title));
        let raw = generator.generate(&request).await?;
        dialogue.extend(enhance_dialogue(parse_dialogue(&raw), index));
    }

    Ok(dialogue)
}
