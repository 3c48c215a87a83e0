//! Dialogue segments

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two voices in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerId {
    /// The host, who asks and introduces
    Speaker1,
    /// The expert, who explains
    Speaker2,
}

impl SpeakerId {
    pub fn other(self) -> Self {
        match self {
            Self::Speaker1 => Self::Speaker2,
            Self::Speaker2 => Self::Speaker1,
        }
    }

    /// speaker1 for even indexes, speaker2 for odd
    pub fn alternating(index: usize) -> Self {
        if index % 2 == 0 {
            Self::Speaker1
        } else {
            Self::Speaker2
        }
    }

    /// Name shown in captions
    pub fn label(self) -> &'static str {
        match self {
            Self::Speaker1 => "Host",
            Self::Speaker2 => "Expert",
        }
    }
}

impl fmt::Display for SpeakerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Speaker1 => write!(f, "speaker1"),
            Self::Speaker2 => write!(f, "speaker2"),
        }
    }
}

/// One attributed turn of dialogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueSegment {
    pub speaker: SpeakerId,
    pub text: String,
}

impl DialogueSegment {
    pub fn new(speaker: SpeakerId, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }
}

/// Force `speaker1, speaker2, speaker1, ...` when every segment has the
/// same speaker; leaves mixed lists alone.
pub fn correct_alternation(segments: &mut [DialogueSegment]) -> bool {
    let Some(first) = segments.first().map(|s| s.speaker) else {
        return false;
    };
    if segments.len() < 2 || segments.iter().any(|s| s.speaker != first) {
        return false;
    }

    for (index, segment) in segments.iter_mut().enumerate() {
        segment.speaker = SpeakerId::alternating(index);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_names() {
        let segment = DialogueSegment::new(SpeakerId::Speaker2, "Hi");
        let json = serde_json::to_string(&segment).unwrap();
        assert_eq!(json, r#"{"speaker":"speaker2","text":"Hi"}"#);
    }

    #[test]
    fn test_correct_alternation_same_speaker() {
        let mut segments = vec![
            DialogueSegment::new(SpeakerId::Speaker1, "A"),
            DialogueSegment::new(SpeakerId::Speaker1, "B"),
        ];
        assert!(correct_alternation(&mut segments));
        assert_eq!(
            segments,
            vec![
                DialogueSegment::new(SpeakerId::Speaker1, "A"),
                DialogueSegment::new(SpeakerId::Speaker2, "B"),
            ]
        );
    }

    #[test]
    fn test_correct_alternation_all_speaker2() {
        let mut segments: Vec<_> = ["one", "two", "three", "four", "five"]
            .iter()
            .map(|t| DialogueSegment::new(SpeakerId::Speaker2, *t))
            .collect();
        assert!(correct_alternation(&mut segments));

        let speakers: Vec<_> = segments.iter().map(|s| s.speaker).collect();
        assert_eq!(
            speakers,
            vec![
                SpeakerId::Speaker1,
                SpeakerId::Speaker2,
                SpeakerId::Speaker1,
                SpeakerId::Speaker2,
                SpeakerId::Speaker1,
            ]
        );
        let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three", "four", "five"]);
    }

    #[test]
    fn test_correct_alternation_leaves_mixed_and_single() {
        let mut mixed = vec![
            DialogueSegment::new(SpeakerId::Speaker1, "A"),
            DialogueSegment::new(SpeakerId::Speaker2, "B"),
            DialogueSegment::new(SpeakerId::Speaker2, "C"),
        ];
        assert!(!correct_alternation(&mut mixed));
        assert_eq!(mixed[2].speaker, SpeakerId::Speaker2);

        let mut single = vec![DialogueSegment::new(SpeakerId::Speaker2, "A")];
        assert!(!correct_alternation(&mut single));
        assert!(!correct_alternation(&mut []));
    }
}
