//! Voice resolution
//!
//! Maps an accent/locale tag onto an installed voice, and keeps the two
//! speakers on distinct voices whenever the registry allows it.
//!
//! The registry is re-read on every call: platforms load voices lazily and
//! a list cached at startup is often empty.

use crate::dialogue::SpeakerId;
use crate::speech::channel::{SharedChannel, VoiceHandle};
use crate::state::PlaybackSettings;
use crate::lock;
use log::{debug, warn};

/// Voices chosen for the two speakers
///
/// `None` means the platform registry was empty; the platform default
/// voice speaks instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedVoices {
    pub voice1: Option<VoiceHandle>,
    pub voice2: Option<VoiceHandle>,
}

impl ResolvedVoices {
    pub fn for_speaker(&self, speaker: SpeakerId) -> Option<&VoiceHandle> {
        match speaker {
            SpeakerId::Speaker1 => self.voice1.as_ref(),
            SpeakerId::Speaker2 => self.voice2.as_ref(),
        }
    }

    /// Both speakers ended up on the same installed voice
    pub fn is_shared(&self) -> bool {
        matches!((&self.voice1, &self.voice2), (Some(a), Some(b)) if a.same_voice(b))
    }
}

/// Resolves locale tags against the live voice registry
#[derive(Clone)]
pub struct VoiceResolver {
    channel: SharedChannel,
}

impl VoiceResolver {
    pub fn new(channel: SharedChannel) -> Self {
        Self { channel }
    }

    /// Fresh registry snapshot; a failing registry reads as empty
    fn snapshot(&self) -> Vec<VoiceHandle> {
        match lock(&self.channel).voices() {
            Ok(voices) => voices,
            Err(e) => {
                warn!("Failed to read voice registry: {}", e);
                Vec::new()
            }
        }
    }

    /// Best installed voice for `tag`, or None if no voices are installed
    pub fn resolve(&self, tag: &str) -> Option<VoiceHandle> {
        select_voice(&self.snapshot(), tag)
    }

    /// Voices for two speakers, distinct when an alternative exists
    pub fn resolve_distinct(&self, tag1: &str, tag2: &str) -> ResolvedVoices {
        select_distinct(&self.snapshot(), tag1, tag2)
    }

    /// Voices for playback settings, honouring explicit voice choices
    pub fn resolve_settings(&self, settings: &PlaybackSettings) -> ResolvedVoices {
        let voices = self.snapshot();
        let resolved = select_for_settings(&voices, settings);
        debug!(
            "Resolved voices from {} installed: speaker1={:?} speaker2={:?}",
            voices.len(),
            resolved.voice1.as_ref().map(|v| v.to_string()),
            resolved.voice2.as_ref().map(|v| v.to_string()),
        );
        resolved
    }
}

/// Lowercase, with `_` treated as the region separator
fn normalize(tag: &str) -> String {
    tag.trim().replace('_', "-").to_lowercase()
}

fn primary(tag: &str) -> &str {
    tag.split('-').next().unwrap_or(tag)
}

/// Pick the best voice for `tag`:
/// exact locale, then locale prefix, then primary language,
/// then the platform default, then the first voice.
pub fn select_voice(voices: &[VoiceHandle], tag: &str) -> Option<VoiceHandle> {
    let wanted = normalize(tag);

    let by_locale = if wanted.is_empty() {
        None
    } else {
        let langs: Vec<String> = voices.iter().map(|v| normalize(&v.language)).collect();
        let language = primary(&wanted);

        langs
            .iter()
            .position(|lang| *lang == wanted)
            .or_else(|| langs.iter().position(|lang| lang.starts_with(&wanted)))
            .or_else(|| langs.iter().position(|lang| primary(lang) == language))
    };

    by_locale
        .map(|i| &voices[i])
        .or_else(|| voices.iter().find(|v| v.is_default))
        .or_else(|| voices.first())
        .cloned()
}

/// Resolve both tags, then move speaker 2 off speaker 1's voice if possible
///
/// Prefers another voice in tag2's language, then any other voice. With
/// only one voice installed both speakers share it.
pub fn select_distinct(voices: &[VoiceHandle], tag1: &str, tag2: &str) -> ResolvedVoices {
    let voice1 = select_voice(voices, tag1);
    let voice2 = select_voice(voices, tag2);
    ResolvedVoices {
        voice2: distinct_from(voices, voice1.as_ref(), voice2, tag2),
        voice1,
    }
}

fn distinct_from(
    voices: &[VoiceHandle],
    taken: Option<&VoiceHandle>,
    candidate: Option<VoiceHandle>,
    tag: &str,
) -> Option<VoiceHandle> {
    let (taken, candidate) = match (taken, candidate) {
        (Some(taken), Some(candidate)) if taken.same_voice(&candidate) => (taken, candidate),
        (_, candidate) => return candidate,
    };

    let wanted = normalize(tag);
    let language = primary(&wanted);
    let others = || voices.iter().filter(|v| !v.same_voice(taken));

    let substitute = others()
        .find(|v| primary(&normalize(&v.language)) == language)
        .or_else(|| others().next())
        .cloned();

    match substitute {
        Some(voice) => {
            debug!("Speaker voices collided on {}; using {} instead", taken, voice);
            Some(voice)
        }
        None => {
            debug!("Only one voice installed; both speakers use {}", taken);
            Some(candidate)
        }
    }
}

/// Installed voice with this id or display name
pub fn find_named(voices: &[VoiceHandle], name: &str) -> Option<VoiceHandle> {
    let name = name.trim();
    voices
        .iter()
        .find(|v| v.id == name)
        .or_else(|| voices.iter().find(|v| v.name.eq_ignore_ascii_case(name)))
        .cloned()
}

/// Resolve settings: an explicit voice name wins over the accent
pub fn select_for_settings(voices: &[VoiceHandle], settings: &PlaybackSettings) -> ResolvedVoices {
    let named = |name: &Option<String>| {
        let name = name.as_deref()?;
        let found = find_named(voices, name);
        if found.is_none() {
            warn!("Voice '{}' is not installed; falling back to accent", name);
        }
        found
    };

    let voice1 = named(&settings.voice1).or_else(|| select_voice(voices, &settings.accent1));
    let voice2 = match named(&settings.voice2) {
        Some(explicit) => Some(explicit),
        None => distinct_from(
            voices,
            voice1.as_ref(),
            select_voice(voices, &settings.accent2),
            &settings.accent2,
        ),
    };

    ResolvedVoices { voice1, voice2 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Vec<VoiceHandle> {
        vec![
            VoiceHandle::new("alex", "Alex", "en-US").as_default(),
            VoiceHandle::new("samantha", "Samantha", "en-US"),
            VoiceHandle::new("daniel", "Daniel", "en-GB"),
            VoiceHandle::new("rishi", "Rishi", "en-IN"),
            VoiceHandle::new("thomas", "Thomas", "fr-FR"),
        ]
    }

    #[test]
    fn test_exact_match_first() {
        let voice = select_voice(&registry(), "en-GB").unwrap();
        assert_eq!(voice.id, "daniel");
    }

    #[test]
    fn test_match_ignores_case_and_underscore() {
        let voice = select_voice(&registry(), "en_in").unwrap();
        assert_eq!(voice.id, "rishi");
    }

    #[test]
    fn test_prefix_match() {
        let voice = select_voice(&registry(), "fr").unwrap();
        assert_eq!(voice.id, "thomas");
    }

    #[test]
    fn test_primary_language_match() {
        let voice = select_voice(&registry(), "en-AU").unwrap();
        assert_eq!(voice.id, "alex");

        let voice = select_voice(&registry(), "fr-CA").unwrap();
        assert_eq!(voice.id, "thomas");
    }

    #[test]
    fn test_default_then_first_voice() {
        let voice = select_voice(&registry(), "ja-JP").unwrap();
        assert_eq!(voice.id, "alex");

        let no_default = vec![
            VoiceHandle::new("thomas", "Thomas", "fr-FR"),
            VoiceHandle::new("anna", "Anna", "de-DE"),
        ];
        assert_eq!(select_voice(&no_default, "ja-JP").unwrap().id, "thomas");
    }

    #[test]
    fn test_empty_registry() {
        assert!(select_voice(&[], "en-US").is_none());
        assert_eq!(select_distinct(&[], "en-US", "en-IN"), ResolvedVoices::default());
    }

    #[test]
    fn test_distinct_keeps_different_voices() {
        let resolved = select_distinct(&registry(), "en-US", "en-IN");
        assert_eq!(resolved.voice1.unwrap().id, "alex");
        assert_eq!(resolved.voice2.unwrap().id, "rishi");
    }

    #[test]
    fn test_distinct_prefers_same_language() {
        let resolved = select_distinct(&registry(), "en-US", "en-US");
        assert_eq!(resolved.voice1.as_ref().unwrap().id, "alex");
        assert_eq!(resolved.voice2.as_ref().unwrap().id, "samantha");
        assert!(!resolved.is_shared());
    }

    #[test]
    fn test_distinct_falls_back_to_any_other_voice() {
        let voices = vec![
            VoiceHandle::new("alex", "Alex", "en-US"),
            VoiceHandle::new("thomas", "Thomas", "fr-FR"),
        ];
        let resolved = select_distinct(&voices, "en-US", "en-IN");
        assert_eq!(resolved.voice1.unwrap().id, "alex");
        assert_eq!(resolved.voice2.unwrap().id, "thomas");
    }

    #[test]
    fn test_single_voice_is_shared() {
        let voices = vec![VoiceHandle::new("alex", "Alex", "en-US")];
        let resolved = select_distinct(&voices, "en-US", "en-IN");
        assert!(resolved.is_shared());
    }

    #[test]
    fn test_settings_named_voice_wins() {
        let settings = PlaybackSettings {
            voice1: Some("Daniel".to_string()),
            voice2: Some("missing".to_string()),
            ..PlaybackSettings::default()
        };
        let resolved = select_for_settings(&registry(), &settings);
        assert_eq!(resolved.voice1.unwrap().id, "daniel");
        // Unknown name falls back to the en-IN accent
        assert_eq!(resolved.voice2.unwrap().id, "rishi");
    }

    #[test]
    fn test_settings_distinct_after_accent_collision() {
        let settings = PlaybackSettings {
            accent1: "en-US".to_string(),
            accent2: "en-US".to_string(),
            ..PlaybackSettings::default()
        };
        let resolved = select_for_settings(&registry(), &settings);
        assert!(!resolved.is_shared());
    }
}
