//! Platform speech channel abstraction
//!
//! The platform speech subsystem is a single serial resource: at most one
//! utterance is ever in flight. Backends accept an utterance request and
//! report its fate later through a oneshot completion.

use crate::platform::Platform;
use crate::{lock, PodcastError, Result};
use log::info;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};

/// Voice gender as reported by the platform, when it reports one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceGender {
    Male,
    Female,
}

/// Opaque reference to an installed synthesis voice
///
/// Owned by the platform voice registry; identity is the backend `id`.
#[derive(Debug, Clone)]
pub struct VoiceHandle {
    pub id: String,
    pub name: String,
    /// Language/locale tag as the backend reports it (e.g. "en-US", "en-us")
    pub language: String,
    pub gender: Option<VoiceGender>,
    /// Whether the platform marks this voice as its default
    pub is_default: bool,
}

impl VoiceHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: language.into(),
            gender: None,
            is_default: false,
        }
    }

    pub fn with_gender(mut self, gender: VoiceGender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Same installed voice (by registry identity, not by display name)
    pub fn same_voice(&self, other: &VoiceHandle) -> bool {
        self.id == other.id
    }

    /// Female voices by metadata, or by naming convention when there is none
    pub fn sounds_female(&self) -> bool {
        match self.gender {
            Some(gender) => gender == VoiceGender::Female,
            None => self.name.to_lowercase().contains("female"),
        }
    }
}

impl PartialEq for VoiceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_voice(other)
    }
}

impl fmt::Display for VoiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.language)
    }
}

/// A single synthesis request
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    /// None speaks in the platform default voice
    pub voice: Option<VoiceHandle>,
    /// Rate multiplier, 1.0 is the platform's normal rate
    pub rate: f32,
    /// Pitch multiplier, 1.0 is the platform's normal pitch
    pub pitch: f32,
    /// Volume from 0.0 to 1.0
    pub volume: f32,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

/// How an utterance ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceOutcome {
    /// Played to the end
    Finished,
    /// Cancelled by a stop or by a newer utterance
    Interrupted,
    /// Synthesis failed for another reason
    Failed(String),
}

/// Resolves once the utterance finishes, is interrupted, or fails.
///
/// A dropped sender counts as an interruption.
pub type Completion = oneshot::Receiver<UtteranceOutcome>;

/// Platform speech channel
///
/// Backends implement this to give the player a serial speech resource.
pub trait SpeechChannel: Send {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Snapshot of the voice registry as it is right now
    ///
    /// May be empty while the platform is still loading voices.
    fn voices(&self) -> Result<Vec<VoiceHandle>>;

    /// Notification that fires whenever the voice registry changes
    fn registry_updates(&self) -> Option<watch::Receiver<u64>> {
        None
    }

    /// Issue an utterance; the caller must cancel any in-flight one first
    fn speak(&mut self, utterance: &Utterance) -> Result<Completion>;

    /// Cancel the in-flight utterance, if any
    fn cancel(&mut self) -> Result<()>;

    /// Suspend the in-flight utterance in place
    ///
    /// Returns `PodcastError::Unsupported` when the platform cannot pause.
    fn pause(&mut self) -> Result<()> {
        Err(PodcastError::Unsupported("pause"))
    }

    /// Continue a suspended utterance
    fn resume(&mut self) -> Result<()> {
        Err(PodcastError::Unsupported("resume"))
    }
}

/// The speech channel, shared by the resolver, player and sequencer
pub type SharedChannel = Arc<Mutex<Box<dyn SpeechChannel>>>;

/// Wrap a backend for sharing
pub fn share(channel: Box<dyn SpeechChannel>) -> SharedChannel {
    Arc::new(Mutex::new(channel))
}

/// Which backend to create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Pick by platform
    Auto,
    /// The `tts` crate (Speech Dispatcher, AVFoundation, WinRT)
    Native,
    /// espeak-ng subprocesses
    Espeak,
}

impl BackendKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "auto" | "" => Some(Self::Auto),
            "native" | "tts" => Some(Self::Native),
            "espeak" | "espeak-ng" => Some(Self::Espeak),
            _ => None,
        }
    }
}

type Constructor = fn() -> Result<Box<dyn SpeechChannel>>;

/// Create a platform-appropriate speech channel
///
/// **WSL:** espeak-ng first (Speech Dispatcher is rarely configured there),
/// then the native backend.
///
/// **Native Linux:** Speech Dispatcher through the native backend, then
/// espeak-ng.
///
/// **macOS / Windows:** the native backend.
pub fn create_channel(kind: BackendKind) -> Result<Box<dyn SpeechChannel>> {
    match kind {
        BackendKind::Native => return native_channel(),
        BackendKind::Espeak => return espeak_channel(),
        BackendKind::Auto => {}
    }

    let platform = Platform::current();
    let attempts: Vec<(&str, Constructor)> = match platform {
        Platform::Wsl => {
            info!("Detected WSL environment");
            vec![
                ("espeak-ng", espeak_channel as Constructor),
                ("Speech Dispatcher", native_channel as Constructor),
            ]
        }
        Platform::Linux => {
            info!("Detected native Linux environment");
            vec![
                ("Speech Dispatcher", native_channel as Constructor),
                ("espeak-ng", espeak_channel as Constructor),
            ]
        }
        _ => vec![("native TTS", native_channel as Constructor)],
    };

    let mut failures = Vec::new();
    for (label, create) in attempts {
        info!("Trying {} backend...", label);
        match create() {
            Ok(channel) => {
                info!("✓ Successfully initialized {} backend", label);
                return Ok(channel);
            }
            Err(e) => {
                info!("✗ {} backend unavailable: {}", label, e);
                failures.push(format!("{}: {}", label, e));
            }
        }
    }

    let hint = match platform {
        Platform::Wsl | Platform::Linux => {
            "\nInstall speech-dispatcher or espeak-ng (sudo apt install espeak-ng)"
        }
        _ => "",
    };
    Err(PodcastError::Speech(format!(
        "No speech backend available on {:?}. Tried:\n  {}{}",
        platform,
        failures.join("\n  "),
        hint
    )))
}

fn native_channel() -> Result<Box<dyn SpeechChannel>> {
    Ok(Box::new(super::backends::native::NativeChannel::new()?))
}

fn espeak_channel() -> Result<Box<dyn SpeechChannel>> {
    Ok(Box::new(super::backends::espeak::EspeakChannel::new()?))
}

/// Voices currently installed, through the shared channel
pub fn list_voices(channel: &SharedChannel) -> Result<Vec<VoiceHandle>> {
    lock(channel).voices()
}
