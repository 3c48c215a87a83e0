//! User settings
//!
//! `Settings` is what the user edits and what gets persisted;
//! `PlaybackSettings` is the slice of it the sequencer reads.

pub mod config;

use std::fmt;
use std::str::FromStr;

pub const DEFAULT_ACCENT1: &str = "en-US";
pub const DEFAULT_ACCENT2: &str = "en-IN";
pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;

/// Keep a speed multiplier within the supported range
///
/// Non-finite values fall back to normal speed.
pub fn clamp_speed(speed: f32) -> f32 {
    if speed.is_finite() {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    } else {
        1.0
    }
}

/// Caption colour scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            other => Err(format!("unknown theme '{}'", other)),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dark => write!(f, "dark"),
            Self::Light => write!(f, "light"),
        }
    }
}

/// Persisted user settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Locale tag for the host voice
    pub accent1: String,
    /// Locale tag for the expert voice
    pub accent2: String,
    /// Speech rate multiplier, 0.5 to 2.0
    pub speed: f32,
    pub theme: Theme,
    /// Explicit voice name for the host, overriding `accent1`
    pub voice1: Option<String>,
    /// Explicit voice name for the expert, overriding `accent2`
    pub voice2: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            accent1: DEFAULT_ACCENT1.to_string(),
            accent2: DEFAULT_ACCENT2.to_string(),
            speed: 1.0,
            theme: Theme::Dark,
            voice1: None,
            voice2: None,
        }
    }
}

impl Settings {
    pub fn playback(&self) -> PlaybackSettings {
        PlaybackSettings {
            accent1: self.accent1.clone(),
            accent2: self.accent2.clone(),
            speed: clamp_speed(self.speed),
            voice1: self.voice1.clone(),
            voice2: self.voice2.clone(),
        }
    }
}

/// What the sequencer needs from the settings
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSettings {
    pub accent1: String,
    pub accent2: String,
    pub speed: f32,
    pub voice1: Option<String>,
    pub voice2: Option<String>,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Settings::default().playback()
    }
}
