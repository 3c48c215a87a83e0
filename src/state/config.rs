//! Configuration management

use super::{clamp_speed, Settings, Theme, DEFAULT_ACCENT1, DEFAULT_ACCENT2};
use crate::dialogue::GeneratorConfig;
use crate::speech::BackendKind;
use crate::{PodcastError, Result};
use ini::Ini;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Value meaning "no explicit voice" for `voice1`/`voice2`
const DEFAULT_VOICE: &str = "default";

/// Persistent configuration
///
/// Backed by an INI file; missing keys read as their defaults, so an old or
/// hand-edited file never prevents startup.
pub struct Config {
    /// INI configuration storage
    ini: Ini,

    /// Config file path (~/.webpodcast.cfg)
    path: PathBuf,
}

impl Config {
    /// Load configuration from the home directory or create the default
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from `path`, writing defaults there if absent
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        debug!("Loading config from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(&path)
                .map_err(|e| PodcastError::IniParse(format!("Failed to load config: {}", e)))?
        } else {
            info!("Config file not found, creating default");
            let default = Self::default_config();
            default
                .write_to_file(&path)
                .map_err(|e| PodcastError::IniParse(format!("Failed to write config: {}", e)))?;
            default
        };

        Ok(Self { ini, path })
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        debug!("Saving config to {:?}", self.path);
        self.ini
            .write_to_file(&self.path)
            .map_err(|e| PodcastError::Config(format!("Failed to save config: {}", e)))
    }

    /// Get config file path (~/.webpodcast.cfg)
    fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".webpodcast.cfg")
    }

    /// Expose the config file path for display
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create default configuration
    fn default_config() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("playback"))
            .set("accent1", DEFAULT_ACCENT1)
            .set("accent2", DEFAULT_ACCENT2)
            .set("speed", "1.0")
            .set("voice1", DEFAULT_VOICE)
            .set("voice2", DEFAULT_VOICE)
            .set("speaker_pause_ms", "300");

        ini.with_section(Some("ui")).set("theme", "dark");

        ini.with_section(Some("speech")).set("backend", "auto");

        ini.with_section(Some("generator"))
            .set("endpoint", "")
            .set("model", "Xenova/t5-small")
            .set("timeout_secs", "120")
            .set("max_new_tokens", "300")
            .set("temperature", "0.7")
            .set("top_p", "0.9");

        ini
    }

    /// Get a string value from config
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .unwrap_or(default)
            .to_string()
    }

    /// Get an unsigned integer value from config
    pub fn get_u64(&self, section: &str, key: &str, default: u64) -> u64 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Get a float value from config
    pub fn get_float(&self, section: &str, key: &str, default: f32) -> f32 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn get_voice(&self, key: &str) -> Option<String> {
        let name = self.get_string("playback", key, DEFAULT_VOICE);
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case(DEFAULT_VOICE) {
            None
        } else {
            Some(name.to_string())
        }
    }

    /// Current user settings
    pub fn settings(&self) -> Settings {
        let theme = self.get_string("ui", "theme", "dark");
        let theme = theme.parse().unwrap_or_else(|e| {
            warn!("{}; using dark", e);
            Theme::Dark
        });

        Settings {
            accent1: self.get_string("playback", "accent1", DEFAULT_ACCENT1),
            accent2: self.get_string("playback", "accent2", DEFAULT_ACCENT2),
            speed: clamp_speed(self.get_float("playback", "speed", 1.0)),
            theme,
            voice1: self.get_voice("voice1"),
            voice2: self.get_voice("voice2"),
        }
    }

    /// Store `settings` and write the file
    pub fn save_settings(&mut self, settings: &Settings) -> Result<()> {
        let speed = format!("{:.2}", clamp_speed(settings.speed));
        let theme = settings.theme.to_string();

        self.ini
            .with_section(Some("playback"))
            .set("accent1", settings.accent1.as_str())
            .set("accent2", settings.accent2.as_str())
            .set("speed", speed)
            .set("voice1", settings.voice1.as_deref().unwrap_or(DEFAULT_VOICE))
            .set("voice2", settings.voice2.as_deref().unwrap_or(DEFAULT_VOICE));
        self.ini.with_section(Some("ui")).set("theme", theme);

        self.save()
    }

    /// Silence inserted when the speaker changes
    pub fn speaker_pause(&self) -> Duration {
        Duration::from_millis(self.get_u64("playback", "speaker_pause_ms", 300))
    }

    /// Which speech backend to create
    pub fn backend(&self) -> BackendKind {
        let value = self.get_string("speech", "backend", "auto");
        BackendKind::parse(&value).unwrap_or_else(|| {
            warn!("Unknown speech backend '{}'; using auto", value);
            BackendKind::Auto
        })
    }

    /// Remote generator settings; `None` when no endpoint is configured
    pub fn generator(&self) -> Option<GeneratorConfig> {
        let endpoint = self.get_string("generator", "endpoint", "");
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return None;
        }

        let mut config = GeneratorConfig::new(endpoint);
        config.model = self.get_string("generator", "model", &config.model);
        config.timeout = Duration::from_secs(self.get_u64("generator", "timeout_secs", 120));
        config.max_new_tokens =
            self.get_u64("generator", "max_new_tokens", 300).min(u32::MAX as u64) as u32;
        config.temperature = self.get_float("generator", "temperature", config.temperature);
        config.top_p = self.get_float("generator", "top_p", config.top_p);
        Some(config)
    }
}
