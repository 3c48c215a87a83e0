//! espeak-ng backend
//!
//! Speaks each utterance with its own espeak-ng process. Completion is the
//! process exiting; cancellation kills it. On Unix a paused utterance is a
//! stopped process (SIGSTOP/SIGCONT), so pause resumes mid-sentence here.
//!
//! The voice list comes from `espeak-ng --voices`, read on a background
//! thread so startup doesn't wait on it. Listeners learn about the loaded
//! registry through `registry_updates`.
//!
//! Dependencies:
//! - espeak-ng (install with: sudo apt install espeak-ng)
//! - PulseAudio client libraries on WSL (usually pre-installed with WSLG)

use crate::platform::{is_wsl, wslg_pulse_server, WSLG_PULSE_SERVER};
use crate::speech::channel::{
    Completion, SpeechChannel, Utterance, UtteranceOutcome, VoiceGender, VoiceHandle,
};
use crate::{lock, PodcastError, Result};
use log::{debug, error, info, warn};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};

/// espeak-ng's default speed in words per minute
const NORMAL_WPM: f32 = 175.0;

/// espeak-ng's pitch scale is 0-99 with 50 as normal
const NORMAL_PITCH: f32 = 50.0;

/// Process id of a spawned espeak-ng, present until the process is reaped
///
/// The waiter task clears it once the process has exited, so a signal never
/// goes to a pid the kernel may have handed to something else.
#[derive(Clone, Default)]
struct ProcessSlot(Arc<Mutex<Option<u32>>>);

impl ProcessSlot {
    fn new(pid: Option<u32>) -> Self {
        Self(Arc::new(Mutex::new(pid)))
    }

    fn clear(&self) {
        lock(&self.0).take();
    }

    /// Run `f` on the live pid, holding the slot so the waiter cannot clear
    /// it underneath
    fn with_pid<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(u32) -> Result<()>,
    {
        let slot = lock(&self.0);
        match *slot {
            Some(pid) => f(pid),
            None => Err(PodcastError::Unsupported("no utterance in flight")),
        }
    }
}

/// The utterance currently being spoken
struct Running {
    /// Process id, for suspend/resume
    process: ProcessSlot,
    /// Asks the waiter task to kill the process
    kill: oneshot::Sender<()>,
}

/// espeak-ng backend
pub struct EspeakChannel {
    /// Path to espeak-ng
    espeak_path: String,

    /// Voice registry, filled in by the background loader
    voices: Arc<Mutex<Vec<VoiceHandle>>>,

    /// Bumped every time the registry changes
    registry: watch::Receiver<u64>,

    /// Currently running espeak-ng process
    current: Option<Running>,

    /// Whether the running process is stopped
    paused: bool,

    /// PulseAudio server handed to each espeak-ng process
    pulse_server: Option<&'static Path>,
}

impl EspeakChannel {
    /// PulseAudio server espeak-ng should talk to
    ///
    /// Under WSL without `PULSE_SERVER` set, audio only works through the
    /// WSLG socket.
    fn pulse_server() -> Option<&'static Path> {
        if std::env::var_os("PULSE_SERVER").is_some() {
            debug!("PULSE_SERVER already set via environment");
            return None;
        }
        if !is_wsl() {
            return None;
        }

        let server = wslg_pulse_server();
        match server {
            Some(path) => info!("Auto-detected WSLG PulseAudio server at {}", path.display()),
            None => {
                warn!("WSLG PulseAudio server not found at {}", WSLG_PULSE_SERVER);
                warn!("Set PULSE_SERVER if espeak-ng produces no audio");
            }
        }
        server
    }

    /// Create a new espeak-ng channel
    ///
    /// Verifies espeak-ng is installed and starts loading its voice list.
    pub fn new() -> Result<Self> {
        debug!("Creating espeak-ng backend");

        let pulse_server = Self::pulse_server();
        let espeak_path = Self::find_espeak()?;
        debug!("Found espeak-ng at: {}", espeak_path);

        let voices = Arc::new(Mutex::new(Vec::new()));
        let (registry_tx, registry) = watch::channel(0u64);

        let loader_voices = Arc::clone(&voices);
        let loader_path = espeak_path.clone();
        std::thread::spawn(move || match Self::load_voices(&loader_path) {
            Ok(loaded) => {
                info!("Loaded {} espeak-ng voices", loaded.len());
                *lock(&loader_voices) = loaded;
                registry_tx.send_modify(|generation| *generation += 1);
            }
            Err(e) => warn!("Failed to list espeak-ng voices: {}", e),
        });

        Ok(Self {
            espeak_path,
            voices,
            registry,
            current: None,
            paused: false,
            pulse_server,
        })
    }

    /// Find espeak-ng executable
    fn find_espeak() -> Result<String> {
        let paths = ["espeak-ng", "/usr/bin/espeak-ng", "/usr/local/bin/espeak-ng"];

        for path in paths {
            if let Ok(status) = Command::new(path)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                if status.success() {
                    return Ok(path.to_string());
                }
            }
        }

        Err(PodcastError::Speech(
            "espeak-ng not found. Install with: sudo apt install espeak-ng".to_string(),
        ))
    }

    fn load_voices(espeak_path: &str) -> Result<Vec<VoiceHandle>> {
        let output = Command::new(espeak_path)
            .arg("--voices")
            .stderr(Stdio::null())
            .output()?;

        if !output.status.success() {
            return Err(PodcastError::Speech(format!(
                "espeak-ng --voices exited with {}",
                output.status
            )));
        }

        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Convert a rate multiplier to espeak speed (80-450 wpm)
    fn rate_to_wpm(multiplier: f32) -> u16 {
        (NORMAL_WPM * multiplier).clamp(80.0, 450.0).round() as u16
    }

    /// Convert a pitch multiplier to espeak pitch (0-99)
    fn pitch_to_espeak(multiplier: f32) -> u8 {
        (NORMAL_PITCH * multiplier).clamp(0.0, 99.0).round() as u8
    }

    /// Convert volume (0.0-1.0) to espeak amplitude (0-200)
    fn volume_to_amplitude(volume: f32) -> u8 {
        (volume.clamp(0.0, 1.0) * 200.0).round() as u8
    }

    #[cfg(unix)]
    fn signal_current(&self, signal: nix::sys::signal::Signal) -> Result<()> {
        let running = self
            .current
            .as_ref()
            .ok_or(PodcastError::Unsupported("no utterance in flight"))?;
        running.process.with_pid(|pid| send_signal(pid, signal))
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: nix::sys::signal::Signal) -> Result<()> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), signal)
        .map_err(|e| PodcastError::Speech(format!("Failed to signal espeak-ng: {}", e)))
}

/// Parse the table printed by `espeak-ng --voices`
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  af              --/M      Afrikaans          gmw/af
///  2  en-us           --/M      English_(America)  gmw/en-US            (en 3)
/// ```
pub fn parse_voice_list(listing: &str) -> Vec<VoiceHandle> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            if columns.len() < 5 {
                return None;
            }
            let language = columns[1];
            let gender = match columns[2].rsplit('/').next() {
                Some("M") => Some(VoiceGender::Male),
                Some("F") => Some(VoiceGender::Female),
                _ => None,
            };
            let name = columns[3].replace('_', " ");
            let file = columns[4];

            let mut voice = VoiceHandle::new(file, name, language);
            voice.gender = gender;
            voice.is_default = language == "en";
            Some(voice)
        })
        .collect()
}

impl SpeechChannel for EspeakChannel {
    fn name(&self) -> &'static str {
        "espeak-ng"
    }

    fn voices(&self) -> Result<Vec<VoiceHandle>> {
        Ok(lock(&self.voices).clone())
    }

    fn registry_updates(&self) -> Option<watch::Receiver<u64>> {
        Some(self.registry.clone())
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<Completion> {
        let (tx, rx) = oneshot::channel();
        if utterance.text.trim().is_empty() {
            let _ = tx.send(UtteranceOutcome::Finished);
            return Ok(rx);
        }

        // Single serial channel: never two espeak-ng processes at once
        self.cancel()?;

        let voice = utterance
            .voice
            .as_ref()
            .map(|v| v.id.clone())
            .unwrap_or_else(|| "en".to_string());

        let mut cmd = tokio::process::Command::new(&self.espeak_path);
        cmd.arg("-v").arg(&voice);
        cmd.arg("-s").arg(Self::rate_to_wpm(utterance.rate).to_string());
        cmd.arg("-p").arg(Self::pitch_to_espeak(utterance.pitch).to_string());
        cmd.arg("-a").arg(Self::volume_to_amplitude(utterance.volume).to_string());
        cmd.arg("--").arg(&utterance.text);
        if let Some(server) = self.pulse_server {
            cmd.env("PULSE_SERVER", server);
        }
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            error!("Failed to spawn espeak-ng: {}", e);
            PodcastError::Speech(format!("Failed to start espeak-ng: {}", e))
        })?;
        debug!("espeak-ng process started for: {}", utterance.text);

        let process = ProcessSlot::new(child.id());
        let reaped = process.clone();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let outcome = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => UtteranceOutcome::Finished,
                    Ok(status) => UtteranceOutcome::Failed(format!("espeak-ng exited with {}", status)),
                    Err(e) => UtteranceOutcome::Failed(e.to_string()),
                },
                _ = kill_rx => {
                    if let Err(e) = child.kill().await {
                        debug!("Failed to kill espeak-ng process: {}", e);
                    }
                    UtteranceOutcome::Interrupted
                }
            };
            reaped.clear();
            let _ = tx.send(outcome);
        });

        self.current = Some(Running { process, kill: kill_tx });
        self.paused = false;
        Ok(rx)
    }

    fn cancel(&mut self) -> Result<()> {
        if let Some(running) = self.current.take() {
            debug!("Killing espeak-ng process");
            #[cfg(unix)]
            if self.paused {
                // A stopped process still dies on SIGKILL, but continue it so
                // the waiter sees a clean exit path on every platform
                let _ = running
                    .process
                    .with_pid(|pid| send_signal(pid, nix::sys::signal::Signal::SIGCONT));
            }
            let _ = running.kill.send(());
        }
        self.paused = false;
        Ok(())
    }

    #[cfg(unix)]
    fn pause(&mut self) -> Result<()> {
        self.signal_current(nix::sys::signal::Signal::SIGSTOP)?;
        self.paused = true;
        Ok(())
    }

    #[cfg(unix)]
    fn resume(&mut self) -> Result<()> {
        if !self.paused {
            return Ok(());
        }
        self.signal_current(nix::sys::signal::Signal::SIGCONT)?;
        self.paused = false;
        Ok(())
    }
}

impl Drop for EspeakChannel {
    fn drop(&mut self) {
        debug!("Shutting down espeak-ng backend");
        let _ = self.cancel();
    }
}
