//! Platform detection for speech backend selection

use std::fs;
use std::path::Path;

/// PulseAudio socket WSLG exposes to Linux programs
pub const WSLG_PULSE_SERVER: &str = "/mnt/wslg/PulseServer";

/// Where we are running, as far as speech output cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Linux under Windows Subsystem for Linux; Speech Dispatcher is rarely set up
    Wsl,
    Linux,
    MacOs,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        let proc_version = fs::read_to_string("/proc/version").ok();
        let wsl_env = std::env::var_os("WSL_DISTRO_NAME").is_some();
        Self::classify(std::env::consts::OS, proc_version.as_deref(), wsl_env)
    }

    fn classify(os: &str, proc_version: Option<&str>, wsl_env: bool) -> Self {
        match os {
            "linux" => {
                let wsl_kernel = proc_version.map_or(false, |version| {
                    let lower = version.to_lowercase();
                    lower.contains("microsoft") || lower.contains("wsl")
                });
                if wsl_kernel || wsl_env {
                    Self::Wsl
                } else {
                    Self::Linux
                }
            }
            "macos" => Self::MacOs,
            "windows" => Self::Windows,
            _ => Self::Other,
        }
    }
}

/// Running under WSL
pub fn is_wsl() -> bool {
    Platform::current() == Platform::Wsl
}

/// The WSLG PulseAudio socket, when it exists
pub fn wslg_pulse_server() -> Option<&'static Path> {
    let path = Path::new(WSLG_PULSE_SERVER);
    path.exists().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let wsl = "Linux version 5.15.90.1-microsoft-standard-WSL2";
        assert_eq!(Platform::classify("linux", Some(wsl), false), Platform::Wsl);
        assert_eq!(Platform::classify("linux", Some("Linux version 6.1.0"), true), Platform::Wsl);
        assert_eq!(Platform::classify("linux", Some("Linux version 6.1.0"), false), Platform::Linux);
        assert_eq!(Platform::classify("linux", None, false), Platform::Linux);
        assert_eq!(Platform::classify("macos", None, false), Platform::MacOs);
        assert_eq!(Platform::classify("windows", None, false), Platform::Windows);
        assert_eq!(Platform::classify("freebsd", None, false), Platform::Other);
    }

    #[test]
    fn test_current_does_not_panic() {
        let _ = Platform::current();
    }
}
