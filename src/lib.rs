//! webpodcast - articles as two-voice conversations
//!
//! Converts article text into a two-speaker dialogue and plays it back
//! through the platform speech synthesizer, alternating voices per speaker.

pub mod captions;
pub mod dialogue;
pub mod error;
pub mod platform;
pub mod playback;
pub mod speech;
pub mod state;

pub use error::{PodcastError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
