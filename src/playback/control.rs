//! Session-tagged liveness
//!
//! A single `watch` channel carries the current session id and playback
//! state. Every session holds a [`SessionToken`]; it is live only while its
//! id is still the current one and the state is `Playing`. Starting a new
//! session bumps the id, which retires every older token at once.

use tokio::sync::watch;

/// Playback state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    /// Stop requested; the session loop has not exited yet
    Stopped,
}

/// What the watch channel carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub session: u64,
    pub state: PlaybackState,
}

impl Phase {
    pub const IDLE: Phase = Phase {
        session: 0,
        state: PlaybackState::Idle,
    };
}

/// Owner side of the liveness flag
pub struct PlaybackControl {
    tx: watch::Sender<Phase>,
}

impl PlaybackControl {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Phase::IDLE);
        Self { tx }
    }

    pub fn phase(&self) -> Phase {
        *self.tx.borrow()
    }

    pub fn state(&self) -> PlaybackState {
        self.phase().state
    }

    /// Make `session` the current one, superseding any other
    pub fn begin(&self, session: u64) -> SessionToken {
        self.tx.send_replace(Phase {
            session,
            state: PlaybackState::Playing,
        });
        SessionToken {
            session,
            rx: self.tx.subscribe(),
        }
    }

    /// Playing → Paused; false if nothing was playing
    pub fn pause(&self) -> bool {
        self.tx.send_if_modified(|phase| {
            if phase.state == PlaybackState::Playing {
                phase.state = PlaybackState::Paused;
                true
            } else {
                false
            }
        })
    }

    /// Paused → Playing; false if nothing was paused
    pub fn resume(&self) -> bool {
        self.tx.send_if_modified(|phase| {
            if phase.state == PlaybackState::Paused {
                phase.state = PlaybackState::Playing;
                true
            } else {
                false
            }
        })
    }

    /// Request the current session to stop; a no-op when idle
    pub fn stop(&self) -> bool {
        self.tx.send_if_modified(|phase| match phase.state {
            PlaybackState::Playing | PlaybackState::Paused => {
                phase.state = PlaybackState::Stopped;
                true
            }
            PlaybackState::Idle | PlaybackState::Stopped => false,
        })
    }

    /// Back to idle, but only if `session` is still the current one
    pub fn finish(&self, session: u64) -> bool {
        self.tx.send_if_modified(|phase| {
            if phase.session == session && phase.state != PlaybackState::Idle {
                phase.state = PlaybackState::Idle;
                true
            } else {
                false
            }
        })
    }
}

impl Default for PlaybackControl {
    fn default() -> Self {
        Self::new()
    }
}

/// One session's view of the liveness flag
pub struct SessionToken {
    session: u64,
    rx: watch::Receiver<Phase>,
}

impl SessionToken {
    pub fn session(&self) -> u64 {
        self.session
    }

    fn is_current(&self, phase: &Phase) -> bool {
        phase.session == self.session
    }

    /// Still the current session and playing
    pub fn is_live(&self) -> bool {
        let phase = *self.rx.borrow();
        self.is_current(&phase) && phase.state == PlaybackState::Playing
    }

    /// Stopped, finished, or superseded by a newer session
    pub fn is_cancelled(&self) -> bool {
        let phase = *self.rx.borrow();
        !self.is_current(&phase)
            || matches!(phase.state, PlaybackState::Stopped | PlaybackState::Idle)
    }

    /// Resolves once this session is cancelled (never on a mere pause)
    pub async fn cancelled(&mut self) {
        let session = self.session;
        let _ = self
            .rx
            .wait_for(|phase| {
                phase.session != session
                    || matches!(phase.state, PlaybackState::Stopped | PlaybackState::Idle)
            })
            .await;
    }

    /// Wait out a pause, then report whether the session is still live
    pub async fn wait_resumed(&mut self) -> bool {
        let session = self.session;
        let waited = self
            .rx
            .wait_for(|phase| phase.session != session || phase.state != PlaybackState::Paused)
            .await
            .is_ok();
        waited && self.is_live()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_control_is_idle() {
        let control = PlaybackControl::new();
        assert_eq!(control.state(), PlaybackState::Idle);
        assert!(!control.stop());
        assert!(!control.pause());
        assert!(!control.resume());
        assert_eq!(control.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_token_lifecycle() {
        let control = PlaybackControl::new();
        let token = control.begin(1);
        assert!(token.is_live());

        assert!(control.pause());
        assert!(!token.is_live());
        assert!(!token.is_cancelled());

        assert!(control.resume());
        assert!(token.is_live());

        assert!(control.stop());
        assert!(token.is_cancelled());
        assert!(control.finish(1));
        assert_eq!(control.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_new_session_supersedes_old() {
        let control = PlaybackControl::new();
        let old = control.begin(1);
        let new = control.begin(2);

        assert!(old.is_cancelled());
        assert!(new.is_live());

        // The old session's cleanup must not clobber the new one
        assert!(!control.finish(1));
        assert_eq!(control.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn test_wait_resumed_blocks_while_paused() {
        let control = std::sync::Arc::new(PlaybackControl::new());
        let mut token = control.begin(7);
        control.pause();

        let resumer = std::sync::Arc::clone(&control);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            resumer.resume();
        });

        assert!(token.wait_resumed().await);
    }

    #[tokio::test]
    async fn test_cancelled_on_stop() {
        let control = PlaybackControl::new();
        let mut token = control.begin(3);
        control.stop();
        token.cancelled().await;
        assert!(!token.wait_resumed().await);
    }
}
