//! Playback Session Interface
//!
//! Browser UI automation is an external collaborator: the trial runner only
//! needs to open a player on an episode URL, set the playback speed, and
//! close the session. Everything behind those three operations (launch
//! flags, play buttons, modals, login state) lives on the other side of
//! these traits.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;

use crate::{CancelFlag, Condition};

/// Why a playback session could not be established or controlled.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No usable browser binary was found for the requested browser.
    #[error("browser binary not found: {0}")]
    BinaryNotFound(String),

    /// The browser process could not be spawned.
    #[error("failed to launch browser: {0}")]
    LaunchFailed(#[from] std::io::Error),

    /// The browser exited or playback was never confirmed.
    #[error("playback not confirmed: {0}")]
    NotConfirmed(String),

    /// The requested playback speed could not be applied.
    #[error("could not set playback speed: {0}")]
    SpeedRejected(String),

    /// The wait for playback confirmation was cancelled externally.
    #[error("session setup interrupted")]
    Interrupted,
}

/// Everything a launcher needs to open one player session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// The measurement condition being driven.
    pub condition: Condition,
    /// Episode URL for the condition's platform.
    pub url: String,
    /// How long to wait after navigation before the page is considered
    /// loaded.
    pub page_load_wait: Duration,
}

/// A live playback session. Obtained from a [`SessionLauncher`]; owned
/// exclusively by the single active trial.
pub trait PlaybackSession: std::fmt::Debug {
    /// Apply the playback-rate multiplier.
    fn set_speed(&mut self, multiplier: f64) -> Result<(), PlaybackError>;

    /// Tear the session down. Idempotent and infallible: a second call, or a
    /// call after the underlying process already died, is a no-op.
    fn close(&mut self);
}

/// Opens playback sessions for trial runs.
pub trait SessionLauncher {
    /// Open the player for `request` and confirm playback can start.
    ///
    /// The page-load wait must honor `cancel` so an external interrupt does
    /// not leave a browser process unsupervised.
    fn open(
        &self,
        request: &SessionRequest,
        cancel: &CancelFlag,
    ) -> Result<Box<dyn PlaybackSession>, PlaybackError>;
}

/// Scripted in-memory launcher. Stands in for the browser when validating
/// orchestration wiring and in tests: each `open` consumes the next scripted
/// outcome, falling back to success once the script is exhausted.
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    script: Mutex<VecDeque<Option<PlaybackError>>>,
    always_fail: bool,
}

impl ScriptedLauncher {
    /// A launcher whose every `open` succeeds.
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// A launcher whose every `open` fails with `NotConfirmed`.
    pub fn always_failing() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    /// A launcher that fails the first `n` opens with `NotConfirmed`, then
    /// succeeds.
    pub fn failing_first(n: usize) -> Self {
        let script = (0..n)
            .map(|_| Some(PlaybackError::NotConfirmed("scripted failure".to_string())))
            .collect();
        Self {
            script: Mutex::new(script),
            always_fail: false,
        }
    }

    /// Push one more scripted outcome (`None` = success).
    pub fn push(&self, outcome: Option<PlaybackError>) {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(outcome);
    }
}

impl SessionLauncher for ScriptedLauncher {
    fn open(
        &self,
        _request: &SessionRequest,
        cancel: &CancelFlag,
    ) -> Result<Box<dyn PlaybackSession>, PlaybackError> {
        if cancel.is_cancelled() {
            return Err(PlaybackError::Interrupted);
        }
        if self.always_fail {
            return Err(PlaybackError::NotConfirmed("scripted failure".to_string()));
        }
        let mut script = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match script.pop_front() {
            Some(Some(error)) => Err(error),
            _ => Ok(Box::new(ScriptedSession { closed: false })),
        }
    }
}

#[derive(Debug)]
struct ScriptedSession {
    closed: bool,
}

impl PlaybackSession for ScriptedSession {
    fn set_speed(&mut self, _multiplier: f64) -> Result<(), PlaybackError> {
        if self.closed {
            return Err(PlaybackError::SpeedRejected("session closed".to_string()));
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
