//! Error taxonomy for the audio path.
//!
//! All of these are handled locally, inside the fallback chain or the
//! health manager. They never cross the driver loop boundary; callers
//! above the backend only ever see booleans.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AudioError>;

#[derive(Debug, Error)]
pub enum AudioError {
    /// Health probe failed, or the backend is sitting out its degraded
    /// cooldown. Playback operations abort before any side effect.
    #[error("audio backend unavailable")]
    BackendUnavailable,

    /// The command sequence executed but the player was confirmed not
    /// playing afterwards.
    #[error("playback did not start: {0}")]
    PlaybackFailed(String),

    /// Restart cap reached; backend entered degraded mode.
    #[error("recovery exhausted after {attempts} restart attempts")]
    RecoveryExhausted { attempts: u8 },

    /// The restart procedure overran its global deadline.
    #[error("recovery timed out after {0:?}")]
    RecoveryTimeout(std::time::Duration),

    /// A control-channel call failed outright (spawn error, timeout,
    /// unparseable output).
    #[error("player control: {0}")]
    Control(String),
}
