//! Playback service control channel.
//!
//! The audio backend talks to the external media-player daemon only
//! through [`PlayerControl`]. The production implementation shells out to
//! `mpc` and `systemctl` ([`mpc::MpcControl`]); tests substitute scripted
//! fakes. Every call is bounded by its own timeout so nothing here can
//! stall the driver loop for more than a few seconds.

#[cfg(test)]
pub mod fake;
pub mod mpc;

use async_trait::async_trait;

use crate::error::Result;

/// Service-manager view of the playback daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Active,
    /// Start-up in progress. The health probe tolerates this for a grace
    /// window before treating the service as down.
    Activating,
    Inactive,
    Failed,
    Unknown,
}

/// Player transport state, as confirmed by the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    Playing,
    Paused,
    #[default]
    Stopped,
}

/// Now-playing metadata for the observer/UI side.
#[derive(Debug, Clone, Default)]
pub struct NowPlaying {
    pub state: PlayState,
    pub artist: Option<String>,
    pub title: Option<String>,
    /// Elapsed time as reported, e.g. "1:23". Webradio streams have no
    /// total, so there is no progress to compute there.
    pub elapsed: Option<String>,
    pub total: Option<String>,
}

impl NowPlaying {
    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }
}

/// Abstract control channel to the playback daemon.
///
/// Each call is bounded (typically 1-5 s). Failures surface as
/// `AudioError::Control`; the health manager and fallback chain decide
/// what to do with them.
#[async_trait]
pub trait PlayerControl: Send + Sync {
    /// Service-manager state of the daemon process.
    async fn service_status(&self) -> Result<ServiceState>;

    async fn start_service(&self) -> Result<()>;

    async fn stop_service(&self) -> Result<()>;

    /// Stop playback and empty the queue.
    async fn queue_clear(&self) -> Result<()>;

    /// Enqueue a path (relative to the music root) or a stream URL.
    async fn queue_add(&self, item: &str) -> Result<()>;

    async fn set_random(&self, on: bool) -> Result<()>;

    async fn set_repeat(&self, on: bool) -> Result<()>;

    /// Start playback, optionally at a 1-based queue position.
    async fn play(&self, position: Option<u32>) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Set volume in percent (0-100).
    async fn set_volume(&self, percent: u8) -> Result<()>;

    /// Current volume in percent.
    async fn get_volume(&self) -> Result<u8>;

    /// Current transport state and track metadata. Doubles as the
    /// control-channel liveness probe.
    async fn now_playing(&self) -> Result<NowPlaying>;
}
