//! Audio backend: playback operations over the player control channel,
//! gated by the health manager.
//!
//! Every playback operation checks availability first and aborts with no
//! side effects when the backend is down. Success is confirmed by
//! observing the resulting playback state, never by trusting a command's
//! return status alone.

pub mod health;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{HealthConfig, Station};
use crate::error::{AudioError, Result};
use crate::observer::SharedObserver;
use crate::player::{NowPlaying, PlayerControl};
use crate::tracing::prelude::*;

use health::BackendHealth;

/// Delay between issuing `play` and reading back the transport state.
const CONFIRM_SETTLE: Duration = Duration::from_millis(500);

/// Webradio streams need a network buffer before they report playing.
const STREAM_SETTLE: Duration = Duration::from_secs(2);

/// Reported volume may differ from the requested one by this much before
/// a drift warning is logged.
const VOLUME_DRIFT_TOLERANCE: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackSource {
    Local,
    Webradio,
}

pub struct AudioBackend {
    player: Box<dyn PlayerControl>,
    health: BackendHealth,
    observer: SharedObserver,
    music_dir: PathBuf,
    stations: Vec<Station>,
    playing: bool,
    source: Option<PlaybackSource>,
    current_station: Option<String>,
}

impl AudioBackend {
    pub fn new(
        player: Box<dyn PlayerControl>,
        health_config: HealthConfig,
        music_dir: impl Into<PathBuf>,
        stations: Vec<Station>,
        observer: SharedObserver,
    ) -> Self {
        Self {
            player,
            health: BackendHealth::new(health_config),
            observer,
            music_dir: music_dir.into(),
            stations,
            playing: false,
            source: None,
            current_station: None,
        }
    }

    /// Throttled availability gate. See [`BackendHealth::ensure_available`].
    pub async fn ensure_available(&mut self) -> bool {
        self.health
            .ensure_available(&*self.player, &self.observer)
            .await
    }

    /// Read-only health queries for the UI side.
    pub fn health(&self) -> &BackendHealth {
        &self.health
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn source(&self) -> Option<PlaybackSource> {
        self.source
    }

    pub fn current_station(&self) -> Option<&str> {
        self.current_station.as_deref()
    }

    /// Shuffled playback of the whole library.
    pub async fn play_shuffled_library(&mut self) -> Result<()> {
        let music_dir = self.music_dir.clone();
        self.play_folder(&music_dir, true).await
    }

    /// Play a folder (recursively, as the player sees it), shuffled or
    /// in order.
    pub async fn play_folder(&mut self, folder: &Path, shuffle: bool) -> Result<()> {
        self.gate("play_folder").await?;
        self.prepare(shuffle).await?;

        let rel = self.relative_to_library(folder);
        self.player.queue_add(&rel).await?;
        self.player.play(None).await?;

        self.confirm_playing(CONFIRM_SETTLE).await?;
        self.source = Some(PlaybackSource::Local);
        self.current_station = None;
        info!(folder = %folder.display(), shuffle, "Folder playback started");
        Ok(())
    }

    /// Play one file, then its successors in natural filename order.
    pub async fn play_file(&mut self, file: &Path, folder: &Path) -> Result<()> {
        self.gate("play_file").await?;

        let mut entries: Vec<PathBuf> = std::fs::read_dir(folder)
            .map_err(|e| AudioError::Control(format!("{}: {e}", folder.display())))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        entries.sort();

        let position = entries
            .iter()
            .position(|p| p == file)
            .ok_or_else(|| AudioError::Control(format!("{} not in folder", file.display())))?;

        self.prepare(false).await?;
        // Sequential playback ends with the folder instead of looping.
        self.player.set_repeat(false).await?;

        for entry in &entries {
            self.player.queue_add(&self.relative_to_library(entry)).await?;
        }
        self.player.play(Some(position as u32 + 1)).await?;

        self.confirm_playing(CONFIRM_SETTLE).await?;
        self.source = Some(PlaybackSource::Local);
        self.current_station = None;
        info!(
            file = %file.display(),
            queued = entries.len(),
            "Sequential playback started"
        );
        Ok(())
    }

    /// Tune to a configured webradio station. Returns the station name
    /// for the observer/UI on success.
    pub async fn play_webradio_station(&mut self, index: usize) -> Result<String> {
        let station = self
            .stations
            .get(index)
            .ok_or_else(|| AudioError::Control(format!("no station at index {index}")))?
            .clone();

        self.gate("play_webradio").await?;
        self.prepare(false).await?;

        self.player.queue_add(&station.url).await?;
        self.player.play(None).await?;

        self.confirm_playing(STREAM_SETTLE).await?;
        self.source = Some(PlaybackSource::Webradio);
        self.current_station = Some(station.name.clone());
        info!(station = %station.name, "Webradio playback started");
        Ok(station.name)
    }

    /// Set the player volume, verifying the applied level round-trips
    /// within tolerance. Drift is a warning, never a failure.
    pub async fn set_volume(&self, percent: u8) {
        let percent = percent.min(100);
        if let Err(e) = self.player.set_volume(percent).await {
            warn!(error = %e, percent, "Volume change failed");
            return;
        }

        match self.player.get_volume().await {
            Ok(actual) if actual.abs_diff(percent) > VOLUME_DRIFT_TOLERANCE => {
                warn!(requested = percent, actual, "Volume drift detected");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Volume readback failed"),
        }
    }

    /// Current player volume; defaults to full on readback failure so a
    /// broken backend never mutes an alarm.
    pub async fn get_volume(&self) -> u8 {
        match self.player.get_volume().await {
            Ok(volume) => volume,
            Err(e) => {
                warn!(error = %e, "Volume query failed, assuming 100");
                100
            }
        }
    }

    /// Now-playing metadata for the UI. Webradio reports the station
    /// name as artist. Infallible: a broken control channel yields the
    /// stopped default.
    pub async fn track_info(&self) -> NowPlaying {
        let mut info = match self.player.now_playing().await {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "Track info query failed");
                return NowPlaying::default();
            }
        };
        if self.source == Some(PlaybackSource::Webradio) {
            info.artist = self.current_station.clone().or(info.artist);
        }
        info
    }

    /// Stop playback. The service itself is left alone.
    pub async fn stop(&mut self) {
        self.playing = false;
        self.source = None;
        self.current_station = None;
        if let Err(e) = self.player.stop().await {
            warn!(error = %e, "Playback stop failed");
        }
    }

    /// Availability gate shared by all playback operations: abort before
    /// any side effect when the backend is down.
    async fn gate(&mut self, operation: &str) -> Result<()> {
        if self.ensure_available().await {
            Ok(())
        } else {
            warn!(operation, "Backend unavailable, aborting playback attempt");
            Err(AudioError::BackendUnavailable)
        }
    }

    /// Operation preparation: silence and empty the queue, then apply
    /// the shuffle/repeat flags for the coming playback.
    async fn prepare(&self, shuffle: bool) -> Result<()> {
        self.player.queue_clear().await?;
        self.player.set_random(shuffle).await?;
        self.player.set_repeat(true).await?;
        Ok(())
    }

    /// Confirm the command sequence actually resulted in playback.
    async fn confirm_playing(&mut self, settle: Duration) -> Result<()> {
        tokio::time::sleep(settle).await;
        let info = self.player.now_playing().await?;
        if info.is_playing() {
            self.playing = true;
            Ok(())
        } else {
            self.playing = false;
            Err(AudioError::PlaybackFailed(
                "player not in playing state after play".into(),
            ))
        }
    }

    /// Queue paths are relative to the library root; the root itself is
    /// the player's `/`.
    fn relative_to_library(&self, path: &Path) -> String {
        match path.strip_prefix(&self.music_dir) {
            Ok(rel) if rel.as_os_str().is_empty() => "/".to_owned(),
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::observer::NullObserver;
    use crate::player::fake::FakePlayer;

    use super::*;

    fn stations() -> Vec<Station> {
        vec![Station {
            name: "FIP".into(),
            url: "http://example.net/fip.aac".into(),
        }]
    }

    fn backend_with(player: FakePlayer, music_dir: &Path) -> (AudioBackend, Arc<FakePlayer>) {
        let player = Arc::new(player);
        let backend = AudioBackend::new(
            Box::new(player.clone()),
            HealthConfig::default(),
            music_dir,
            stations(),
            Arc::new(NullObserver),
        );
        (backend, player)
    }

    #[tokio::test(start_paused = true)]
    async fn shuffled_library_plays_the_root() {
        let (mut backend, player) =
            backend_with(FakePlayer::healthy(), Path::new("/music"));

        backend.play_shuffled_library().await.unwrap();

        assert!(backend.is_playing());
        assert_eq!(backend.source(), Some(PlaybackSource::Local));
        assert_eq!(player.queue(), vec!["/".to_owned()]);
        let commands = player.commands();
        assert!(commands.contains(&"random true".to_owned()));
        assert!(commands.contains(&"repeat true".to_owned()));
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_backend_aborts_with_no_side_effects() {
        let (mut backend, player) =
            backend_with(FakePlayer::healthy(), Path::new("/music"));
        player.kill_service(false);

        let err = backend.play_shuffled_library().await.unwrap_err();
        assert!(matches!(err, AudioError::BackendUnavailable));
        assert!(player.commands().is_empty(), "no queue/play side effects");
        assert!(!backend.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn webradio_success_reports_station_name() {
        let (mut backend, player) =
            backend_with(FakePlayer::healthy(), Path::new("/music"));

        let name = backend.play_webradio_station(0).await.unwrap();
        assert_eq!(name, "FIP");
        assert_eq!(backend.source(), Some(PlaybackSource::Webradio));
        assert_eq!(backend.current_station(), Some("FIP"));
        assert_eq!(player.queue(), vec!["http://example.net/fip.aac".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn webradio_failure_is_confirmed_not_playing() {
        let (mut backend, player) =
            backend_with(FakePlayer::healthy(), Path::new("/music"));
        player.fail_url_playback(true);

        let err = backend.play_webradio_station(0).await.unwrap_err();
        assert!(matches!(err, AudioError::PlaybackFailed(_)));
        assert!(!backend.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_station_index_fails_before_any_command() {
        let (mut backend, player) =
            backend_with(FakePlayer::healthy(), Path::new("/music"));

        assert!(backend.play_webradio_station(7).await.is_err());
        assert!(player.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_playback_queues_folder_in_order() {
        let dir = std::env::temp_dir().join(format!("reveil-seq-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["03-c.mp3", "01-a.mp3", "02-b.mp3"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }

        let (mut backend, player) = backend_with(FakePlayer::healthy(), &dir);
        backend
            .play_file(&dir.join("02-b.mp3"), &dir)
            .await
            .unwrap();

        assert_eq!(
            player.queue(),
            vec!["01-a.mp3", "02-b.mp3", "03-c.mp3"]
        );
        let commands = player.commands();
        assert!(commands.contains(&"play 2".to_owned()), "{commands:?}");
        assert!(commands.contains(&"repeat false".to_owned()));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn volume_drift_warns_but_does_not_fail() {
        let (backend, player) = backend_with(FakePlayer::healthy(), Path::new("/music"));
        player.set_volume_drift(10);

        backend.set_volume(80).await;
        assert_eq!(player.volume(), 70);
        assert_eq!(backend.get_volume().await, 70);
    }

    #[tokio::test(start_paused = true)]
    async fn track_info_substitutes_station_name_for_webradio() {
        let (mut backend, _player) =
            backend_with(FakePlayer::healthy(), Path::new("/music"));

        backend.play_webradio_station(0).await.unwrap();
        let info = backend.track_info().await;
        assert_eq!(info.artist.as_deref(), Some("FIP"));
        assert!(info.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_playback_but_not_the_service() {
        let (mut backend, player) =
            backend_with(FakePlayer::healthy(), Path::new("/music"));

        backend.play_shuffled_library().await.unwrap();
        backend.stop().await;

        assert!(!backend.is_playing());
        assert!(!player.is_playing());
        assert_eq!(
            player.service_status().await.unwrap(),
            crate::player::ServiceState::Active
        );
    }
}
