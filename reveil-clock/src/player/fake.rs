//! Scripted in-memory player for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{AudioError, Result};

use super::{NowPlaying, PlayState, PlayerControl, ServiceState};

#[derive(Debug)]
struct FakeState {
    service: ServiceState,
    control_ok: bool,
    /// Whether `start_service` actually brings the daemon back.
    restartable: bool,
    hang_on_start: bool,
    volume: u8,
    /// Reported volume differs from the requested one by this much.
    volume_drift: u8,
    playing: bool,
    queue: Vec<String>,
    /// Stream URLs enqueue fine but never reach the playing state.
    url_playback_fails: bool,
    /// Nothing reaches the playing state.
    playback_fails: bool,
    probe_count: usize,
    restart_count: usize,
    commands: Vec<String>,
}

/// A player whose failures are scripted from the test body.
pub struct FakePlayer {
    state: Mutex<FakeState>,
}

impl FakePlayer {
    pub fn healthy() -> Self {
        Self {
            state: Mutex::new(FakeState {
                service: ServiceState::Active,
                control_ok: true,
                restartable: true,
                hang_on_start: false,
                volume: 100,
                volume_drift: 0,
                playing: false,
                queue: Vec::new(),
                url_playback_fails: false,
                playback_fails: false,
                probe_count: 0,
                restart_count: 0,
                commands: Vec::new(),
            }),
        }
    }

    /// Take the service down. `restartable` controls whether a
    /// subsequent `start_service` revives it.
    pub fn kill_service(&self, restartable: bool) {
        let mut s = self.state.lock().unwrap();
        s.service = ServiceState::Failed;
        s.control_ok = false;
        s.restartable = restartable;
    }

    pub fn revive(&self) {
        let mut s = self.state.lock().unwrap();
        s.service = ServiceState::Active;
        s.control_ok = true;
    }

    pub fn set_service_state(&self, state: ServiceState) {
        self.state.lock().unwrap().service = state;
    }

    pub fn set_restartable(&self, restartable: bool) {
        self.state.lock().unwrap().restartable = restartable;
    }

    pub fn hang_on_start(&self, hang: bool) {
        self.state.lock().unwrap().hang_on_start = hang;
    }

    pub fn fail_url_playback(&self, fail: bool) {
        self.state.lock().unwrap().url_playback_fails = fail;
    }

    pub fn fail_all_playback(&self, fail: bool) {
        self.state.lock().unwrap().playback_fails = fail;
    }

    pub fn set_volume_drift(&self, drift: u8) {
        self.state.lock().unwrap().volume_drift = drift;
    }

    pub fn probe_count(&self) -> usize {
        self.state.lock().unwrap().probe_count
    }

    pub fn restart_count(&self) -> usize {
        self.state.lock().unwrap().restart_count
    }

    pub fn was_restarted(&self) -> bool {
        self.restart_count() > 0
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().unwrap().playing
    }

    pub fn volume(&self) -> u8 {
        self.state.lock().unwrap().volume
    }

    pub fn queue(&self) -> Vec<String> {
        self.state.lock().unwrap().queue.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    fn record(&self, command: impl Into<String>) {
        self.state.lock().unwrap().commands.push(command.into());
    }

    fn check_control(&self) -> Result<()> {
        if self.state.lock().unwrap().control_ok {
            Ok(())
        } else {
            Err(AudioError::Control("connection refused".into()))
        }
    }
}

#[async_trait]
impl PlayerControl for FakePlayer {
    async fn service_status(&self) -> Result<ServiceState> {
        let mut s = self.state.lock().unwrap();
        s.probe_count += 1;
        Ok(s.service)
    }

    async fn start_service(&self) -> Result<()> {
        let hang = {
            let mut s = self.state.lock().unwrap();
            s.restart_count += 1;
            s.hang_on_start
        };
        if hang {
            std::future::pending::<()>().await;
        }
        let mut s = self.state.lock().unwrap();
        if s.restartable {
            s.service = ServiceState::Active;
            s.control_ok = true;
        }
        Ok(())
    }

    async fn stop_service(&self) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.service = ServiceState::Inactive;
        s.control_ok = false;
        s.playing = false;
        Ok(())
    }

    async fn queue_clear(&self) -> Result<()> {
        self.check_control()?;
        self.record("clear");
        let mut s = self.state.lock().unwrap();
        s.queue.clear();
        s.playing = false;
        Ok(())
    }

    async fn queue_add(&self, item: &str) -> Result<()> {
        self.check_control()?;
        self.record(format!("add {item}"));
        self.state.lock().unwrap().queue.push(item.to_owned());
        Ok(())
    }

    async fn set_random(&self, on: bool) -> Result<()> {
        self.check_control()?;
        self.record(format!("random {on}"));
        Ok(())
    }

    async fn set_repeat(&self, on: bool) -> Result<()> {
        self.check_control()?;
        self.record(format!("repeat {on}"));
        Ok(())
    }

    async fn play(&self, position: Option<u32>) -> Result<()> {
        self.check_control()?;
        self.record(match position {
            Some(p) => format!("play {p}"),
            None => "play".into(),
        });
        let mut s = self.state.lock().unwrap();
        let queued_stream = s.queue.iter().any(|i| i.starts_with("http"));
        s.playing = !s.playback_fails && !(queued_stream && s.url_playback_fails);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.check_control()?;
        self.record("stop");
        self.state.lock().unwrap().playing = false;
        Ok(())
    }

    async fn set_volume(&self, percent: u8) -> Result<()> {
        self.check_control()?;
        self.record(format!("volume {percent}"));
        let mut s = self.state.lock().unwrap();
        s.volume = percent.saturating_sub(s.volume_drift);
        Ok(())
    }

    async fn get_volume(&self) -> Result<u8> {
        self.check_control()?;
        Ok(self.state.lock().unwrap().volume)
    }

    async fn now_playing(&self) -> Result<NowPlaying> {
        self.check_control()?;
        let s = self.state.lock().unwrap();
        Ok(NowPlaying {
            state: if s.playing {
                PlayState::Playing
            } else {
                PlayState::Stopped
            },
            artist: s.playing.then(|| "Fake Artist".to_owned()),
            title: s.playing.then(|| "Fake Title".to_owned()),
            elapsed: s.playing.then(|| "0:01".to_owned()),
            total: None,
        })
    }
}

/// Tests hand the backend a `Box<Arc<FakePlayer>>` and keep a clone to
/// script failures and inspect recorded commands.
#[async_trait]
impl PlayerControl for Arc<FakePlayer> {
    async fn service_status(&self) -> Result<ServiceState> {
        self.as_ref().service_status().await
    }
    async fn start_service(&self) -> Result<()> {
        self.as_ref().start_service().await
    }
    async fn stop_service(&self) -> Result<()> {
        self.as_ref().stop_service().await
    }
    async fn queue_clear(&self) -> Result<()> {
        self.as_ref().queue_clear().await
    }
    async fn queue_add(&self, item: &str) -> Result<()> {
        self.as_ref().queue_add(item).await
    }
    async fn set_random(&self, on: bool) -> Result<()> {
        self.as_ref().set_random(on).await
    }
    async fn set_repeat(&self, on: bool) -> Result<()> {
        self.as_ref().set_repeat(on).await
    }
    async fn play(&self, position: Option<u32>) -> Result<()> {
        self.as_ref().play(position).await
    }
    async fn stop(&self) -> Result<()> {
        self.as_ref().stop().await
    }
    async fn set_volume(&self, percent: u8) -> Result<()> {
        self.as_ref().set_volume(percent).await
    }
    async fn get_volume(&self) -> Result<u8> {
        self.as_ref().get_volume().await
    }
    async fn now_playing(&self) -> Result<NowPlaying> {
        self.as_ref().now_playing().await
    }
}
