//! `mpc`/`systemctl` implementation of the player control channel.
//!
//! The playback daemon is MPD managed by systemd. Every subprocess runs
//! under its own `tokio::time::timeout`, so a wedged `mpc` cannot hold
//! the driver loop hostage.

use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{AudioError, Result};
use crate::tracing::prelude::*;

use super::{NowPlaying, PlayState, PlayerControl, ServiceState};

const MPD_UNITS: [&str; 2] = ["mpd.service", "mpd.socket"];

const STATUS_TIMEOUT: Duration = Duration::from_secs(1);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);
const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(3);
const SERVICE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MpcControl;

impl MpcControl {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, program: &str, args: &[&str], deadline: Duration) -> Result<Output> {
        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(deadline, child)
            .await
            .map_err(|_| AudioError::Control(format!("{program} {args:?} timed out")))?
            .map_err(|e| AudioError::Control(format!("{program}: {e}")))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("Connection refused") {
            return Err(AudioError::Control("mpd connection refused".into()));
        }
        Ok(output)
    }

    /// Run an `mpc` subcommand that must succeed.
    async fn mpc(&self, args: &[&str], deadline: Duration) -> Result<Output> {
        let output = self.run("mpc", args, deadline).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AudioError::Control(format!(
                "mpc {args:?} failed (rc={:?}): {}",
                output.status.code(),
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

impl Default for MpcControl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlayerControl for MpcControl {
    async fn service_status(&self) -> Result<ServiceState> {
        let output = self
            .run("systemctl", &["is-active", "mpd.service"], STATUS_TIMEOUT)
            .await?;
        let state = String::from_utf8_lossy(&output.stdout);
        Ok(match state.trim() {
            "active" => ServiceState::Active,
            "activating" => ServiceState::Activating,
            "inactive" => ServiceState::Inactive,
            "failed" => ServiceState::Failed,
            other => {
                debug!(state = other, "Unrecognized systemd unit state");
                ServiceState::Unknown
            }
        })
    }

    async fn start_service(&self) -> Result<()> {
        // Socket first, then the service explicitly: socket activation
        // alone leaves the unit inactive until the first connection.
        self.run("sudo", &["systemctl", "start", "mpd.socket"], SERVICE_TIMEOUT)
            .await?;
        self.run(
            "sudo",
            &["systemctl", "start", "mpd.service"],
            SERVICE_TIMEOUT,
        )
        .await?;
        Ok(())
    }

    async fn stop_service(&self) -> Result<()> {
        let mut args = vec!["systemctl", "stop"];
        args.extend(MPD_UNITS);
        let output = self.run("sudo", &args, SERVICE_TIMEOUT).await?;
        if !output.status.success() {
            warn!(rc = ?output.status.code(), "Incomplete mpd stop");
        }
        Ok(())
    }

    async fn queue_clear(&self) -> Result<()> {
        self.mpc(&["-q", "stop"], COMMAND_TIMEOUT).await?;
        self.mpc(&["-q", "clear"], COMMAND_TIMEOUT).await?;
        Ok(())
    }

    async fn queue_add(&self, item: &str) -> Result<()> {
        self.mpc(&["add", item], ENQUEUE_TIMEOUT).await?;
        Ok(())
    }

    async fn set_random(&self, on: bool) -> Result<()> {
        self.mpc(&["-q", "random", if on { "on" } else { "off" }], COMMAND_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn set_repeat(&self, on: bool) -> Result<()> {
        self.mpc(&["-q", "repeat", if on { "on" } else { "off" }], COMMAND_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn play(&self, position: Option<u32>) -> Result<()> {
        match position {
            Some(pos) => {
                self.mpc(&["play", &pos.to_string()], COMMAND_TIMEOUT)
                    .await?
            }
            None => self.mpc(&["play"], COMMAND_TIMEOUT).await?,
        };
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.mpc(&["stop"], COMMAND_TIMEOUT).await?;
        Ok(())
    }

    async fn set_volume(&self, percent: u8) -> Result<()> {
        self.mpc(&["volume", &percent.to_string()], COMMAND_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn get_volume(&self) -> Result<u8> {
        let output = self.mpc(&["volume"], STATUS_TIMEOUT).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_volume(&stdout)
            .ok_or_else(|| AudioError::Control(format!("unexpected volume output: {stdout:?}")))
    }

    async fn now_playing(&self) -> Result<NowPlaying> {
        let status = self.run("mpc", &["status"], COMMAND_TIMEOUT).await?;
        // rc 1 just means "nothing playing" here.
        if !matches!(status.status.code(), Some(0) | Some(1)) {
            return Err(AudioError::Control(format!(
                "mpc status failed (rc={:?})",
                status.status.code()
            )));
        }
        let status = String::from_utf8_lossy(&status.stdout);
        let mut info = parse_status(&status);

        if info.state != PlayState::Stopped {
            let current = self
                .run(
                    "mpc",
                    &["current", "--format", "%artist%\t%title%"],
                    STATUS_TIMEOUT,
                )
                .await?;
            let line = String::from_utf8_lossy(&current.stdout);
            let mut parts = line.trim_end().splitn(2, '\t');
            info.artist = parts.next().filter(|s| !s.is_empty()).map(str::to_owned);
            info.title = parts.next().filter(|s| !s.is_empty()).map(str::to_owned);
        }
        Ok(info)
    }
}

/// Parse `mpc volume` output, e.g. `volume: 50%`.
fn parse_volume(output: &str) -> Option<u8> {
    let rest = output.split("volume:").nth(1)?;
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok().filter(|v| *v <= 100)
}

/// Parse the transport line of `mpc status`, e.g.
/// `[playing] #3/12   1:23/3:10 (43%)`.
fn parse_status(output: &str) -> NowPlaying {
    let mut info = NowPlaying::default();
    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("[playing]") {
            info.state = PlayState::Playing;
            parse_times(rest, &mut info);
        } else if let Some(rest) = line.strip_prefix("[paused]") {
            info.state = PlayState::Paused;
            parse_times(rest, &mut info);
        }
    }
    info
}

fn parse_times(rest: &str, info: &mut NowPlaying) {
    // The time field looks like `1:23/3:10`; webradio streams report only
    // an elapsed time.
    for token in rest.split_whitespace() {
        if token.contains(':') {
            let mut parts = token.split('/');
            info.elapsed = parts.next().map(str::to_owned);
            info.total = parts.next().map(str::to_owned);
            return;
        }
    }
}
