//! Driver loop.
//!
//! One task owns the scheduler and the audio backend; everything they do
//! happens strictly sequentially on this task. The loop ticks fast for
//! responsiveness but reads the clock and evaluates alarms at 1 Hz.
//!
//! While a backend recovery runs (worst case 90 s, see
//! [`crate::audio::health`]), the evaluation pass it started from simply
//! holds the loop; commands queue up on the channel and are served when
//! the pass returns. That window is accepted: nothing preempts a restart.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::alarm::AlarmScheduler;
use crate::alarm::slot::{AlarmMode, RepeatRule, SlotId};
use crate::audio::AudioBackend;
use crate::clock::Clock;
use crate::tracing::prelude::*;

const EVALUATE_PERIOD: Duration = Duration::from_secs(1);

/// Requests from the control surface (buttons, menu) into the loop.
#[derive(Debug)]
pub enum Command {
    /// Silence the ringing alarm, if any.
    Stop,
    SetAlarm {
        id: SlotId,
        hour: u8,
        minute: u8,
        enabled: bool,
        repeat: RepeatRule,
    },
    SetMode {
        id: SlotId,
        mode: AlarmMode,
    },
}

pub struct Coordinator {
    clock: Box<dyn Clock>,
    scheduler: AlarmScheduler,
    backend: AudioBackend,
    commands: mpsc::Receiver<Command>,
    tick: Duration,
}

impl Coordinator {
    pub fn new(
        clock: Box<dyn Clock>,
        scheduler: AlarmScheduler,
        backend: AudioBackend,
        tick: Duration,
    ) -> (Self, mpsc::Sender<Command>) {
        let (command_tx, commands) = mpsc::channel(8);
        (
            Self {
                clock,
                scheduler,
                backend,
                commands,
                tick,
            },
            command_tx,
        )
    }

    pub async fn run(mut self, cancellation: CancellationToken) {
        info!("Driver loop started");
        let mut ticker = time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_pass: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = ticker.tick() => {
                    if last_pass.is_none_or(|at| at.elapsed() >= EVALUATE_PERIOD) {
                        last_pass = Some(Instant::now());
                        self.pass().await;
                    }
                }
            }
        }

        // Nothing may keep ringing after shutdown.
        self.scheduler.stop(&mut self.backend).await;
        info!("Driver loop stopped");
    }

    /// One 1 Hz pass: read the clock, evaluate, surface track info once
    /// per audio alarm.
    async fn pass(&mut self) {
        let now = self.clock.now();
        let day = self.clock.day_of_week();
        self.scheduler.evaluate(&mut self.backend, now, day).await;

        if self.scheduler.take_player_info_due() {
            let info = self.backend.track_info().await;
            info!(
                artist = info.artist.as_deref().unwrap_or("-"),
                title = info.title.as_deref().unwrap_or("-"),
                "Now playing"
            );
        }
    }

    async fn handle(&mut self, command: Command) {
        debug!(?command, "Command received");
        match command {
            Command::Stop => self.scheduler.stop(&mut self.backend).await,
            Command::SetAlarm {
                id,
                hour,
                minute,
                enabled,
                repeat,
            } => {
                if let Err(e) = self.scheduler.set_alarm(id, hour, minute, enabled, repeat) {
                    warn!(error = %e, slot = %id, "Alarm update rejected");
                }
            }
            Command::SetMode { id, mode } => self.scheduler.set_mode(id, mode),
        }
    }
}
