//! Alarm scheduler: trigger engine, arbitration and playback fallback.
//!
//! [`AlarmScheduler::evaluate`] runs once per second from the driver loop
//! and is idempotent within a wall-clock minute. When a slot fires, the
//! requested playback mode is tried through a one-way fallback chain; every
//! tier runs at most once per trigger and the chain always terminates in a
//! tier that cannot fail:
//!
//! ```text
//!                 backend down ───────────────────────────┐
//!                      │                                  │
//!   Webradio ──fail──► LocalLibrary ──fail──► Buzzer ◄────┘
//!      │ ok                │ ok                 always on
//!      ▼                   ▼
//!   volume ramp 60% ─► 80% (30 s) ─► 100% (60 s)
//! ```
//!
//! A buzzer alarm silences itself after 60 seconds; an audio alarm is
//! capped at two hours. The one-shot-per-minute guarantee lives in
//! [`slot::TriggerGuard`], which survives `stop()` so a stopped alarm
//! cannot re-fire until the minute rolls over.

pub mod ramp;
pub mod slot;

use thiserror::Error;
use tokio::time::Instant;

use crate::audio::AudioBackend;
use crate::buzzer::Buzzer;
use crate::clock::{MinuteStamp, Weekday};
use crate::config::AlarmConfig;
use crate::observer::SharedObserver;
use crate::settings::SettingsStore;
use crate::tracing::prelude::*;

use ramp::VolumeRamp;
use slot::{AlarmMode, AlarmSlot, RepeatRule, SlotId, TriggerGuard};

#[derive(Debug, Error)]
pub enum AlarmSettingError {
    #[error("alarm time {hour:02}:{minute:02} out of range")]
    InvalidTime { hour: u8, minute: u8 },
}

/// The one alarm currently ringing.
#[derive(Debug)]
struct ActiveAlarm {
    slot: SlotId,
    /// Tier actually playing, which may sit below the slot's configured
    /// mode after fallback.
    current_mode: AlarmMode,
    started_at: Instant,
    screen_hold_until: Instant,
    /// Present only for audio tiers; the buzzer has no volume.
    ramp: Option<VolumeRamp>,
    player_info_shown: bool,
}

pub struct AlarmScheduler {
    slots: [AlarmSlot; 2],
    guards: [TriggerGuard; 2],
    active: Option<ActiveAlarm>,
    buzzer: Buzzer,
    settings: Box<dyn SettingsStore>,
    observer: SharedObserver,
    config: AlarmConfig,
}

impl AlarmScheduler {
    pub fn new(
        settings: Box<dyn SettingsStore>,
        buzzer: Buzzer,
        observer: SharedObserver,
        config: AlarmConfig,
    ) -> Self {
        let slots = settings.load();
        Self {
            slots,
            guards: [TriggerGuard::default(), TriggerGuard::default()],
            active: None,
            buzzer,
            settings,
            observer,
            config,
        }
    }

    pub fn slots(&self) -> &[AlarmSlot; 2] {
        &self.slots
    }

    pub fn is_ringing(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_slot(&self) -> Option<SlotId> {
        self.active.as_ref().map(|a| a.slot)
    }

    /// Tier currently sounding, after any fallback.
    pub fn active_mode(&self) -> Option<AlarmMode> {
        self.active.as_ref().map(|a| a.current_mode)
    }

    /// Whether the display should still be held awake by a trigger.
    pub fn screen_held(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| Instant::now() < a.screen_hold_until)
    }

    /// True exactly once per audio alarm, when track metadata is worth
    /// showing. The caller fetches and displays it.
    pub fn take_player_info_due(&mut self) -> bool {
        match &mut self.active {
            Some(a) if a.current_mode.is_audio() && !a.player_info_shown => {
                a.player_info_shown = true;
                true
            }
            _ => false,
        }
    }

    /// One scheduler pass. Safe to call any number of times per minute.
    pub async fn evaluate(&mut self, backend: &mut AudioBackend, now: MinuteStamp, day: Weekday) {
        if self.active.is_some() {
            self.service_active(backend).await;
            self.expire_guards(now);
            return;
        }

        // Stamp every qualifying slot so the loser of a simultaneous
        // trigger cannot fire later in the same minute.
        let mut winner: Option<SlotId> = None;
        for id in SlotId::ALL {
            let idx = id.index();
            if self.slots[idx].matches(now, day) && !self.guards[idx].is_blocked(now) {
                self.guards[idx].stamp(now);
                if winner.is_none() {
                    winner = Some(id);
                } else {
                    info!(slot = %id, time = %now, "Simultaneous trigger, slot suppressed");
                }
            }
        }

        if let Some(id) = winner {
            self.trigger(backend, id, now).await;
        }

        self.expire_guards(now);
    }

    /// Stop the ringing alarm. Idempotent; trigger guards are left in
    /// place so the slot stays quiet until the next minute.
    pub async fn stop(&mut self, backend: &mut AudioBackend) {
        let Some(active) = self.active.take() else {
            debug!("Stop requested with no active alarm");
            return;
        };

        info!(slot = %active.slot, mode = %active.current_mode, "Alarm stopped");
        match active.current_mode {
            AlarmMode::Buzzer => self.buzzer.deactivate(),
            _ => backend.stop().await,
        }
        // The next listening session starts at full volume.
        backend.set_volume(self.config.ramp_volumes.full).await;
        self.observer.on_alarm_state_changed();
    }

    /// Reprogram a slot's time, enablement and repeat rule. Persists and
    /// clears the slot's guard so the new time can fire immediately.
    pub fn set_alarm(
        &mut self,
        id: SlotId,
        hour: u8,
        minute: u8,
        enabled: bool,
        repeat: RepeatRule,
    ) -> std::result::Result<(), AlarmSettingError> {
        if hour > 23 || minute > 59 {
            return Err(AlarmSettingError::InvalidTime { hour, minute });
        }

        let slot = &mut self.slots[id.index()];
        slot.hour = hour;
        slot.minute = minute;
        slot.enabled = enabled;
        slot.repeat = repeat;
        info!(slot = %id, time = %MinuteStamp::new(hour, minute), enabled, repeat = %repeat,
            "Alarm reprogrammed");

        self.guards[id.index()].clear();
        self.settings.store(&self.slots);
        self.observer.on_alarm_state_changed();
        Ok(())
    }

    /// Change what a slot plays. The webradio station index travels
    /// inside the mode, so leaving webradio drops it by construction.
    pub fn set_mode(&mut self, id: SlotId, mode: AlarmMode) {
        self.slots[id.index()].mode = mode;
        info!(slot = %id, mode = %mode, "Alarm mode changed");

        self.guards[id.index()].clear();
        self.settings.store(&self.slots);
        self.observer.on_alarm_state_changed();
    }

    /// Ramp and timeout bookkeeping for the alarm already ringing.
    async fn service_active(&mut self, backend: &mut AudioBackend) {
        let Some(active) = &mut self.active else {
            return;
        };
        let elapsed = active.started_at.elapsed();

        let step = active.ramp.as_mut().and_then(|ramp| ramp.advance(elapsed));
        let timed_out = match active.current_mode {
            AlarmMode::Buzzer => elapsed >= self.config.buzzer_timeout,
            _ => elapsed > self.config.max_duration,
        };

        if let Some(volume) = step {
            info!(volume, elapsed_s = elapsed.as_secs(), "Volume ramp step");
            backend.set_volume(volume).await;
        }
        if timed_out {
            info!(elapsed_s = elapsed.as_secs(), "Alarm timed out");
            self.stop(backend).await;
        }
    }

    async fn trigger(&mut self, backend: &mut AudioBackend, id: SlotId, now: MinuteStamp) {
        let mode = self.slots[id.index()].mode;
        info!(slot = %id, time = %now, mode = %mode, "Alarm triggered");

        let current_mode = self.start_playback(backend, id, mode).await;

        let started_at = Instant::now();
        self.active = Some(ActiveAlarm {
            slot: id,
            current_mode,
            started_at,
            screen_hold_until: started_at + self.config.screen_hold,
            ramp: current_mode
                .is_audio()
                .then(|| VolumeRamp::new(self.config.ramp_volumes)),
            player_info_shown: false,
        });
        self.observer.on_alarm_state_changed();
    }

    /// Run the fallback chain and report the tier that ended up sounding.
    async fn start_playback(
        &mut self,
        backend: &mut AudioBackend,
        id: SlotId,
        mode: AlarmMode,
    ) -> AlarmMode {
        if mode.is_audio() && !backend.ensure_available().await {
            warn!(slot = %id, "Audio backend unavailable, falling back to buzzer");
            self.buzzer.activate();
            return AlarmMode::Buzzer;
        }

        let mut mode = mode;
        if let AlarmMode::Webradio { station } = mode {
            backend.set_volume(self.config.ramp_volumes.initial).await;
            match backend.play_webradio_station(station).await {
                Ok(name) => {
                    info!(slot = %id, station = %name, "Webradio alarm playing");
                    return mode;
                }
                Err(e) => {
                    warn!(slot = %id, error = %e, station,
                        "Webradio failed, falling back to library");
                    tokio::time::sleep(self.config.webradio_settle).await;
                    mode = AlarmMode::LocalLibrary;
                }
            }
        }

        if mode == AlarmMode::LocalLibrary {
            backend.set_volume(self.config.ramp_volumes.initial).await;
            match backend.play_shuffled_library().await {
                Ok(()) => {
                    info!(slot = %id, "Library alarm playing");
                    return mode;
                }
                Err(e) => {
                    warn!(slot = %id, error = %e, "Library playback failed, falling back to buzzer");
                }
            }
        }

        self.buzzer.activate();
        info!(slot = %id, "Buzzer alarm active");
        AlarmMode::Buzzer
    }

    fn expire_guards(&mut self, now: MinuteStamp) {
        for guard in &mut self.guards {
            guard.expire(now);
        }
    }
}
