//! Backend health and recovery.
//!
//! The playback daemon occasionally wedges or crashes; this module keeps
//! it alive without ever letting recovery run away. Real checks are
//! throttled, restarts are capped, the whole restart procedure sits under
//! one cancellable deadline, and repeated failure quarantines the backend
//! in a degraded cool-down instead of hammering the service manager.
//!
//! # State Machine
//!
//! ```text
//!              probe fails                 3rd restart fails
//!  Healthy ───────────────► Recovering ─────────────────────► Degraded
//!     ▲                        │   ▲                              │
//!     │     restart succeeds   │   │ next throttled check         │
//!     └────────────────────────┘   └──────────────────────────────┘
//!                                        cooldown (60 s) elapsed
//! ```
//!
//! `restart_attempts` resets to zero on every transition to Healthy.
//! While Degraded, all checks are skipped until the cooldown elapses.

use tokio::time::Instant;

use crate::config::HealthConfig;
use crate::error::{AudioError, Result};
use crate::observer::SharedObserver;
use crate::player::{PlayerControl, ServiceState};
use crate::tracing::prelude::*;

const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Recovering,
    Degraded,
}

/// Health state owned by the audio backend. Mutated only from the driver
/// loop; the UI side sees it through read-only queries and the observer.
pub struct BackendHealth {
    config: HealthConfig,
    status: HealthStatus,
    last_check_at: Option<Instant>,
    restart_attempts: u8,
    degraded_since: Option<Instant>,
    /// When the service manager first reported "activating", for the
    /// start-up grace window.
    activating_since: Option<Instant>,
}

impl BackendHealth {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            status: HealthStatus::Healthy,
            last_check_at: None,
            restart_attempts: 0,
            degraded_since: None,
            activating_since: None,
        }
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn is_degraded(&self) -> bool {
        self.status == HealthStatus::Degraded
    }

    pub fn restart_attempts(&self) -> u8 {
        self.restart_attempts
    }

    /// Throttled availability gate called before every playback attempt.
    ///
    /// At most one real check per `check_interval`; between checks the
    /// cached verdict is simply "not degraded". A degraded backend whose
    /// cooldown has elapsed gets one optimistic fresh check.
    pub async fn ensure_available(
        &mut self,
        player: &dyn PlayerControl,
        observer: &SharedObserver,
    ) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_check_at {
            if now.duration_since(last) < self.config.check_interval {
                return !self.is_degraded();
            }
        }
        self.last_check_at = Some(now);

        if self.is_degraded() {
            match self.degraded_since {
                Some(since) if now.duration_since(since) > self.config.degraded_cooldown => {
                    info!("Degraded cooldown elapsed, probing again");
                    self.degraded_since = None;
                    self.set_status(HealthStatus::Healthy, observer);
                }
                _ => {
                    debug!("Degraded, skipping health check until cooldown elapses");
                    return false;
                }
            }
        }

        self.check_health(player, observer).await
    }

    /// One full health check: service-manager probe plus control-channel
    /// round trip. Both must agree the service is usable; any failure
    /// hands off to recovery.
    pub async fn check_health(
        &mut self,
        player: &dyn PlayerControl,
        observer: &SharedObserver,
    ) -> bool {
        if !self.probe_service(player).await {
            warn!("Service-manager probe failed");
            return self.attempt_recovery(player, observer).await;
        }

        match player.now_playing().await {
            Ok(_) => {
                self.set_status(HealthStatus::Healthy, observer);
                true
            }
            Err(e) => {
                warn!(error = %e, "Control-channel probe failed");
                self.attempt_recovery(player, observer).await
            }
        }
    }

    /// Service-manager probe with a grace window for "activating": a
    /// freshly (re)started daemon is not down, it is just slow.
    async fn probe_service(&mut self, player: &dyn PlayerControl) -> bool {
        let state = match player.service_status().await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Service status query failed");
                self.activating_since = None;
                return false;
            }
        };

        match state {
            ServiceState::Active => {
                self.activating_since = None;
                true
            }
            ServiceState::Activating => {
                let now = Instant::now();
                let since = *self.activating_since.get_or_insert(now);
                let elapsed = now.duration_since(since);
                if elapsed <= self.config.activating_grace {
                    true
                } else {
                    warn!(
                        elapsed_s = elapsed.as_secs(),
                        "Service stuck in activating, treating as down"
                    );
                    self.activating_since = None;
                    false
                }
            }
            other => {
                debug!(state = ?other, "Service not active");
                self.activating_since = None;
                false
            }
        }
    }

    /// Bounded recovery: at most `max_restart_attempts` restarts, each
    /// under the global deadline. The attempt that exhausts the cap
    /// enters degraded mode; further calls before the cooldown return
    /// failure without touching the service.
    pub async fn attempt_recovery(
        &mut self,
        player: &dyn PlayerControl,
        observer: &SharedObserver,
    ) -> bool {
        if self.restart_attempts >= self.config.max_restart_attempts {
            self.enter_degraded(observer);
            return false;
        }

        self.restart_attempts += 1;
        self.set_status(HealthStatus::Recovering, observer);
        warn!(
            attempt = self.restart_attempts,
            max = self.config.max_restart_attempts,
            "Attempting playback service restart"
        );

        let deadline = self.config.restart_deadline;
        let started = Instant::now();
        let outcome = tokio::time::timeout(deadline, self.restart_service(player)).await;

        match outcome {
            Ok(Ok(())) => {
                info!(
                    elapsed_s = started.elapsed().as_secs(),
                    "Playback service recovered"
                );
                self.restart_attempts = 0;
                self.set_status(HealthStatus::Healthy, observer);
                true
            }
            Ok(Err(e)) => {
                error!(
                    error = %e,
                    elapsed_s = started.elapsed().as_secs(),
                    "Service restart failed"
                );
                self.degrade_if_exhausted(observer);
                false
            }
            Err(_) => {
                let e = AudioError::RecoveryTimeout(deadline);
                error!(error = %e, "Service restart overran its deadline");
                self.degrade_if_exhausted(observer);
                false
            }
        }
    }

    /// The restart procedure proper. Runs inside the caller's deadline;
    /// its per-stage budgets sum below it so a healthy restart never
    /// races the timeout.
    async fn restart_service(&mut self, player: &dyn PlayerControl) -> Result<()> {
        if let Err(e) = player.stop_service().await {
            // A failed stop is survivable; the start below may still win.
            warn!(error = %e, "Service stop failed, continuing with start");
        }
        tokio::time::sleep(self.config.restart_settle).await;

        player.start_service().await?;

        // Wait for the service manager to consider the unit up.
        let service_deadline = Instant::now() + self.config.service_wait;
        loop {
            match player.service_status().await {
                Ok(ServiceState::Active | ServiceState::Activating) => break,
                Ok(_) | Err(_) => {}
            }
            if Instant::now() >= service_deadline {
                return Err(AudioError::Control(format!(
                    "service not active after {:?}",
                    self.config.service_wait
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        // Then for the control channel to answer.
        let control_deadline = Instant::now() + self.config.control_wait;
        loop {
            if player.now_playing().await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= control_deadline {
                return Err(AudioError::Control(format!(
                    "control channel silent after {:?}",
                    self.config.control_wait
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    fn degrade_if_exhausted(&mut self, observer: &SharedObserver) {
        if self.restart_attempts >= self.config.max_restart_attempts {
            self.enter_degraded(observer);
        }
    }

    fn enter_degraded(&mut self, observer: &SharedObserver) {
        if self.degraded_since.is_none() {
            self.degraded_since = Some(Instant::now());
        }
        if self.status != HealthStatus::Degraded {
            error!(
                attempts = self.restart_attempts,
                cooldown_s = self.config.degraded_cooldown.as_secs(),
                "Entering degraded mode"
            );
        }
        self.set_status(HealthStatus::Degraded, observer);
    }

    fn set_status(&mut self, status: HealthStatus, observer: &SharedObserver) {
        if self.status != status {
            info!(previous = ?self.status, new = ?status, "Backend health changed");
            self.status = status;
            if status == HealthStatus::Healthy {
                self.restart_attempts = 0;
            }
            observer.on_backend_health_changed();
        }
    }
}
