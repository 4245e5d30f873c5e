//! Progressive volume ramp for the first minute of an alarm.
//!
//! Playback starts at 60% so the sleeper is not blasted awake; the ramp
//! raises it to 80% after 30 seconds and 100% after 60 seconds.
//!
//! # State Machine
//!
//! ```text
//!           elapsed >= 30s          elapsed >= 60s
//!  Init60 ────────────────► Ramp80 ───────────────► Full100 ──► Done
//!    (60%)      +80%          (80%)     +100%
//! ```
//!
//! Each transition yields the volume to apply exactly once, no matter how
//! many times [`advance`](VolumeRamp::advance) is called per second, and
//! the phase order is monotonic: the volume never goes back down while an
//! alarm is ringing.

use std::time::Duration;

use crate::config::RampVolumes;

const MID_STEP_AT: Duration = Duration::from_secs(30);
const FULL_STEP_AT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampPhase {
    /// Initial 60% volume, waiting for the 30 s mark.
    Init60,
    /// 80% applied, waiting for the 60 s mark.
    Ramp80,
    /// 100% applied.
    Full100,
    /// Terminal; nothing left to do.
    Done,
}

/// One-shot volume ramp. Created when an audio alarm starts ringing.
#[derive(Debug)]
pub struct VolumeRamp {
    phase: RampPhase,
    volumes: RampVolumes,
}

impl VolumeRamp {
    pub fn new(volumes: RampVolumes) -> Self {
        Self {
            phase: RampPhase::Init60,
            volumes,
        }
    }

    pub fn phase(&self) -> RampPhase {
        self.phase
    }

    /// The volume playback starts at.
    pub fn initial_volume(&self) -> u8 {
        self.volumes.initial
    }

    /// Advance the ramp given time elapsed since the alarm started.
    ///
    /// Returns the volume to apply when a step fires, `None` otherwise.
    /// A step fires at most once; a late caller that jumps past both
    /// thresholds gets the steps on consecutive calls, still in order.
    pub fn advance(&mut self, elapsed: Duration) -> Option<u8> {
        match self.phase {
            RampPhase::Init60 if elapsed >= MID_STEP_AT => {
                self.phase = RampPhase::Ramp80;
                Some(self.volumes.mid)
            }
            RampPhase::Ramp80 if elapsed >= FULL_STEP_AT => {
                self.phase = RampPhase::Full100;
                Some(self.volumes.full)
            }
            RampPhase::Full100 => {
                self.phase = RampPhase::Done;
                None
            }
            _ => None,
        }
    }
}
