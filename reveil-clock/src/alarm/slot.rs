//! Alarm slot data model.
//!
//! Two fixed slots; the cardinality is a deliberate simplification, not
//! something to generalize.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::clock::{MinuteStamp, Weekday};

/// Identifier of one of the two alarm slots. Slot one wins arbitration
/// when both match the same minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum SlotId {
    #[strum(to_string = "1")]
    One,
    #[strum(to_string = "2")]
    Two,
}

impl SlotId {
    pub const ALL: [SlotId; 2] = [SlotId::One, SlotId::Two];

    pub fn index(&self) -> usize {
        match self {
            SlotId::One => 0,
            SlotId::Two => 1,
        }
    }
}

/// Which days a slot fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum RepeatRule {
    Daily,
    Weekday,
    Weekend,
}

impl RepeatRule {
    pub fn matches(&self, day: Weekday) -> bool {
        match self {
            RepeatRule::Daily => true,
            RepeatRule::Weekday => day.is_weekday(),
            RepeatRule::Weekend => day.is_weekend(),
        }
    }
}

/// What a slot plays when it fires.
///
/// The station index only exists for webradio, so changing mode away from
/// it drops the index by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum AlarmMode {
    Buzzer,
    LocalLibrary,
    #[strum(to_string = "Webradio")]
    Webradio {
        station: usize,
    },
}

impl AlarmMode {
    pub fn is_audio(&self) -> bool {
        !matches!(self, AlarmMode::Buzzer)
    }
}

/// One persisted alarm slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmSlot {
    pub id: SlotId,
    pub hour: u8,
    pub minute: u8,
    pub enabled: bool,
    pub repeat: RepeatRule,
    pub mode: AlarmMode,
}

impl AlarmSlot {
    /// Disabled midnight default, the fallback when settings cannot be
    /// loaded.
    pub fn default_for(id: SlotId) -> Self {
        Self {
            id,
            hour: 0,
            minute: 0,
            enabled: false,
            repeat: RepeatRule::Daily,
            mode: AlarmMode::LocalLibrary,
        }
    }

    /// Whether this slot should fire at `now` on `day`, ignoring the
    /// trigger guard.
    pub fn matches(&self, now: MinuteStamp, day: Weekday) -> bool {
        self.enabled
            && self.hour == now.hour()
            && self.minute == now.minute()
            && self.repeat.matches(day)
    }
}

/// One-shot guard: the minute a slot last fired at.
///
/// While the wall clock still reads that minute the slot cannot fire
/// again; the scheduler clears the stamp on the first evaluation in a
/// different minute. This is the sole duplicate-fire prevention.
#[derive(Debug, Default)]
pub struct TriggerGuard {
    fired_at: Option<MinuteStamp>,
}

impl TriggerGuard {
    pub fn is_blocked(&self, now: MinuteStamp) -> bool {
        self.fired_at == Some(now)
    }

    pub fn stamp(&mut self, now: MinuteStamp) {
        self.fired_at = Some(now);
    }

    /// Drop the stamp once the minute has rolled over.
    pub fn expire(&mut self, now: MinuteStamp) {
        if self.fired_at.is_some() && self.fired_at != Some(now) {
            self.fired_at = None;
        }
    }

    pub fn clear(&mut self) {
        self.fired_at = None;
    }
}
