//! Unattended alarm clock controller.
//!
//! reveil-clock drives a bedside alarm radio: at configured times it starts
//! audio playback through an external media-player daemon (MPD via `mpc`),
//! falls back through playback tiers when that fails, and keeps the daemon
//! alive with bounded restart attempts.
//!
//! # Architecture
//!
//! ```text
//!   ┌─────────────┐ now()/day_of_week()  ┌────────────────┐
//!   │ Coordinator ├─────────────────────►│ AlarmScheduler │
//!   │ (tick loop) │      evaluate()      │  slots, guards │
//!   └──────┬──────┘                      └───┬────────┬───┘
//!          │                                 │        │
//!          │ shutdown (CancellationToken)    ▼        ▼
//!          │                         ┌──────────┐ ┌────────┐
//!          │                         │  Audio   │ │ Buzzer │
//!          │                         │ Backend  │ │ (task) │
//!          │                         └────┬─────┘ └────────┘
//!          │                              │ health gate
//!          ▼                              ▼
//!   ┌──────────────┐             ┌───────────────┐
//!   │ StateObserver│◄────────────┤ BackendHealth │
//!   │  (UI hook)   │  notify     │ check/recover │
//!   └──────────────┘             └───────────────┘
//! ```
//!
//! The scheduler owns the two alarm slots, the one-shot trigger guards, and
//! the single active alarm. The audio backend owns the health state and is
//! the only component that talks to the player control channel. Everything
//! runs on one driver-loop task; the buzzer beeper is the only other task
//! and reads nothing but a bool flag.

pub mod alarm;
pub mod audio;
pub mod buzzer;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod observer;
pub mod player;
pub mod settings;
pub mod tracing;

pub use error::Result;
