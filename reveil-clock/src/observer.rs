//! State-change notification hook.
//!
//! The scheduler and the audio backend call these after any state change
//! so the UI layer can re-render. Notifications are fire-and-forget: the
//! methods are infallible by signature, so nothing an observer does can
//! propagate back into alarm or health logic.

use std::sync::Arc;

/// Consumed by the (out-of-tree) display/menu layer.
pub trait StateObserver: Send + Sync {
    /// An alarm fired, changed playback tier, or stopped.
    fn on_alarm_state_changed(&self);

    /// Backend health transitioned (degraded entered or cleared).
    fn on_backend_health_changed(&self);
}

/// Default observer for headless operation.
pub struct NullObserver;

impl StateObserver for NullObserver {
    fn on_alarm_state_changed(&self) {}
    fn on_backend_health_changed(&self) {}
}

pub type SharedObserver = Arc<dyn StateObserver>;
