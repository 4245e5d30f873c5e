//! Buzzer: the playback tier that cannot fail.
//!
//! The scheduler only flips an active flag through [`Buzzer`]; the actual
//! beeping runs on its own task ([`beeper_task`]) so the driver loop is
//! never blocked by beep timing. The task reads nothing but that flag and
//! the GPIO-equivalent output, never alarm or health state.

use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::tracing::prelude::*;

/// GPIO-equivalent output line.
pub trait BuzzerOutput: Send {
    fn set(&mut self, on: bool);
}

/// Handle the scheduler holds. Cloneable; activation is level-triggered,
/// so repeated activate/deactivate calls are idempotent.
#[derive(Clone)]
pub struct Buzzer {
    active_tx: watch::Sender<bool>,
}

impl Buzzer {
    /// Create the handle and the flag receiver to hand to [`beeper_task`].
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (active_tx, active_rx) = watch::channel(false);
        (Self { active_tx }, active_rx)
    }

    pub fn activate(&self) {
        if !self.active_tx.send_replace(true) {
            debug!("Buzzer activated");
        }
    }

    pub fn deactivate(&self) {
        if self.active_tx.send_replace(false) {
            debug!("Buzzer deactivated");
        }
    }

    pub fn is_active(&self) -> bool {
        *self.active_tx.borrow()
    }
}

/// Periodic beeper. Toggles the output at `beep` intervals while the flag
/// is set, holds it low otherwise, and leaves it low on shutdown.
pub async fn beeper_task(
    mut output: impl BuzzerOutput,
    mut active_rx: watch::Receiver<bool>,
    beep: Duration,
    cancellation: CancellationToken,
) {
    trace!("Beeper task started");
    let mut line_high = false;

    loop {
        if *active_rx.borrow() {
            line_high = !line_high;
            output.set(line_high);

            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = active_rx.changed() => {}
                _ = tokio::time::sleep(beep) => {}
            }

            if !*active_rx.borrow() && line_high {
                line_high = false;
                output.set(false);
            }
        } else {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = active_rx.changed() => {}
            }
        }
    }

    output.set(false);
    trace!("Beeper task stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    struct TestOutput {
        level: Arc<AtomicBool>,
        toggles: Arc<AtomicUsize>,
    }

    impl BuzzerOutput for TestOutput {
        fn set(&mut self, on: bool) {
            if self.level.swap(on, Ordering::SeqCst) != on {
                self.toggles.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn setup() -> (
        Buzzer,
        watch::Receiver<bool>,
        Arc<AtomicBool>,
        Arc<AtomicUsize>,
        TestOutput,
    ) {
        let (buzzer, rx) = Buzzer::new();
        let level = Arc::new(AtomicBool::new(false));
        let toggles = Arc::new(AtomicUsize::new(0));
        let output = TestOutput {
            level: level.clone(),
            toggles: toggles.clone(),
        };
        (buzzer, rx, level, toggles, output)
    }

    #[test]
    fn handle_flag_is_idempotent() {
        let (buzzer, rx, ..) = setup();
        assert!(!buzzer.is_active());
        buzzer.activate();
        buzzer.activate();
        assert!(buzzer.is_active());
        assert!(*rx.borrow());
        buzzer.deactivate();
        buzzer.deactivate();
        assert!(!buzzer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn beeps_while_active_and_silences_on_deactivate() {
        let (buzzer, rx, level, toggles, output) = setup();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(beeper_task(
            output,
            rx,
            Duration::from_millis(300),
            cancel.clone(),
        ));

        buzzer.activate();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(toggles.load(Ordering::SeqCst) >= 4, "expected several beeps");

        buzzer.deactivate();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!level.load(Ordering::SeqCst), "line must rest low");

        let toggles_at_rest = toggles.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            toggles.load(Ordering::SeqCst),
            toggles_at_rest,
            "no beeping while inactive"
        );

        cancel.cancel();
        task.await.unwrap();
        assert!(!level.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_leaves_line_low_mid_beep() {
        let (buzzer, rx, level, _toggles, output) = setup();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(beeper_task(
            output,
            rx,
            Duration::from_millis(300),
            cancel.clone(),
        ));

        buzzer.activate();
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        task.await.unwrap();
        assert!(!level.load(Ordering::SeqCst));
    }
}
