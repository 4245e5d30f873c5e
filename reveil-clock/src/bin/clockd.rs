//! Alarm clock daemon.
//!
//! Wires the system clock, the JSON settings store, the mpc/systemctl
//! player control and the GPIO buzzer into the driver loop, then runs
//! until SIGINT.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use reveil_clock::alarm::AlarmScheduler;
use reveil_clock::audio::AudioBackend;
use reveil_clock::buzzer::{Buzzer, BuzzerOutput, beeper_task};
use reveil_clock::clock::SystemClock;
use reveil_clock::config::Config;
use reveil_clock::coordinator::Coordinator;
use reveil_clock::observer::{NullObserver, SharedObserver};
use reveil_clock::player::mpc::MpcControl;
use reveil_clock::settings::JsonSettings;

/// Buzzer line behind a sysfs GPIO value file. Write failures are logged
/// and the alarm keeps ringing through the audio path regardless.
struct GpioValueOutput {
    path: PathBuf,
}

impl BuzzerOutput for GpioValueOutput {
    fn set(&mut self, on: bool) {
        if let Err(e) = std::fs::write(&self.path, if on { "1" } else { "0" }) {
            warn!(path = %self.path.display(), error = %e, "Buzzer GPIO write failed");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    reveil_clock::tracing::init();

    let config = Config::default();
    info!(
        music_dir = %config.music_dir,
        stations = config.stations.len(),
        "reveil-clockd starting"
    );

    let observer: SharedObserver = Arc::new(NullObserver);
    let backend = AudioBackend::new(
        Box::new(MpcControl::new()),
        config.health.clone(),
        config.music_dir.clone(),
        config.stations.clone(),
        observer.clone(),
    );

    let (buzzer, beeper_rx) = Buzzer::new();
    let scheduler = AlarmScheduler::new(
        Box::new(JsonSettings::new(&config.settings_path)),
        buzzer,
        observer,
        config.alarm.clone(),
    );

    let (coordinator, command_tx) = Coordinator::new(
        Box::new(SystemClock),
        scheduler,
        backend,
        config.loop_tick,
    );

    let cancellation = CancellationToken::new();
    let beeper = tokio::spawn(beeper_task(
        GpioValueOutput {
            path: PathBuf::from(&config.buzzer_gpio_value),
        },
        beeper_rx,
        config.beep_duration,
        cancellation.clone(),
    ));
    let driver = tokio::spawn(coordinator.run(cancellation.clone()));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    // Dropping the handle alone would also end the loop; cancel first so
    // the beeper task stops too.
    cancellation.cancel();
    drop(command_tx);
    driver.await?;
    beeper.await?;

    info!("reveil-clockd stopped");
    Ok(())
}
