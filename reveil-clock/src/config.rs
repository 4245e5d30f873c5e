//! Daemon configuration.
//!
//! Plain structs with compiled-in defaults. The timing values are the
//! contract the rest of the crate is tested against; change them with care.

use std::time::Duration;

/// A webradio station the alarm can tune to.
#[derive(Debug, Clone)]
pub struct Station {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct AlarmConfig {
    /// Volume at alarm start and after each ramp step, in player percent.
    pub ramp_volumes: RampVolumes,

    /// Buzzer-mode alarms stop themselves after this long.
    pub buzzer_timeout: Duration,

    /// Hard cap on any active alarm; audio alarms are stopped once
    /// elapsed exceeds this.
    pub max_duration: Duration,

    /// How long the display is held awake after a trigger.
    pub screen_hold: Duration,

    /// Pause between a failed webradio attempt and the library fallback,
    /// letting the network settle.
    pub webradio_settle: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct RampVolumes {
    pub initial: u8,
    pub mid: u8,
    pub full: u8,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            ramp_volumes: RampVolumes {
                initial: 60,
                mid: 80,
                full: 100,
            },
            buzzer_timeout: Duration::from_secs(60),
            max_duration: Duration::from_secs(7200),
            screen_hold: Duration::from_secs(3600),
            webradio_settle: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Minimum interval between real health checks; in between,
    /// `ensure_available` answers from the cached verdict.
    pub check_interval: Duration,

    /// Restart attempts before entering degraded mode.
    pub max_restart_attempts: u8,

    /// Hard deadline over the whole restart procedure.
    pub restart_deadline: Duration,

    /// How long degraded mode is held before a fresh check is allowed.
    pub degraded_cooldown: Duration,

    /// Settle delay between stopping and starting the service.
    pub restart_settle: Duration,

    /// Budget for the service-manager poll after a restart.
    pub service_wait: Duration,

    /// Budget for the control-channel poll after the service is up.
    pub control_wait: Duration,

    /// The service manager may report "activating" for this long before
    /// the probe treats the service as down.
    pub activating_grace: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            max_restart_attempts: 3,
            restart_deadline: Duration::from_secs(90),
            degraded_cooldown: Duration::from_secs(60),
            restart_settle: Duration::from_secs(1),
            service_wait: Duration::from_secs(60),
            control_wait: Duration::from_secs(20),
            activating_grace: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the local music library, as MPD sees it.
    pub music_dir: String,

    /// Webradio stations, addressed by index from the alarm slots.
    pub stations: Vec<Station>,

    /// Driver loop tick. Clock reads and alarm evaluation happen at 1 Hz
    /// regardless; this only bounds overall responsiveness.
    pub loop_tick: Duration,

    /// On/off half-period of the buzzer beep.
    pub beep_duration: Duration,

    /// Sysfs value file of the GPIO line driving the buzzer.
    pub buzzer_gpio_value: String,

    pub alarm: AlarmConfig,
    pub health: HealthConfig,

    /// Where alarm settings are persisted.
    pub settings_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            music_dir: "/home/reveil/Musique".into(),
            stations: vec![
                Station {
                    name: "FIP".into(),
                    url: "http://icecast.radiofrance.fr/fip-hifi.aac".into(),
                },
                Station {
                    name: "France Inter".into(),
                    url: "http://icecast.radiofrance.fr/franceinter-hifi.aac".into(),
                },
            ],
            loop_tick: Duration::from_millis(200),
            beep_duration: Duration::from_millis(300),
            buzzer_gpio_value: "/sys/class/gpio/gpio18/value".into(),
            alarm: AlarmConfig::default(),
            health: HealthConfig::default(),
            settings_path: "/home/reveil/.config/reveil/alarms.json".into(),
        }
    }
}
