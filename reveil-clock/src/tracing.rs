//! Tracing setup and the crate-wide logging prelude.
//!
//! Modules do `use crate::tracing::prelude::*;` and get the usual macros.
//! The daemon binary calls [`init`] once at startup; it prefers journald
//! when a journal socket is present (the production device runs under
//! systemd) and falls back to stderr with local timestamps otherwise.

pub mod prelude {
    pub use ::tracing::{debug, error, info, trace, warn};
}

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber.
///
/// `RUST_LOG` controls filtering; default level is `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match tracing_journald::layer() {
        Ok(journald) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(journald)
                .init();
        }
        Err(_) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_timer(LocalTime::rfc_3339())
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}
