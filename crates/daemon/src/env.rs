// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Daemon version string (from Cargo.toml)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit code signalling "restart requested" to the CLI's start loop.
pub const RESTART_EXIT_CODE: i32 = 42;

/// Resolve the config dir: SCHMUX_DIR > ~/.schmux
pub fn config_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("SCHMUX_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoConfigDir)?;
    Ok(home.join(".schmux"))
}

/// HTTP port override; falls back to `config.json`'s `http_port`.
pub fn http_port() -> Option<u16> {
    std::env::var("SCHMUX_PORT").ok().and_then(|s| s.parse::<u16>().ok())
}

/// State-save debounce window (default 200ms).
pub fn save_debounce() -> Duration {
    millis_var("SCHMUX_SAVE_DEBOUNCE_MS").unwrap_or(Duration::from_millis(200))
}

/// Dashboard broadcast debounce window (default 100ms).
pub fn broadcast_debounce() -> Duration {
    millis_var("SCHMUX_BROADCAST_DEBOUNCE_MS").unwrap_or(Duration::from_millis(100))
}

/// Shutdown drain timeout for trackers (default 5s).
pub fn drain_timeout() -> Duration {
    millis_var("SCHMUX_DRAIN_TIMEOUT_MS").unwrap_or(Duration::from_secs(5))
}

/// NudgeNik tick interval (default 15s).
pub fn nudgenik_interval() -> Duration {
    millis_var("SCHMUX_NUDGENIK_INTERVAL_MS").unwrap_or(Duration::from_secs(15))
}

/// NudgeNik delay before the first tick (default 10s).
pub fn nudgenik_startup_delay() -> Duration {
    millis_var("SCHMUX_NUDGENIK_STARTUP_DELAY_MS").unwrap_or(Duration::from_secs(10))
}

/// Overlay compounder sweep interval (default 30s).
pub fn compound_interval() -> Duration {
    millis_var("SCHMUX_COMPOUND_INTERVAL_MS").unwrap_or(Duration::from_secs(30))
}

/// Per-repo lore curation debounce after session dispose (default 30s).
pub fn curate_debounce() -> Duration {
    millis_var("SCHMUX_CURATE_DEBOUNCE_MS").unwrap_or(Duration::from_secs(30))
}

fn millis_var(name: &str) -> Option<Duration> {
    std::env::var(name).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}
