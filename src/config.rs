// Copyright 2024-2026 tfw-harness Contributors
// SPDX-License-Identifier: Apache-2.0

//! Harness configuration loading from environment variables.
//!
//! Only `--nightly` and `--stop-on-error` are command-line flags; everything
//! here comes from `TFW_*` environment variables with defaults that match the
//! standard build layout. Invalid values fall back to defaults without
//! crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `TFW_PIPE_WRITE` | `build/dbgpipe_osread` | Host to target sink |
//! | `TFW_PIPE_READ` | `build/dbgpipe_oswrite.txt` | Target to host source |
//! | `TFW_SETTLE_DELAY_MS` | 300 | Pause after a sync byte (300..=600) |
//! | `TFW_ELAPSED_COMPENSATION_MS` | 600 | Subtracted from test durations |
//! | `TFW_POLL_INTERVAL_MS` | 10 | Wait between empty reads |
//! | `TFW_READ_TIMEOUT_SECS` | 0 | Read watchdog (0 = wait forever) |
//! | `TFW_LOG_LEVEL` | `warn` | Diagnostic log filter |
//! | `TFW_LOG_FORMAT` | `pretty` | `pretty` or `json` |

use std::path::PathBuf;
use std::time::Duration;

use crate::dispatch::DispatchConfig;
use crate::link::ReadPolicy;
use crate::telemetry::{LogConfig, LogFormat};

pub const DEFAULT_WRITE_PATH: &str = "build/dbgpipe_osread";
pub const DEFAULT_READ_PATH: &str = "build/dbgpipe_oswrite.txt";

const MIN_SETTLE_MS: u64 = 300;
const MAX_SETTLE_MS: u64 = 600;

/// Everything the harness needs besides the two CLI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub write_path: PathBuf,
    pub read_path: PathBuf,
    pub settle_delay: Duration,
    pub elapsed_compensation: Duration,
    pub read_policy: ReadPolicy,
    pub log: LogConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            write_path: PathBuf::from(DEFAULT_WRITE_PATH),
            read_path: PathBuf::from(DEFAULT_READ_PATH),
            settle_delay: Duration::from_millis(MIN_SETTLE_MS),
            elapsed_compensation: crate::dispatch::DEFAULT_ELAPSED_COMPENSATION,
            read_policy: ReadPolicy::default(),
            log: LogConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Dispatcher settings for one run.
    pub fn dispatch_config(&self, nightly: bool, stop_on_error: bool) -> DispatchConfig {
        DispatchConfig {
            nightly,
            stop_on_error,
            elapsed_compensation: self.elapsed_compensation,
        }
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_path(key: &str, default: &str) -> PathBuf {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => PathBuf::from(val),
        _ => PathBuf::from(default),
    }
}

fn load_read_policy() -> ReadPolicy {
    let poll_ms = parse_u64("TFW_POLL_INTERVAL_MS", 10).max(1);
    let timeout_secs = parse_u64("TFW_READ_TIMEOUT_SECS", 0);
    ReadPolicy {
        poll_interval: Duration::from_millis(poll_ms),
        read_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
    }
}

fn load_log_config() -> LogConfig {
    let defaults = LogConfig::default();
    let level = std::env::var("TFW_LOG_LEVEL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(defaults.level);
    let format = std::env::var("TFW_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or(defaults.format);
    LogConfig { format, level }
}

/// Load all configuration from environment variables.
pub fn load() -> HarnessConfig {
    let settle_ms =
        parse_u64("TFW_SETTLE_DELAY_MS", MIN_SETTLE_MS).clamp(MIN_SETTLE_MS, MAX_SETTLE_MS);
    let compensation_ms = parse_u64("TFW_ELAPSED_COMPENSATION_MS", 600);

    HarnessConfig {
        write_path: parse_path("TFW_PIPE_WRITE", DEFAULT_WRITE_PATH),
        read_path: parse_path("TFW_PIPE_READ", DEFAULT_READ_PATH),
        settle_delay: Duration::from_millis(settle_ms),
        elapsed_compensation: Duration::from_millis(compensation_ms),
        read_policy: load_read_policy(),
        log: load_log_config(),
    }
}
