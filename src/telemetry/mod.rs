// Copyright 2024-2026 tfw-harness Contributors
// SPDX-License-Identifier: Apache-2.0

//! Structured diagnostics for the harness.

mod logging;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
