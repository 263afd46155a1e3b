// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use modeprobe::catalog::ModeCatalog;
use modeprobe::device::DisplayModeId;
use modeprobe::fourcc::FourCC;
use signal_hook::consts::SIGINT;
use signal_hook::flag;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Resolve a display mode written as a four-character code (`Hp59`) or a
/// catalog name (`bmdModeHD1080p5994`).
///
/// Four-character codes need not be in the catalog.
pub fn parse_mode(s: &str) -> Result<DisplayModeId, CliError> {
    if let Some(entry) = ModeCatalog::default().by_name(s) {
        return Ok(entry.id);
    }
    s.parse::<FourCC>()
        .map(DisplayModeId::from)
        .map_err(|e| CliError::InvalidArgs(format!("Invalid display mode: {}", e)))
}

/// Format a frame rate the way a C++ stream prints a float: six significant
/// digits, trailing zeros dropped.
pub fn format_fps(fps: f64) -> String {
    if fps == 0.0 || !fps.is_finite() {
        return "0".to_string();
    }
    let integer_digits = (fps.abs().log10().floor() as i32 + 1).max(1);
    let decimals = (6 - integer_digits).max(0) as usize;
    let text = format!("{:.*}", decimals, fps);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

/// Install signal handler for graceful shutdown on Ctrl+C
///
/// Returns an Arc<AtomicBool> that will be set to true when SIGINT is received.
pub fn install_signal_handler() -> Result<Arc<AtomicBool>, CliError> {
    let term = Arc::new(AtomicBool::new(false));

    flag::register(SIGINT, Arc::clone(&term))
        .map_err(|e| CliError::General(format!("Failed to register signal handler: {}", e)))?;

    log::debug!("Installed SIGINT handler");
    Ok(term)
}
