// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Simulated device sets loaded from JSON.
//!
//! ```json
//! {
//!   "devices": [
//!     {
//!       "name": "DeckLink Mini Recorder",
//!       "modes": ["Hp29", "Hp59"],
//!       "events": [
//!         { "type": "frame_train", "interval_ms": 20, "until_ms": 40, "signal": false },
//!         { "type": "format_change", "at_ms": 50, "mode": "bmdModeHD1080p5994" }
//!       ]
//!     }
//!   ]
//! }
//! ```

use crate::error::CliError;
use crate::utils::parse_mode;
use modeprobe::device::{AudioConnection, DeviceError, InputFrame, VideoConnection};
use modeprobe::sim::SimulatedDevice;
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub devices: Vec<ScenarioDevice>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDevice {
    pub name: String,

    #[serde(default = "default_true")]
    pub format_detection: bool,

    /// Enumerated modes, in order. Defaults to every nominal mode.
    #[serde(default)]
    pub modes: Option<Vec<String>>,

    #[serde(default)]
    pub reject_video: Vec<String>,

    #[serde(default)]
    pub reject_audio: Vec<String>,

    #[serde(default)]
    pub fail_start: bool,

    #[serde(default)]
    pub fail_stop: bool,

    #[serde(default)]
    pub events: Vec<ScenarioEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ScenarioEvent {
    Frame {
        at_ms: u64,
        #[serde(default = "default_true")]
        signal: bool,
    },
    FrameTrain {
        interval_ms: u64,
        until_ms: u64,
        #[serde(default)]
        signal: bool,
    },
    FormatChange {
        at_ms: u64,
        mode: String,
    },
    EndOfStream {
        at_ms: u64,
    },
}

fn default_true() -> bool {
    true
}

fn frame(signal: bool) -> InputFrame {
    if signal {
        InputFrame::with_signal()
    } else {
        InputFrame::without_signal()
    }
}

impl Scenario {
    /// Read and parse a scenario file.
    pub fn load(path: &Path) -> Result<Scenario, CliError> {
        let text = fs::read_to_string(path).map_err(|e| {
            CliError::DeviceNotFound(format!("Cannot read scenario {}: {}", path.display(), e))
        })?;
        Scenario::parse(&text)
            .map_err(|e| e.context(&format!("scenario {}", path.display())))
    }

    pub fn parse(text: &str) -> Result<Scenario, CliError> {
        serde_json::from_str(text)
            .map_err(|e| CliError::InvalidArgs(format!("Malformed scenario: {}", e)))
    }

    /// Build one simulated device per entry, in file order.
    pub fn build(&self) -> Result<Vec<SimulatedDevice>, CliError> {
        self.devices.iter().map(ScenarioDevice::build).collect()
    }
}

impl ScenarioDevice {
    fn build(&self) -> Result<SimulatedDevice, CliError> {
        let mut device =
            SimulatedDevice::new(&self.name).with_format_detection(self.format_detection);

        if let Some(modes) = &self.modes {
            let modes = modes
                .iter()
                .map(|m| parse_mode(m))
                .collect::<Result<Vec<_>, _>>()?;
            device = device.with_modes(modes);
        }

        for video in &self.reject_video {
            let connection = video
                .parse::<VideoConnection>()
                .map_err(CliError::InvalidArgs)?;
            device = device.with_rejected_video(connection);
        }
        for audio in &self.reject_audio {
            let connection = audio
                .parse::<AudioConnection>()
                .map_err(CliError::InvalidArgs)?;
            device = device.with_rejected_audio(connection);
        }

        if self.fail_start {
            device = device.with_start_failure(DeviceError::failed("StartStreams"));
        }
        if self.fail_stop {
            device = device.with_stop_failure(DeviceError::failed("StopStreams"));
        }

        for event in &self.events {
            device = match event {
                ScenarioEvent::Frame { at_ms, signal } => {
                    device.with_frame(Duration::from_millis(*at_ms), frame(*signal))
                }
                ScenarioEvent::FrameTrain {
                    interval_ms,
                    until_ms,
                    signal,
                } => device.with_frame_train(
                    frame(*signal),
                    Duration::from_millis(*interval_ms),
                    Duration::from_millis(*until_ms),
                ),
                ScenarioEvent::FormatChange { at_ms, mode } => {
                    device.with_format_change(Duration::from_millis(*at_ms), parse_mode(mode)?)
                }
                ScenarioEvent::EndOfStream { at_ms } => {
                    device.with_end_of_stream(Duration::from_millis(*at_ms))
                }
            };
        }

        Ok(device)
    }
}
