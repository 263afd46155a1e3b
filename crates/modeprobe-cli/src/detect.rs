// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Input format detection across every capture device.

use crate::error::CliError;
use crate::scenario::Scenario;
use crate::utils::{format_fps, install_signal_handler};
use clap::Args as ClapArgs;
use modeprobe::catalog::{ApiVersion, ModeDescriptor};
use modeprobe::detector::{DetectorConfig, FormatDetector};
use modeprobe::device::{AudioConnection, CaptureDevice, VideoConnection};
use modeprobe::{driver, Error};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// JSON file describing simulated capture devices (required to probe any device)
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Video input connector (sdi, hdmi, component, composite, unchanged or 1-4)
    #[arg(long, default_value = "sdi")]
    video: VideoConnection,

    /// Audio input connector (embedded, analog, unchanged or 1-2)
    #[arg(long, default_value = "embedded")]
    audio: AudioConnection,

    /// Maximum time to wait for a format per device, in milliseconds
    #[arg(short, long, default_value = "2000")]
    timeout: u64,

    /// Interval between completion checks, in milliseconds
    #[arg(long, default_value = "10")]
    poll: u64,

    /// Driver API version used to gate catalog entries
    #[arg(long, default_value_t = ApiVersion::default())]
    api_version: ApiVersion,
}

#[derive(Debug, Serialize)]
struct DetectionRecord {
    instance: usize,
    device: String,
    detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<ModeRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ModeRecord {
    code: i32,
    name: &'static str,
    fourcc: String,
    width: u32,
    height: u32,
    frame_rate: String,
    fps: f64,
    field_dominance: &'static str,
}

impl From<&ModeDescriptor> for ModeRecord {
    fn from(mode: &ModeDescriptor) -> Self {
        ModeRecord {
            code: mode.code(),
            name: mode.name(),
            fourcc: mode.id().to_string(),
            width: mode.width(),
            height: mode.height(),
            frame_rate: mode.frame_rate().to_string(),
            fps: mode.frame_rate().as_f64(),
            field_dominance: mode.field_dominance().description(),
        }
    }
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing detect command: {:?}", args);

    if args.timeout == 0 {
        return Err(CliError::InvalidArgs("timeout must be positive".to_string()));
    }
    if args.poll == 0 {
        return Err(CliError::InvalidArgs(
            "poll interval must be positive".to_string(),
        ));
    }

    let config = DetectorConfig::default()
        .with_timeout(Duration::from_millis(args.timeout))
        .with_poll_interval(Duration::from_millis(args.poll))
        .with_api_version(args.api_version);

    let devices = open_devices(&args)?;
    if devices.is_empty() {
        return Err(CliError::DeviceNotFound(
            "no capture devices in scenario".to_string(),
        ));
    }

    let term = install_signal_handler()?;
    let total = devices.len();
    let mut records = Vec::with_capacity(total);
    let mut first_failure: Option<CliError> = None;
    let mut failures = 0;

    for (instance, device) in devices.into_iter().enumerate() {
        if term.load(Ordering::Relaxed) {
            log::info!("Interrupted, skipping remaining devices");
            break;
        }

        let name = device.display_name();
        if !json {
            println!("instance: {}", instance);
        }

        let mut detector = FormatDetector::with_config(device, config);
        let result = detector.detect_configured(args.video, args.audio);

        if !json {
            print_text_result(&result);
        }

        let record = match result {
            Ok(mode) => DetectionRecord {
                instance,
                device: name,
                detected: true,
                mode: Some(ModeRecord::from(&mode)),
                error: None,
            },
            Err(err) => {
                log::error!("{}: {}", name, err);
                let message = err.to_string();
                failures += 1;
                if first_failure.is_none() {
                    first_failure = Some(
                        CliError::from(err).context(&format!("instance {} ({})", instance, name)),
                    );
                }
                DetectionRecord {
                    instance,
                    device: name,
                    detected: false,
                    mode: None,
                    error: Some(message),
                }
            }
        };
        records.push(record);
    }

    if json {
        let json_str = serde_json::to_string_pretty(&records)
            .map_err(|e| CliError::General(format!("JSON serialization failed: {}", e)))?;
        println!("{}", json_str);
    }

    match first_failure {
        None => Ok(()),
        Some(err) => {
            log::debug!("{} of {} devices failed", failures, total);
            Err(err)
        }
    }
}

/// Devices to probe, in order.
fn open_devices(args: &Args) -> Result<Vec<Arc<dyn CaptureDevice>>, CliError> {
    if let Some(path) = &args.scenario {
        let devices = Scenario::load(path)?.build()?;
        return Ok(devices
            .into_iter()
            .map(|d| Arc::new(d) as Arc<dyn CaptureDevice>)
            .collect());
    }

    // Hardware enumeration needs the driver runtime; report why it is unavailable.
    match driver::init() {
        Ok(runtime) => Err(CliError::DeviceNotFound(format!(
            "driver runtime {} is present but hardware enumeration is not available; use --scenario",
            runtime.path()
        ))),
        Err(err @ Error::DriverNotLoaded(_)) => Err(CliError::from(err)),
        Err(err) => Err(CliError::General(err.to_string())),
    }
}

fn print_text_result(result: &Result<ModeDescriptor, Error>) {
    match result {
        Ok(mode) => {
            println!("Video mode: {}, {}", mode.code(), mode.name());
            println!(
                "Resolution: {}x{}, framerate: {}, field dominance: {}",
                mode.width(),
                mode.height(),
                format_fps(mode.frame_rate().as_f64()),
                mode.field_dominance().description()
            );
        }
        Err(Error::UnknownMode(_)) => {
            println!("Video mode: -1, unknown");
            println!("Failed to detect video mode");
        }
        Err(_) => println!("Failed to detect video mode"),
    }
}
