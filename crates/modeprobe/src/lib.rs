// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! ModeProbe Library for Rust
//!
//! Automatic input video format detection for professional SDI/HDMI capture
//! devices. A [`FormatDetector`](detector::FormatDetector) opens the device's
//! input with a provisional display mode, lets the hardware format detection
//! report what is actually connected, and resolves the result against a
//! catalog of known broadcast and cinema modes.
//!
//! Capture hardware is reached through the [`CaptureDevice`](device::CaptureDevice)
//! trait. The [`sim`] module provides a scripted device for tests and demos,
//! and [`driver`] probes the vendor runtime library.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use modeprobe::detector::FormatDetector;
//! use modeprobe::device::{AudioConnection, DisplayModeId, VideoConnection};
//! use modeprobe::sim::SimulatedDevice;
//!
//! let device = SimulatedDevice::new("DeckLink Mini Recorder")
//!     .with_format_change(Duration::from_millis(20), DisplayModeId::new(b"Hp59"));
//! let mut detector = FormatDetector::new(Arc::new(device));
//! let mode = detector.detect(
//!     VideoConnection::Sdi,
//!     AudioConnection::Embedded,
//!     Duration::from_secs(2),
//! )?;
//! println!("Video mode: {}, {}", mode.code(), mode.name());
//! println!("Resolution: {}x{}", mode.width(), mode.height());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Features
//!
//! - Hardware-assisted detection with a provisional mode fallback
//! - Catalog of 36 SD, HD, 2K and 4K display modes
//! - Version gating for high frame rate 4K modes
//! - Runtime probing of the capture driver without link-time dependencies
//!
//! # Support
//!
//! For questions and support:
//! - Repository: <https://github.com/EdgeFirstAI/modeprobe>
//! - Professional support: support@au-zone.com

use std::{error, fmt, time::Duration};

pub mod catalog;
pub mod detector;
pub mod device;
pub mod driver;
pub mod fourcc;
pub mod session;
pub mod sim;

pub use catalog::{ModeCatalog, ModeDescriptor};
pub use detector::{DetectorConfig, FormatDetector, Outcome};

use device::{DeviceError, DisplayModeId};

/// Error type for format detection
#[derive(Debug)]
pub enum Error {
    /// The device cannot detect its input format
    UnsupportedDevice(String),

    /// An explicitly requested input connector was rejected by the device
    Configuration {
        setting: &'static str,
        value: &'static str,
        source: DeviceError,
    },

    /// The device enumerated no display modes to open the input with
    NoModesAvailable,

    /// Opening the input pipe or starting the stream failed
    StreamStart(DeviceError),

    /// Stopping the stream failed
    StreamStop(DeviceError),

    /// No frame or format change was resolved within the timeout
    TimedOut(Duration),

    /// The input stream ended without delivering a usable event
    NoSignal,

    /// The resolved display mode is not in the catalog
    UnknownMode(DisplayModeId),

    /// Any other device call failed
    Device(DeviceError),

    /// The capture driver runtime could not be loaded
    DriverNotLoaded(libloading::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnsupportedDevice(name) => {
                write!(f, "{} does not support input format detection", name)
            }
            Error::Configuration { setting, value, .. } => {
                write!(f, "could not set {} to {}", setting, value)
            }
            Error::NoModesAvailable => write!(f, "device reports no display modes"),
            Error::StreamStart(err) => write!(f, "could not start capture: {}", err),
            Error::StreamStop(err) => write!(f, "could not stop capture: {}", err),
            Error::TimedOut(timeout) => write!(
                f,
                "no video format detected within {} ms",
                timeout.as_millis()
            ),
            Error::NoSignal => write!(f, "input stream ended without a signal"),
            Error::UnknownMode(id) => write!(f, "unknown display mode {}", id),
            Error::Device(err) => write!(f, "device error: {}", err),
            Error::DriverNotLoaded(err) => {
                write!(f, "capture driver runtime could not be loaded: {}", err)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Configuration { source, .. } => Some(source),
            Error::StreamStart(err) => Some(err),
            Error::StreamStop(err) => Some(err),
            Error::Device(err) => Some(err),
            Error::DriverNotLoaded(err) => Some(err),
            Error::UnsupportedDevice(_)
            | Error::NoModesAvailable
            | Error::TimedOut(_)
            | Error::NoSignal
            | Error::UnknownMode(_) => None,
        }
    }
}

impl From<DeviceError> for Error {
    fn from(err: DeviceError) -> Self {
        Error::Device(err)
    }
}

impl From<libloading::Error> for Error {
    fn from(err: libloading::Error) -> Self {
        Error::DriverNotLoaded(err)
    }
}
