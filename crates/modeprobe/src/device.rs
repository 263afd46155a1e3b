// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Capture device control interface
//!
//! This module defines the narrow surface through which the detector talks to
//! a capture card driver:
//!
//! - [`CaptureDevice`] - capability query, connector routing, display mode
//!   enumeration, per-mode facts, input pipe and stream control
//! - [`InputCallback`] - the notification handler a device invokes from its
//!   own thread when a frame arrives or the detected input format changes
//! - Value types exchanged over that surface ([`DisplayModeId`],
//!   [`ModeFacts`], [`FrameRate`], [`FieldDominance`], [`InputFrame`], ...)
//!
//! Devices are shared as `Arc<dyn CaptureDevice>` and callbacks as
//! `Arc<dyn InputCallback>`; a handle is released when its last reference is
//! dropped.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::fourcc::FourCC;

/// Opaque display mode identifier reported by the device.
///
/// Identifiers are four-character codes such as `Hp59` (1080p59.94) or
/// `pal ` (PAL). Use [`crate::catalog::ModeCatalog`] to turn one into a named
/// mode.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayModeId(FourCC);

impl DisplayModeId {
    /// Create an identifier from its four-character code.
    pub const fn new(code: &[u8; 4]) -> Self {
        DisplayModeId(FourCC::new(code))
    }

    /// Create an identifier from the raw 32-bit driver value.
    pub const fn from_raw(raw: u32) -> Self {
        DisplayModeId(FourCC::from_u32(raw))
    }

    /// Raw 32-bit driver value.
    pub const fn as_raw(&self) -> u32 {
        self.0.to_u32()
    }

    /// Four-character code of this identifier.
    pub fn fourcc(&self) -> FourCC {
        self.0
    }
}

impl From<FourCC> for DisplayModeId {
    fn from(code: FourCC) -> Self {
        DisplayModeId(code)
    }
}

impl fmt::Display for DisplayModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for DisplayModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisplayModeId({:?} = 0x{:08x})", self.0.to_string(), self.as_raw())
    }
}

/// Physical video input connector.
///
/// [`VideoConnection::Unchanged`] leaves the device's current routing alone;
/// it is never forwarded to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VideoConnection {
    #[default]
    Unchanged,
    Composite,
    Component,
    Hdmi,
    Sdi,
}

impl VideoConnection {
    /// Map the numeric connector selection used on the command line.
    ///
    /// `1` composite, `2` component, `3` HDMI, `4` SDI; any other value maps
    /// to [`VideoConnection::Unchanged`].
    pub fn from_index(index: i32) -> Self {
        match index {
            1 => VideoConnection::Composite,
            2 => VideoConnection::Component,
            3 => VideoConnection::Hdmi,
            4 => VideoConnection::Sdi,
            _ => VideoConnection::Unchanged,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VideoConnection::Unchanged => "unchanged",
            VideoConnection::Composite => "composite",
            VideoConnection::Component => "component",
            VideoConnection::Hdmi => "hdmi",
            VideoConnection::Sdi => "sdi",
        }
    }
}

impl fmt::Display for VideoConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VideoConnection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(index) = s.parse::<i32>() {
            return Ok(VideoConnection::from_index(index));
        }
        match s.to_ascii_lowercase().as_str() {
            "unchanged" | "none" | "keep" => Ok(VideoConnection::Unchanged),
            "composite" => Ok(VideoConnection::Composite),
            "component" => Ok(VideoConnection::Component),
            "hdmi" => Ok(VideoConnection::Hdmi),
            "sdi" => Ok(VideoConnection::Sdi),
            _ => Err(format!("unknown video connection: {}", s)),
        }
    }
}

/// Physical audio input connector.
///
/// [`AudioConnection::Unchanged`] leaves the device's current routing alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioConnection {
    #[default]
    Unchanged,
    Analog,
    Embedded,
}

impl AudioConnection {
    /// `1` analog, `2` embedded; any other value maps to
    /// [`AudioConnection::Unchanged`].
    pub fn from_index(index: i32) -> Self {
        match index {
            1 => AudioConnection::Analog,
            2 => AudioConnection::Embedded,
            _ => AudioConnection::Unchanged,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AudioConnection::Unchanged => "unchanged",
            AudioConnection::Analog => "analog",
            AudioConnection::Embedded => "embedded",
        }
    }
}

impl fmt::Display for AudioConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AudioConnection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(index) = s.parse::<i32>() {
            return Ok(AudioConnection::from_index(index));
        }
        match s.to_ascii_lowercase().as_str() {
            "unchanged" | "none" | "keep" => Ok(AudioConnection::Unchanged),
            "analog" => Ok(AudioConnection::Analog),
            "embedded" => Ok(AudioConnection::Embedded),
            _ => Err(format!("unknown audio connection: {}", s)),
        }
    }
}

/// Capture pixel format used when opening the input pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 8-bit 4:2:2 YUV (`2vuy`)
    #[default]
    Yuv8Bit,
    /// 10-bit 4:2:2 YUV (`v210`)
    Yuv10Bit,
}

impl PixelFormat {
    pub fn fourcc(&self) -> FourCC {
        match self {
            PixelFormat::Yuv8Bit => FourCC::new(b"2vuy"),
            PixelFormat::Yuv10Bit => FourCC::new(b"v210"),
        }
    }
}

/// Flags passed when enabling the video input pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoInputFlags(u32);

impl VideoInputFlags {
    pub const NONE: VideoInputFlags = VideoInputFlags(0);
    /// Ask the hardware to watch the signal and report format changes.
    pub const ENABLE_FORMAT_DETECTION: VideoInputFlags = VideoInputFlags(1 << 0);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: VideoInputFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Flags carried by an arriving video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFlags(u32);

impl FrameFlags {
    pub const NONE: FrameFlags = FrameFlags(0);
    /// No signal is present on the selected input.
    pub const HAS_NO_INPUT_SOURCE: FrameFlags = FrameFlags(1 << 31);

    pub const fn from_bits(bits: u32) -> Self {
        FrameFlags(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: FrameFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Events reported together with a format change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatChangedEvents(u32);

impl FormatChangedEvents {
    pub const DISPLAY_MODE_CHANGED: FormatChangedEvents = FormatChangedEvents(1 << 0);
    pub const FIELD_DOMINANCE_CHANGED: FormatChangedEvents = FormatChangedEvents(1 << 1);
    pub const COLORSPACE_CHANGED: FormatChangedEvents = FormatChangedEvents(1 << 2);

    pub const fn from_bits(bits: u32) -> Self {
        FormatChangedEvents(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: FormatChangedEvents) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Metadata of a video frame delivered to [`InputCallback::frame_arrived`].
///
/// Sample data is not exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputFrame {
    flags: FrameFlags,
}

impl InputFrame {
    pub fn new(flags: FrameFlags) -> Self {
        Self { flags }
    }

    /// A frame carrying a valid input signal.
    pub fn with_signal() -> Self {
        Self::new(FrameFlags::NONE)
    }

    /// A frame flagged as having no input source.
    pub fn without_signal() -> Self {
        Self::new(FrameFlags::HAS_NO_INPUT_SOURCE)
    }

    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    pub fn has_no_input_source(&self) -> bool {
        self.flags.contains(FrameFlags::HAS_NO_INPUT_SOURCE)
    }
}

/// Frame rate as an exact rational in frames per second.
///
/// # Example
///
/// ```
/// use modeprobe::device::FrameRate;
///
/// // Drivers usually report a frame duration and a time scale.
/// let rate = FrameRate::from_frame_duration(1001, 60000);
/// assert_eq!(rate, FrameRate::new(60000, 1001));
/// assert_eq!(rate.to_string(), "60000/1001");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRate {
    pub numerator: i64,
    pub denominator: i64,
}

impl FrameRate {
    pub const fn new(numerator: i64, denominator: i64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Build a rate from a frame duration expressed in `time_scale` ticks per second.
    pub const fn from_frame_duration(frame_duration: i64, time_scale: i64) -> Self {
        Self::new(time_scale, frame_duration)
    }

    /// Frames per second as a float, `0.0` for a zero denominator.
    pub fn as_f64(&self) -> f64 {
        if self.denominator == 0 {
            return 0.0;
        }
        self.numerator as f64 / self.denominator as f64
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Scan structure of a display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldDominance {
    Unknown,
    LowerFieldFirst,
    UpperFieldFirst,
    ProgressiveFrame,
    ProgressiveSegmentedFrame,
}

impl FieldDominance {
    /// Convert from the driver's raw code.
    ///
    /// Returns `None` for codes the driver API does not define.
    pub fn from_raw(raw: u32) -> Option<Self> {
        const LOWER: u32 = FourCC::new(b"lowr").to_u32();
        const UPPER: u32 = FourCC::new(b"uppr").to_u32();
        const PROGRESSIVE: u32 = FourCC::new(b"prog").to_u32();
        const SEGMENTED: u32 = FourCC::new(b"psf ").to_u32();

        match raw {
            0 => Some(FieldDominance::Unknown),
            LOWER => Some(FieldDominance::LowerFieldFirst),
            UPPER => Some(FieldDominance::UpperFieldFirst),
            PROGRESSIVE => Some(FieldDominance::ProgressiveFrame),
            SEGMENTED => Some(FieldDominance::ProgressiveSegmentedFrame),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> u32 {
        match self {
            FieldDominance::Unknown => 0,
            FieldDominance::LowerFieldFirst => FourCC::new(b"lowr").to_u32(),
            FieldDominance::UpperFieldFirst => FourCC::new(b"uppr").to_u32(),
            FieldDominance::ProgressiveFrame => FourCC::new(b"prog").to_u32(),
            FieldDominance::ProgressiveSegmentedFrame => FourCC::new(b"psf ").to_u32(),
        }
    }

    /// Human-readable description, e.g. "upper field first".
    pub fn description(&self) -> &'static str {
        match self {
            FieldDominance::Unknown => "unknown",
            FieldDominance::LowerFieldFirst => "lower field first",
            FieldDominance::UpperFieldFirst => "upper field first",
            FieldDominance::ProgressiveFrame => "progressive frame",
            FieldDominance::ProgressiveSegmentedFrame => "progressive segmented frame",
        }
    }

    pub fn is_interlaced(&self) -> bool {
        matches!(
            self,
            FieldDominance::LowerFieldFirst | FieldDominance::UpperFieldFirst
        )
    }
}

impl fmt::Display for FieldDominance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Geometry, rate and scan facts the device reports for one display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeFacts {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    pub field_dominance: FieldDominance,
}

/// Failure reported by a device call.
///
/// `status` is the driver's raw result code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceError {
    pub operation: &'static str,
    pub status: i32,
}

impl DeviceError {
    /// Generic driver failure code.
    pub const E_FAIL: i32 = 0x8000_4005_u32 as i32;
    /// The requested setting or value is not valid for this device.
    pub const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;
    /// The device or one of its resources is in use.
    pub const E_ACCESSDENIED: i32 = 0x8007_0005_u32 as i32;

    pub fn new(operation: &'static str, status: i32) -> Self {
        Self { operation, status }
    }

    pub fn failed(operation: &'static str) -> Self {
        Self::new(operation, Self::E_FAIL)
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed (status 0x{:08x})",
            self.operation, self.status as u32
        )
    }
}

impl std::error::Error for DeviceError {}

/// Lazy, finite, non-restartable sequence of supported display modes.
pub type DisplayModeIter<'a> = Box<dyn Iterator<Item = DisplayModeId> + Send + 'a>;

/// Notification handler registered with a [`CaptureDevice`].
///
/// Both methods are invoked by the device runtime on its own notification
/// thread, concurrently with the thread that started the stream.
pub trait InputCallback: Send + Sync {
    /// A video frame arrived on the input.
    fn frame_arrived(&self, frame: &InputFrame);

    /// The format detection hardware observed a new input format.
    fn format_changed(&self, events: FormatChangedEvents, mode: DisplayModeId);
}

/// Control surface of one capture device input.
///
/// Implementations wrap a driver handle. All methods take `&self`: the driver
/// serialises access internally and the handle is shared between the caller
/// and the notification thread.
pub trait CaptureDevice: Send + Sync {
    /// Model or display name, used in logs and output.
    fn display_name(&self) -> String;

    /// Whether the device can detect the input format on its own.
    fn supports_input_format_detection(&self) -> Result<bool, DeviceError>;

    /// Route the given video connector to the input.
    fn set_video_input_connection(&self, connection: VideoConnection) -> Result<(), DeviceError>;

    /// Route the given audio connector to the input.
    fn set_audio_input_connection(&self, connection: AudioConnection) -> Result<(), DeviceError>;

    /// Enumerate supported display modes.
    fn display_modes(&self) -> Result<DisplayModeIter<'_>, DeviceError>;

    /// Query geometry, frame rate and field dominance of a display mode.
    fn mode_facts(&self, mode: DisplayModeId) -> Result<ModeFacts, DeviceError>;

    /// Register the notification handler, or detach it with `None`.
    ///
    /// The device holds at most one handler.
    fn set_callback(&self, callback: Option<Arc<dyn InputCallback>>) -> Result<(), DeviceError>;

    /// Open the video input pipe.
    fn enable_video_input(
        &self,
        mode: DisplayModeId,
        format: PixelFormat,
        flags: VideoInputFlags,
    ) -> Result<(), DeviceError>;

    /// Close the video input pipe.
    fn disable_video_input(&self) -> Result<(), DeviceError>;

    fn start_streams(&self) -> Result<(), DeviceError>;

    fn stop_streams(&self) -> Result<(), DeviceError>;

    /// Whether a started stream has ended on its own (device removed,
    /// runtime shut the pipe).
    ///
    /// Drivers without such a notion keep the default.
    fn input_stream_ended(&self) -> bool {
        false
    }
}
