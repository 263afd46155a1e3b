// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Input format detection
//!
//! [`FormatDetector`] drives one [`DetectionSession`] against a
//! [`CaptureDevice`] from "started" to "resolved or timed out":
//!
//! 1. Check that the device can detect input formats at all.
//! 2. Apply the requested connector routing.
//! 3. Pick the first enumerable display mode as a provisional mode; it only
//!    serves to open the input pipe.
//! 4. Register the session's callback, open the pipe with format detection
//!    enabled and start the stream.
//! 5. Poll the session until a handler records a result or the timeout
//!    elapses.
//! 6. Stop the stream, detach the callback and decode the result through the
//!    [`ModeCatalog`].
//!
//! The callback runs on the device's notification thread, concurrently with
//! step 5. Timeout is the only way to cancel the wait.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use modeprobe::detector::FormatDetector;
//! use modeprobe::device::{AudioConnection, DisplayModeId, VideoConnection};
//! use modeprobe::sim::SimulatedDevice;
//!
//! let device = SimulatedDevice::new("Simulated 8K Pro")
//!     .with_modes([DisplayModeId::new(b"Hp29")])
//!     .with_format_change(Duration::from_millis(20), DisplayModeId::new(b"Hp59"));
//!
//! let mut detector = FormatDetector::new(Arc::new(device));
//! let mode = detector.detect(
//!     VideoConnection::Sdi,
//!     AudioConnection::Embedded,
//!     Duration::from_secs(2),
//! )?;
//! assert_eq!(mode.name(), "bmdModeHD1080p5994");
//! assert_eq!((mode.width(), mode.height()), (1920, 1080));
//! # Ok::<(), modeprobe::Error>(())
//! ```

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::catalog::{ApiVersion, ModeCatalog, ModeDescriptor};
use crate::device::{
    AudioConnection, CaptureDevice, DisplayModeId, PixelFormat, VideoConnection, VideoInputFlags,
};
use crate::session::DetectionSession;
use crate::Error;

/// Default bound on [`FormatDetector::await_resolution`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Default interval between completion checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Detector settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorConfig {
    timeout: Duration,
    poll_interval: Duration,
    pixel_format: PixelFormat,
    api_version: ApiVersion,
}

impl DetectorConfig {
    pub fn with_timeout(self, timeout: Duration) -> DetectorConfig {
        DetectorConfig { timeout, ..self }
    }

    /// Poll interval; zero is raised to one millisecond.
    pub fn with_poll_interval(self, poll_interval: Duration) -> DetectorConfig {
        DetectorConfig {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            ..self
        }
    }

    pub fn with_pixel_format(self, pixel_format: PixelFormat) -> DetectorConfig {
        DetectorConfig {
            pixel_format,
            ..self
        }
    }

    /// Driver API version the mode catalog is built for.
    pub fn with_api_version(self, api_version: ApiVersion) -> DetectorConfig {
        DetectorConfig {
            api_version,
            ..self
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }
}

impl Default for DetectorConfig {
    fn default() -> DetectorConfig {
        DetectorConfig {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            pixel_format: PixelFormat::default(),
            api_version: ApiVersion::default(),
        }
    }
}

/// Result of waiting on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A handler recorded this mode.
    Resolved(DisplayModeId),
    /// Nothing was recorded within the timeout.
    TimedOut,
    /// The stream ended before anything was recorded.
    NoSignal,
}

/// Drives input format detection on one device.
///
/// A detector owns a shared handle to its device and at most one session at a
/// time. Dropping the detector stops a running stream and detaches the
/// callback.
pub struct FormatDetector {
    device: Arc<dyn CaptureDevice>,
    catalog: ModeCatalog,
    config: DetectorConfig,
    video: VideoConnection,
    audio: AudioConnection,
    session: Option<DetectionSession>,
    callback_registered: bool,
    input_enabled: bool,
    streaming: bool,
}

impl FormatDetector {
    /// Create a detector with default settings.
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        Self::with_config(device, DetectorConfig::default())
    }

    pub fn with_config(device: Arc<dyn CaptureDevice>, config: DetectorConfig) -> Self {
        Self {
            device,
            catalog: ModeCatalog::new(config.api_version()),
            config,
            video: VideoConnection::Unchanged,
            audio: AudioConnection::Unchanged,
            session: None,
            callback_registered: false,
            input_enabled: false,
            streaming: false,
        }
    }

    pub fn device(&self) -> &Arc<dyn CaptureDevice> {
        &self.device
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ModeCatalog {
        &self.catalog
    }

    /// The current session, if one was started and not yet torn down.
    pub fn session(&self) -> Option<&DetectionSession> {
        self.session.as_ref()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Run a complete detection attempt.
    ///
    /// The session is torn down before returning, whatever the outcome.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedDevice`] if the device cannot detect input
    ///   formats; nothing is configured in that case
    /// - [`Error::Configuration`] if an explicitly requested connector is rejected
    /// - [`Error::NoModesAvailable`] if the device enumerates no display modes
    /// - [`Error::StreamStart`] / [`Error::StreamStop`] if the pipe cannot be
    ///   opened or closed
    /// - [`Error::TimedOut`] if nothing was resolved within `timeout`
    /// - [`Error::NoSignal`] if the stream ended without a usable event
    /// - [`Error::UnknownMode`] if the resolved mode is not in the catalog
    pub fn detect(
        &mut self,
        video: VideoConnection,
        audio: AudioConnection,
        timeout: Duration,
    ) -> Result<ModeDescriptor, Error> {
        log::debug!(
            "detecting input format on {} (video {}, audio {}, timeout {:?})",
            self.device.display_name(),
            video,
            audio,
            timeout
        );

        let result = self.run_detection(video, audio, timeout);

        if let Err(err) = self.stop_detection() {
            log::warn!("teardown after failed detection: {}", err);
        }
        if let Some(session) = self.session.take() {
            let (frames, no_signal) = session.frame_counts();
            log::debug!(
                "session ended: {} frames ({} without input source), captured {:?}",
                frames,
                no_signal,
                session.captured().map(|d| d.name())
            );
        }

        result
    }

    /// [`detect`](Self::detect) bounded by the configured timeout.
    pub fn detect_configured(
        &mut self,
        video: VideoConnection,
        audio: AudioConnection,
    ) -> Result<ModeDescriptor, Error> {
        let timeout = self.config.timeout();
        self.detect(video, audio, timeout)
    }

    fn run_detection(
        &mut self,
        video: VideoConnection,
        audio: AudioConnection,
        timeout: Duration,
    ) -> Result<ModeDescriptor, Error> {
        self.check_support()?;
        self.configure_routing(video, audio)?;
        self.select_provisional_mode()?;
        self.start_detection()?;

        let outcome = self.await_resolution(timeout);
        self.stop_detection()?;

        let descriptor = match outcome {
            Outcome::Resolved(mode) => self.describe(mode)?,
            Outcome::TimedOut => return Err(Error::TimedOut(timeout)),
            Outcome::NoSignal => return Err(Error::NoSignal),
        };

        log::info!("{}: {}", self.device.display_name(), descriptor);
        if let Some(session) = self.session.as_mut() {
            session.capture(descriptor.clone());
        }
        Ok(descriptor)
    }

    /// Fail with [`Error::UnsupportedDevice`] unless the device supports
    /// input format detection.
    pub fn check_support(&self) -> Result<(), Error> {
        if self.device.supports_input_format_detection()? {
            Ok(())
        } else {
            Err(Error::UnsupportedDevice(self.device.display_name()))
        }
    }

    /// Apply the connector selection, audio first then video.
    ///
    /// `Unchanged` connectors are not sent to the device.
    pub fn configure_routing(
        &mut self,
        video: VideoConnection,
        audio: AudioConnection,
    ) -> Result<(), Error> {
        if audio == AudioConnection::Unchanged {
            log::debug!("leaving audio input routing unchanged");
        } else {
            self.device
                .set_audio_input_connection(audio)
                .map_err(|source| Error::Configuration {
                    setting: "audio input connection",
                    value: audio.name(),
                    source,
                })?;
            log::debug!("audio input routed to {}", audio);
        }

        if video == VideoConnection::Unchanged {
            log::debug!("leaving video input routing unchanged");
        } else {
            self.device
                .set_video_input_connection(video)
                .map_err(|source| Error::Configuration {
                    setting: "video input connection",
                    value: video.name(),
                    source,
                })?;
            log::debug!("video input routed to {}", video);
        }

        self.video = video;
        self.audio = audio;
        Ok(())
    }

    /// Select the first enumerable display mode and open a new session with it.
    ///
    /// Any previous session is stopped and dropped.
    pub fn select_provisional_mode(&mut self) -> Result<DisplayModeId, Error> {
        self.stop_detection()?;
        self.session = None;

        let provisional = {
            let mut modes = self.device.display_modes()?;
            modes.next().ok_or(Error::NoModesAvailable)?
        };

        log::debug!("provisional mode {}", provisional);
        self.session = Some(DetectionSession::new(self.video, self.audio, provisional));
        Ok(provisional)
    }

    /// Register the session callback, open the input pipe with format
    /// detection enabled and start the stream.
    ///
    /// Opens a fresh session first if there is none or the current one was
    /// already sealed.
    pub fn start_detection(&mut self) -> Result<(), Error> {
        let stale = self
            .session
            .as_ref()
            .map_or(true, |session| session.state().is_sealed());
        if stale {
            self.select_provisional_mode()?;
        }

        let (provisional, callback) = match self.session.as_ref() {
            Some(session) => (session.provisional_mode(), session.callback()),
            None => return Err(Error::NoModesAvailable),
        };

        self.device.set_callback(Some(callback))?;
        self.callback_registered = true;

        if let Err(err) = self.device.enable_video_input(
            provisional,
            self.config.pixel_format(),
            VideoInputFlags::ENABLE_FORMAT_DETECTION,
        ) {
            self.release_pipe();
            return Err(Error::StreamStart(err));
        }
        self.input_enabled = true;

        if let Err(err) = self.device.start_streams() {
            self.release_pipe();
            return Err(Error::StreamStart(err));
        }
        self.streaming = true;

        log::debug!(
            "stream started on {} with provisional mode {}",
            self.device.display_name(),
            provisional
        );
        Ok(())
    }

    /// Block until the session resolves, the stream ends, or `timeout` elapses.
    ///
    /// Checks the session every poll interval. The session is sealed on
    /// return, so later notifications cannot change the result.
    pub fn await_resolution(&self, timeout: Duration) -> Outcome {
        let Some(session) = self.session.as_ref() else {
            log::warn!("await_resolution called without a session");
            return Outcome::NoSignal;
        };
        let state = session.state();
        let start = Instant::now();

        loop {
            if state.is_completed() {
                if let Some((mode, provenance)) = state.seal() {
                    log::debug!(
                        "resolved to {} via {:?} after {:?}",
                        mode,
                        provenance,
                        start.elapsed()
                    );
                    return Outcome::Resolved(mode);
                }
            }

            if self.streaming && self.device.input_stream_ended() {
                return match state.seal() {
                    Some((mode, _)) => Outcome::Resolved(mode),
                    None => {
                        log::debug!("input stream ended without a usable event");
                        Outcome::NoSignal
                    }
                };
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return match state.seal() {
                    Some((mode, _)) => Outcome::Resolved(mode),
                    None => {
                        let (frames, no_signal) = state.frame_counts();
                        log::debug!(
                            "timed out after {:?} ({} frames, {} without input source)",
                            elapsed,
                            frames,
                            no_signal
                        );
                        Outcome::TimedOut
                    }
                };
            }

            thread::sleep(self.config.poll_interval().min(timeout - elapsed));
        }
    }

    /// Stop the stream, close the input pipe and detach the callback.
    ///
    /// Idempotent. Seals the current session.
    pub fn stop_detection(&mut self) -> Result<(), Error> {
        if let Some(session) = self.session.as_ref() {
            session.state().seal();
        }

        let mut result = Ok(());
        if self.streaming {
            self.streaming = false;
            match self.device.stop_streams() {
                Ok(()) => log::debug!("stream stopped on {}", self.device.display_name()),
                Err(err) => result = Err(Error::StreamStop(err)),
            }
        }
        self.release_pipe();
        result
    }

    /// Describe a mode using this detector's catalog and device.
    pub fn describe(&self, mode: DisplayModeId) -> Result<ModeDescriptor, Error> {
        self.catalog.describe(mode, self.device.as_ref())
    }

    fn release_pipe(&mut self) {
        if self.input_enabled {
            self.input_enabled = false;
            if let Err(err) = self.device.disable_video_input() {
                log::warn!("{}", err);
            }
        }
        if self.callback_registered {
            self.callback_registered = false;
            if let Err(err) = self.device.set_callback(None) {
                log::warn!("{}", err);
            }
        }
    }
}

impl Drop for FormatDetector {
    fn drop(&mut self) {
        if let Err(err) = self.stop_detection() {
            log::warn!("stopping detection on drop: {}", err);
        }
    }
}
