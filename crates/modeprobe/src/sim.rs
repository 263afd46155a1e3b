// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Scripted capture device
//!
//! [`SimulatedDevice`] implements [`CaptureDevice`] without hardware. Once
//! its stream is started it spawns a notification thread that replays a
//! script of timed events (frames, format changes, end of stream) into the
//! registered [`InputCallback`], the way a driver runtime would.
//!
//! The device also records every call made on it ([`DeviceCall`]) so tests
//! can check what was configured, and can be told to reject connectors or
//! refuse to start or stop.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use modeprobe::device::{DisplayModeId, InputFrame};
//! use modeprobe::sim::SimulatedDevice;
//!
//! // Two seconds of "no input source" frames at roughly 30 fps.
//! let idle = SimulatedDevice::new("idle input")
//!     .with_frame_train(InputFrame::without_signal(), Duration::from_millis(33), Duration::from_secs(2));
//!
//! // Signal shows up after 50 ms as 1080p59.94.
//! let live = SimulatedDevice::new("live input")
//!     .with_modes([DisplayModeId::new(b"Hp29")])
//!     .with_format_change(Duration::from_millis(50), DisplayModeId::new(b"Hp59"));
//! # let _ = (idle, live);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::device::{
    AudioConnection, CaptureDevice, DeviceError, DisplayModeId, DisplayModeIter, FieldDominance,
    FormatChangedEvents, FrameRate, InputCallback, InputFrame, ModeFacts, PixelFormat,
    VideoConnection, VideoInputFlags,
};

/// Longest sleep of the notification thread between stop checks.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(5);

/// Something the simulated runtime delivers to the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    Frame(InputFrame),
    FormatChanged(DisplayModeId),
    /// The stream ends on its own; later events are not delivered.
    EndOfStream,
}

/// A call made on a [`SimulatedDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCall {
    QueryFormatDetection,
    SetVideoConnection(VideoConnection),
    SetAudioConnection(AudioConnection),
    EnumerateModes,
    ModeFacts(DisplayModeId),
    /// `true` when a callback was registered, `false` when detached.
    SetCallback(bool),
    EnableVideoInput(DisplayModeId, PixelFormat, VideoInputFlags),
    DisableVideoInput,
    StartStreams,
    StopStreams,
}

#[derive(Default)]
struct Shared {
    callback: Mutex<Option<Arc<dyn InputCallback>>>,
    stop: AtomicBool,
    ended: AtomicBool,
}

#[derive(Default)]
struct Pipe {
    input_enabled: bool,
    runner: Option<JoinHandle<()>>,
}

/// Capture device driven by a script instead of hardware.
pub struct SimulatedDevice {
    name: String,
    format_detection: bool,
    modes: Vec<DisplayModeId>,
    facts: HashMap<DisplayModeId, ModeFacts>,
    rejected_video: Vec<VideoConnection>,
    rejected_audio: Vec<AudioConnection>,
    start_failure: Option<DeviceError>,
    stop_failure: Option<DeviceError>,
    script: Vec<(Duration, SimEvent)>,
    shared: Arc<Shared>,
    pipe: Mutex<Pipe>,
    calls: Mutex<Vec<DeviceCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimulatedDevice {
    /// A device that supports format detection, enumerates every mode of
    /// [`nominal_modes`] and never delivers an event.
    pub fn new(name: &str) -> SimulatedDevice {
        SimulatedDevice {
            name: name.to_owned(),
            format_detection: true,
            modes: nominal_modes(),
            facts: HashMap::new(),
            rejected_video: Vec::new(),
            rejected_audio: Vec::new(),
            start_failure: None,
            stop_failure: None,
            script: Vec::new(),
            shared: Arc::new(Shared::default()),
            pipe: Mutex::new(Pipe::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_format_detection(mut self, supported: bool) -> SimulatedDevice {
        self.format_detection = supported;
        self
    }

    /// Replace the enumerated modes, in order.
    pub fn with_modes<I>(mut self, modes: I) -> SimulatedDevice
    where
        I: IntoIterator<Item = DisplayModeId>,
    {
        self.modes = modes.into_iter().collect();
        self
    }

    /// Report `facts` for `mode` instead of the nominal ones.
    pub fn with_mode_facts(mut self, mode: DisplayModeId, facts: ModeFacts) -> SimulatedDevice {
        self.facts.insert(mode, facts);
        self
    }

    pub fn with_rejected_video(mut self, connection: VideoConnection) -> SimulatedDevice {
        self.rejected_video.push(connection);
        self
    }

    pub fn with_rejected_audio(mut self, connection: AudioConnection) -> SimulatedDevice {
        self.rejected_audio.push(connection);
        self
    }

    pub fn with_start_failure(mut self, err: DeviceError) -> SimulatedDevice {
        self.start_failure = Some(err);
        self
    }

    pub fn with_stop_failure(mut self, err: DeviceError) -> SimulatedDevice {
        self.stop_failure = Some(err);
        self
    }

    /// Deliver `event` at `at` after stream start.
    pub fn with_event(mut self, at: Duration, event: SimEvent) -> SimulatedDevice {
        self.script.push((at, event));
        self.script.sort_by_key(|(at, _)| *at);
        self
    }

    pub fn with_frame(self, at: Duration, frame: InputFrame) -> SimulatedDevice {
        self.with_event(at, SimEvent::Frame(frame))
    }

    pub fn with_format_change(self, at: Duration, mode: DisplayModeId) -> SimulatedDevice {
        self.with_event(at, SimEvent::FormatChanged(mode))
    }

    pub fn with_end_of_stream(self, at: Duration) -> SimulatedDevice {
        self.with_event(at, SimEvent::EndOfStream)
    }

    /// Deliver `frame` every `interval`, starting one interval after stream
    /// start and up to `span`.
    pub fn with_frame_train(
        mut self,
        frame: InputFrame,
        interval: Duration,
        span: Duration,
    ) -> SimulatedDevice {
        if interval.is_zero() {
            return self;
        }
        let mut at = interval;
        while at <= span {
            self.script.push((at, SimEvent::Frame(frame)));
            at += interval;
        }
        self.script.sort_by_key(|(at, _)| *at);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calls made so far, oldest first.
    pub fn calls(&self) -> Vec<DeviceCall> {
        lock(&self.calls).clone()
    }

    /// Whether the notification thread is running.
    pub fn is_streaming(&self) -> bool {
        lock(&self.pipe).runner.is_some()
    }

    /// Whether a callback is currently registered.
    pub fn has_callback(&self) -> bool {
        lock(&self.shared.callback).is_some()
    }

    fn record(&self, call: DeviceCall) {
        lock(&self.calls).push(call);
    }

    fn halt(&self, pipe: &mut Pipe) {
        if let Some(runner) = pipe.runner.take() {
            self.shared.stop.store(true, Ordering::Release);
            if runner.join().is_err() {
                log::warn!("{}: notification thread panicked", self.name);
            }
        }
    }
}

fn run_script(name: String, shared: Arc<Shared>, script: Vec<(Duration, SimEvent)>) {
    let start = Instant::now();
    for (at, event) in script {
        loop {
            if shared.stop.load(Ordering::Acquire) {
                return;
            }
            let elapsed = start.elapsed();
            if elapsed >= at {
                break;
            }
            thread::sleep((at - elapsed).min(STOP_CHECK_INTERVAL));
        }

        let callback = lock(&shared.callback).clone();
        match event {
            SimEvent::EndOfStream => {
                log::debug!("{}: stream ended", name);
                shared.ended.store(true, Ordering::Release);
                return;
            }
            SimEvent::Frame(frame) => {
                if let Some(callback) = callback {
                    callback.frame_arrived(&frame);
                }
            }
            SimEvent::FormatChanged(mode) => {
                if let Some(callback) = callback {
                    callback.format_changed(FormatChangedEvents::DISPLAY_MODE_CHANGED, mode);
                }
            }
        }
    }
}

impl CaptureDevice for SimulatedDevice {
    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn supports_input_format_detection(&self) -> Result<bool, DeviceError> {
        self.record(DeviceCall::QueryFormatDetection);
        Ok(self.format_detection)
    }

    fn set_video_input_connection(&self, connection: VideoConnection) -> Result<(), DeviceError> {
        self.record(DeviceCall::SetVideoConnection(connection));
        if self.rejected_video.contains(&connection) {
            return Err(DeviceError::new(
                "SetInt(VideoInputConnection)",
                DeviceError::E_INVALIDARG,
            ));
        }
        Ok(())
    }

    fn set_audio_input_connection(&self, connection: AudioConnection) -> Result<(), DeviceError> {
        self.record(DeviceCall::SetAudioConnection(connection));
        if self.rejected_audio.contains(&connection) {
            return Err(DeviceError::new(
                "SetInt(AudioInputConnection)",
                DeviceError::E_INVALIDARG,
            ));
        }
        Ok(())
    }

    fn display_modes(&self) -> Result<DisplayModeIter<'_>, DeviceError> {
        self.record(DeviceCall::EnumerateModes);
        Ok(Box::new(self.modes.iter().copied()))
    }

    fn mode_facts(&self, mode: DisplayModeId) -> Result<ModeFacts, DeviceError> {
        self.record(DeviceCall::ModeFacts(mode));
        self.facts
            .get(&mode)
            .copied()
            .or_else(|| nominal_facts(mode))
            .ok_or(DeviceError::new("GetDisplayMode", DeviceError::E_INVALIDARG))
    }

    fn set_callback(&self, callback: Option<Arc<dyn InputCallback>>) -> Result<(), DeviceError> {
        self.record(DeviceCall::SetCallback(callback.is_some()));
        *lock(&self.shared.callback) = callback;
        Ok(())
    }

    fn enable_video_input(
        &self,
        mode: DisplayModeId,
        format: PixelFormat,
        flags: VideoInputFlags,
    ) -> Result<(), DeviceError> {
        self.record(DeviceCall::EnableVideoInput(mode, format, flags));
        if !self.modes.contains(&mode) {
            return Err(DeviceError::new("EnableVideoInput", DeviceError::E_INVALIDARG));
        }
        lock(&self.pipe).input_enabled = true;
        Ok(())
    }

    fn disable_video_input(&self) -> Result<(), DeviceError> {
        self.record(DeviceCall::DisableVideoInput);
        lock(&self.pipe).input_enabled = false;
        Ok(())
    }

    fn start_streams(&self) -> Result<(), DeviceError> {
        self.record(DeviceCall::StartStreams);
        if let Some(err) = &self.start_failure {
            return Err(err.clone());
        }

        let mut pipe = lock(&self.pipe);
        if !pipe.input_enabled {
            return Err(DeviceError::failed("StartStreams"));
        }
        if pipe.runner.is_some() {
            return Err(DeviceError::new("StartStreams", DeviceError::E_ACCESSDENIED));
        }

        self.shared.stop.store(false, Ordering::Release);
        self.shared.ended.store(false, Ordering::Release);

        let name = self.name.clone();
        let shared = Arc::clone(&self.shared);
        let script = self.script.clone();
        let runner = thread::Builder::new()
            .name(format!("sim-notify-{}", self.name))
            .spawn(move || run_script(name, shared, script))
            .map_err(|_| DeviceError::failed("StartStreams"))?;
        pipe.runner = Some(runner);
        Ok(())
    }

    fn stop_streams(&self) -> Result<(), DeviceError> {
        self.record(DeviceCall::StopStreams);
        let mut pipe = lock(&self.pipe);
        self.halt(&mut pipe);
        match &self.stop_failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn input_stream_ended(&self) -> bool {
        self.shared.ended.load(Ordering::Acquire)
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        let mut pipe = lock(&self.pipe);
        self.halt(&mut pipe);
    }
}

const P: FieldDominance = FieldDominance::ProgressiveFrame;
const PSF: FieldDominance = FieldDominance::ProgressiveSegmentedFrame;
const LFF: FieldDominance = FieldDominance::LowerFieldFirst;
const UFF: FieldDominance = FieldDominance::UpperFieldFirst;

const fn nominal(
    id: &[u8; 4],
    width: u32,
    height: u32,
    num: i64,
    den: i64,
    field_dominance: FieldDominance,
) -> (DisplayModeId, ModeFacts) {
    (
        DisplayModeId::new(id),
        ModeFacts {
            width,
            height,
            frame_rate: FrameRate::new(num, den),
            field_dominance,
        },
    )
}

static NOMINAL: [(DisplayModeId, ModeFacts); 36] = [
    nominal(b"ntsc", 720, 486, 30000, 1001, LFF),
    nominal(b"nt23", 720, 486, 24000, 1001, LFF),
    nominal(b"pal ", 720, 576, 25, 1, UFF),
    nominal(b"ntsp", 720, 486, 60000, 1001, P),
    nominal(b"palp", 720, 576, 50, 1, P),
    nominal(b"23ps", 1920, 1080, 24000, 1001, P),
    nominal(b"24ps", 1920, 1080, 24, 1, P),
    nominal(b"Hp25", 1920, 1080, 25, 1, P),
    nominal(b"Hp29", 1920, 1080, 30000, 1001, P),
    nominal(b"Hp30", 1920, 1080, 30, 1, P),
    nominal(b"Hi50", 1920, 1080, 25, 1, UFF),
    nominal(b"Hi59", 1920, 1080, 30000, 1001, UFF),
    nominal(b"Hi60", 1920, 1080, 30, 1, UFF),
    nominal(b"Hp50", 1920, 1080, 50, 1, P),
    nominal(b"Hp59", 1920, 1080, 60000, 1001, P),
    nominal(b"Hp60", 1920, 1080, 60, 1, P),
    nominal(b"hp50", 1280, 720, 50, 1, P),
    nominal(b"hp59", 1280, 720, 60000, 1001, P),
    nominal(b"hp60", 1280, 720, 60, 1, P),
    nominal(b"2k23", 2048, 1556, 24000, 1001, PSF),
    nominal(b"2k24", 2048, 1556, 24, 1, PSF),
    nominal(b"2k25", 2048, 1556, 25, 1, PSF),
    nominal(b"2d23", 2048, 1080, 24000, 1001, P),
    nominal(b"2d24", 2048, 1080, 24, 1, P),
    nominal(b"2d25", 2048, 1080, 25, 1, P),
    nominal(b"4k23", 3840, 2160, 24000, 1001, P),
    nominal(b"4k24", 3840, 2160, 24, 1, P),
    nominal(b"4k25", 3840, 2160, 25, 1, P),
    nominal(b"4k29", 3840, 2160, 30000, 1001, P),
    nominal(b"4k30", 3840, 2160, 30, 1, P),
    nominal(b"4k50", 3840, 2160, 50, 1, P),
    nominal(b"4k59", 3840, 2160, 60000, 1001, P),
    nominal(b"4k60", 3840, 2160, 60, 1, P),
    nominal(b"4d23", 4096, 2160, 24000, 1001, P),
    nominal(b"4d24", 4096, 2160, 24, 1, P),
    nominal(b"4d25", 4096, 2160, 25, 1, P),
];

/// Modes a simulated device enumerates by default, SD first.
pub fn nominal_modes() -> Vec<DisplayModeId> {
    NOMINAL.iter().map(|(id, _)| *id).collect()
}

/// Standard geometry, rate and scan structure of a known mode.
pub fn nominal_facts(mode: DisplayModeId) -> Option<ModeFacts> {
    NOMINAL
        .iter()
        .find(|(id, _)| *id == mode)
        .map(|(_, facts)| *facts)
}
