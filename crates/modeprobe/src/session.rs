// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Detection session state shared with the device notification thread.
//!
//! A [`DetectionSession`] covers one detection attempt against one device
//! input. Its result slot is written only by [`SessionCallback`], which the
//! device invokes from its own thread, and read by the caller's poll loop.
//!
//! Recording rules:
//!
//! - A frame without the "no input source" flag records the provisional mode,
//!   but only into an empty slot.
//! - A format change always records its mode, replacing a frame-derived match
//!   or an earlier format change. The device's latest re-detection wins.
//! - The completion flag is raised by the first recording and never lowered.
//! - Once the caller seals the slot (on observing completion, on timeout, or
//!   at stream stop), nothing is recorded anymore.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::catalog::ModeDescriptor;
use crate::device::{
    AudioConnection, DisplayModeId, FormatChangedEvents, InputCallback, InputFrame,
    VideoConnection,
};

/// Where a recorded result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// A valid frame arrived without a format change: the provisional mode matched.
    FrameArrival,
    /// The detection hardware reported the mode explicitly.
    FormatChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Recorded {
    mode: DisplayModeId,
    provenance: Provenance,
}

#[derive(Debug, Default)]
struct Slot {
    recorded: Option<Recorded>,
    sealed: bool,
}

/// State visible to both the caller and the notification thread.
#[derive(Debug)]
pub(crate) struct SessionState {
    provisional: DisplayModeId,
    slot: Mutex<Slot>,
    completed: AtomicBool,
    frames: AtomicU64,
    no_signal_frames: AtomicU64,
}

impl SessionState {
    fn new(provisional: DisplayModeId) -> Self {
        Self {
            provisional,
            slot: Mutex::new(Slot::default()),
            completed: AtomicBool::new(false),
            frames: AtomicU64::new(0),
            no_signal_frames: AtomicU64::new(0),
        }
    }

    // Poisoning is ignored: every write to the slot is a single assignment.
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn on_frame(&self, frame: &InputFrame) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        if frame.has_no_input_source() {
            self.no_signal_frames.fetch_add(1, Ordering::Relaxed);
            log::trace!("frame without input source, still waiting");
            return;
        }

        let mut slot = self.slot();
        if slot.sealed {
            log::trace!("frame arrived after session was sealed, ignored");
            return;
        }
        if slot.recorded.is_none() {
            log::debug!(
                "valid frame arrived, input matches provisional mode {}",
                self.provisional
            );
            slot.recorded = Some(Recorded {
                mode: self.provisional,
                provenance: Provenance::FrameArrival,
            });
            self.completed.store(true, Ordering::Release);
        }
    }

    fn on_format_changed(&self, events: FormatChangedEvents, mode: DisplayModeId) {
        let mut slot = self.slot();
        if slot.sealed {
            log::warn!(
                "format change to {} arrived after session was sealed, ignored",
                mode
            );
            return;
        }
        match slot.recorded {
            Some(previous) => log::debug!(
                "format change to {} (events 0x{:x}) replaces {:?} result {}",
                mode,
                events.bits(),
                previous.provenance,
                previous.mode
            ),
            None => log::debug!("format change to {} (events 0x{:x})", mode, events.bits()),
        }
        slot.recorded = Some(Recorded {
            mode,
            provenance: Provenance::FormatChange,
        });
        self.completed.store(true, Ordering::Release);
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Seal the slot and return what it holds.
    pub(crate) fn seal(&self) -> Option<(DisplayModeId, Provenance)> {
        let mut slot = self.slot();
        slot.sealed = true;
        slot.recorded.map(|r| (r.mode, r.provenance))
    }

    pub(crate) fn is_sealed(&self) -> bool {
        self.slot().sealed
    }

    pub(crate) fn frame_counts(&self) -> (u64, u64) {
        (
            self.frames.load(Ordering::Relaxed),
            self.no_signal_frames.load(Ordering::Relaxed),
        )
    }
}

/// Notification handler bound to one session.
///
/// Constructed per session, registered with the device at stream start and
/// detached at stop.
#[derive(Debug, Clone)]
pub struct SessionCallback {
    state: Arc<SessionState>,
}

impl InputCallback for SessionCallback {
    fn frame_arrived(&self, frame: &InputFrame) {
        self.state.on_frame(frame);
    }

    fn format_changed(&self, events: FormatChangedEvents, mode: DisplayModeId) {
        self.state.on_format_changed(events, mode);
    }
}

/// One detection attempt against one device input.
#[derive(Debug)]
pub struct DetectionSession {
    video: VideoConnection,
    audio: AudioConnection,
    state: Arc<SessionState>,
    captured: Option<ModeDescriptor>,
}

impl DetectionSession {
    /// Start a session that opened the input pipe with `provisional`.
    pub fn new(video: VideoConnection, audio: AudioConnection, provisional: DisplayModeId) -> Self {
        Self {
            video,
            audio,
            state: Arc::new(SessionState::new(provisional)),
            captured: None,
        }
    }

    /// A fresh handler writing into this session.
    pub fn callback(&self) -> Arc<dyn InputCallback> {
        Arc::new(SessionCallback {
            state: Arc::clone(&self.state),
        })
    }

    pub fn video_connection(&self) -> VideoConnection {
        self.video
    }

    pub fn audio_connection(&self) -> AudioConnection {
        self.audio
    }

    pub fn provisional_mode(&self) -> DisplayModeId {
        self.state.provisional
    }

    /// Whether a handler has recorded a result.
    pub fn is_completed(&self) -> bool {
        self.state.is_completed()
    }

    /// Peek at the recorded result without sealing.
    ///
    /// `None` until [`is_completed`](Self::is_completed) returns `true`.
    pub fn result(&self) -> Option<(DisplayModeId, Provenance)> {
        if !self.state.is_completed() {
            return None;
        }
        self.state.slot().recorded.map(|r| (r.mode, r.provenance))
    }

    /// Total frames seen and how many of them carried no input source.
    pub fn frame_counts(&self) -> (u64, u64) {
        self.state.frame_counts()
    }

    /// Descriptor retained for the resolved mode, if any.
    pub fn captured(&self) -> Option<&ModeDescriptor> {
        self.captured.as_ref()
    }

    pub(crate) fn state(&self) -> &SessionState {
        &self.state
    }

    pub(crate) fn capture(&mut self, descriptor: ModeDescriptor) {
        self.captured = Some(descriptor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use std::thread;

    const PROVISIONAL: DisplayModeId = DisplayModeId::new(b"Hp29");
    const DETECTED: DisplayModeId = DisplayModeId::new(b"Hp59");

    fn session() -> DetectionSession {
        DetectionSession::new(VideoConnection::Sdi, AudioConnection::Embedded, PROVISIONAL)
    }

    #[test]
    fn starts_unresolved() {
        let s = session();
        assert!(!s.is_completed());
        assert_eq!(s.result(), None);
        assert_eq!(s.provisional_mode(), PROVISIONAL);
        assert_eq!(s.video_connection(), VideoConnection::Sdi);
        assert_eq!(s.audio_connection(), AudioConnection::Embedded);
    }

    #[test]
    fn no_signal_frames_leave_session_unresolved() {
        let s = session();
        let cb = s.callback();
        for _ in 0..10 {
            cb.frame_arrived(&InputFrame::without_signal());
        }
        assert!(!s.is_completed());
        assert_eq!(s.result(), None);
        assert_eq!(s.frame_counts(), (10, 10));
    }

    #[test]
    fn valid_frame_resolves_to_provisional() {
        let s = session();
        let cb = s.callback();
        cb.frame_arrived(&InputFrame::with_signal());
        assert!(s.is_completed());
        assert_eq!(s.result(), Some((PROVISIONAL, Provenance::FrameArrival)));
    }

    #[test]
    fn format_change_overrides_frame() {
        let s = session();
        let cb = s.callback();
        cb.frame_arrived(&InputFrame::with_signal());
        cb.format_changed(FormatChangedEvents::DISPLAY_MODE_CHANGED, DETECTED);
        cb.frame_arrived(&InputFrame::with_signal());
        assert_eq!(s.result(), Some((DETECTED, Provenance::FormatChange)));
    }

    #[test]
    fn latest_format_change_wins_until_sealed() {
        let s = session();
        let cb = s.callback();
        let redetected = DisplayModeId::new(b"Hi59");
        cb.format_changed(FormatChangedEvents::DISPLAY_MODE_CHANGED, DETECTED);
        cb.format_changed(FormatChangedEvents::DISPLAY_MODE_CHANGED, redetected);
        assert_eq!(s.result(), Some((redetected, Provenance::FormatChange)));

        assert_eq!(
            s.state().seal(),
            Some((redetected, Provenance::FormatChange))
        );
        cb.format_changed(FormatChangedEvents::DISPLAY_MODE_CHANGED, DETECTED);
        assert_eq!(s.result(), Some((redetected, Provenance::FormatChange)));
    }

    #[test]
    fn sealed_slot_is_frozen() {
        let s = session();
        let cb = s.callback();
        cb.frame_arrived(&InputFrame::with_signal());
        assert_eq!(
            s.state().seal(),
            Some((PROVISIONAL, Provenance::FrameArrival))
        );
        cb.format_changed(FormatChangedEvents::DISPLAY_MODE_CHANGED, DETECTED);
        assert_eq!(s.result(), Some((PROVISIONAL, Provenance::FrameArrival)));
        assert!(s.state().is_sealed());
    }

    #[test]
    fn sealing_empty_slot_blocks_late_results() {
        let s = session();
        let cb = s.callback();
        assert_eq!(s.state().seal(), None);
        cb.frame_arrived(&InputFrame::with_signal());
        cb.format_changed(FormatChangedEvents::DISPLAY_MODE_CHANGED, DETECTED);
        assert!(!s.is_completed());
        assert_eq!(s.result(), None);
    }

    #[test]
    fn format_change_wins_in_any_order() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let s = session();
            let cb = s.callback();
            let mut events: Vec<Option<InputFrame>> = vec![
                Some(InputFrame::with_signal()),
                Some(InputFrame::without_signal()),
                Some(InputFrame::with_signal()),
                None,
            ];
            events.shuffle(&mut rng);
            for event in events {
                match event {
                    Some(frame) => cb.frame_arrived(&frame),
                    None => cb.format_changed(FormatChangedEvents::DISPLAY_MODE_CHANGED, DETECTED),
                }
            }
            assert_eq!(s.result(), Some((DETECTED, Provenance::FormatChange)));
        }
    }

    #[test]
    fn concurrent_handlers_settle_on_format_change() {
        for _ in 0..50 {
            let s = session();
            let frames = s.callback();
            let change = s.callback();

            let a = thread::spawn(move || {
                for _ in 0..100 {
                    frames.frame_arrived(&InputFrame::with_signal());
                }
            });
            let b = thread::spawn(move || {
                change.format_changed(FormatChangedEvents::DISPLAY_MODE_CHANGED, DETECTED);
            });
            a.join().unwrap();
            b.join().unwrap();

            assert!(s.is_completed());
            assert_eq!(s.result(), Some((DETECTED, Provenance::FormatChange)));
        }
    }
}
