// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// Format Detection Tests
//
// TESTING LAYERS:
//
// Layer 2 (Simulated Device - No hardware required):
//   - Format change resolution against a provisional mode
//   - Frame-only resolution to the provisional mode
//   - Timeout and end-of-stream handling
//   - Capability and routing failures
//   - Session teardown after every outcome
//
// RUN LAYER 2:
//   cargo test --test detection

use modeprobe::detector::{DetectorConfig, FormatDetector, Outcome};
use modeprobe::device::{
    AudioConnection, DisplayModeId, FieldDominance, FrameRate, InputFrame, VideoConnection,
};
use modeprobe::sim::{DeviceCall, SimulatedDevice};
use modeprobe::Error;
use serial_test::serial;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

const HP29: DisplayModeId = DisplayModeId::new(b"Hp29");
const HP59: DisplayModeId = DisplayModeId::new(b"Hp59");

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// =============================================================================
// Layer 2: Simulated Device
// =============================================================================

#[test]
#[serial]
fn test_format_change_resolves_detected_mode() {
    init_logging();
    let device = Arc::new(
        SimulatedDevice::new("DeckLink SDI 4K")
            .with_modes([HP29, HP59])
            .with_frame_train(InputFrame::without_signal(), ms(5), ms(45))
            .with_format_change(ms(50), HP59),
    );
    let mut detector = FormatDetector::new(device.clone());

    let start = Instant::now();
    let mode = detector
        .detect(VideoConnection::Sdi, AudioConnection::Embedded, ms(2000))
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(mode.id(), HP59);
    assert_eq!(mode.code(), 17);
    assert_eq!(mode.name(), "bmdModeHD1080p5994");
    assert_eq!((mode.width(), mode.height()), (1920, 1080));
    assert_eq!(mode.frame_rate(), FrameRate::new(60000, 1001));
    assert_eq!(mode.field_dominance(), FieldDominance::ProgressiveFrame);
    assert!(elapsed < ms(1000), "took {:?}", elapsed);

    // Torn down
    assert!(!device.is_streaming());
    assert!(!device.has_callback());
    assert!(detector.session().is_none());
}

#[test]
#[serial]
fn test_no_signal_times_out() {
    init_logging();
    let device = Arc::new(
        SimulatedDevice::new("DeckLink Mini Recorder").with_frame_train(
            InputFrame::without_signal(),
            ms(20),
            ms(1000),
        ),
    );
    let mut detector = FormatDetector::new(device.clone());

    let start = Instant::now();
    let err = detector
        .detect(VideoConnection::Sdi, AudioConnection::Embedded, ms(300))
        .unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err, Error::TimedOut(t) if t == ms(300)));
    assert!(elapsed >= ms(300));
    assert!(elapsed < ms(1500), "took {:?}", elapsed);
    assert!(!device.is_streaming());
    assert!(device.calls().contains(&DeviceCall::StopStreams));
}

#[test]
fn test_unsupported_device_makes_no_other_calls() {
    let device = Arc::new(SimulatedDevice::new("DeckLink Duo").with_format_detection(false));
    let mut detector = FormatDetector::new(device.clone());

    let err = detector
        .detect(VideoConnection::Sdi, AudioConnection::Embedded, ms(2000))
        .unwrap_err();

    match err {
        Error::UnsupportedDevice(name) => assert_eq!(name, "DeckLink Duo"),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(device.calls(), vec![DeviceCall::QueryFormatDetection]);
}

#[test]
#[serial]
fn test_valid_frame_resolves_provisional_mode() {
    let device = Arc::new(
        SimulatedDevice::new("DeckLink Mini Recorder")
            .with_modes([HP29, HP59])
            .with_frame(ms(10), InputFrame::with_signal()),
    );
    let mut detector = FormatDetector::new(device);

    let mode = detector
        .detect(VideoConnection::Sdi, AudioConnection::Embedded, ms(2000))
        .unwrap();
    assert_eq!(mode.id(), HP29);
    assert_eq!(mode.name(), "bmdModeHD1080p2997");
    assert_eq!(mode.frame_rate(), FrameRate::new(30000, 1001));
}

#[test]
#[serial]
fn test_unknown_mode_is_reported() {
    let odd = DisplayModeId::new(b"iunk");
    let device = Arc::new(
        SimulatedDevice::new("DeckLink Mini Recorder")
            .with_modes([HP29])
            .with_format_change(ms(5), odd),
    );
    let mut detector = FormatDetector::new(device.clone());

    let err = detector
        .detect(VideoConnection::Sdi, AudioConnection::Embedded, ms(2000))
        .unwrap_err();
    assert!(matches!(err, Error::UnknownMode(id) if id == odd));
    assert!(!device.is_streaming());
}

#[test]
#[serial]
fn test_end_of_stream_is_no_signal() {
    init_logging();
    let device = Arc::new(
        SimulatedDevice::new("DeckLink Mini Recorder")
            .with_frame(ms(5), InputFrame::without_signal())
            .with_end_of_stream(ms(20)),
    );
    let mut detector = FormatDetector::new(device);

    let start = Instant::now();
    let err = detector
        .detect(VideoConnection::Sdi, AudioConnection::Embedded, ms(2000))
        .unwrap_err();
    assert!(matches!(err, Error::NoSignal));
    assert!(start.elapsed() < ms(1000));
}

#[test]
#[serial]
fn test_await_returns_promptly_after_completion() {
    let device = Arc::new(
        SimulatedDevice::new("DeckLink Mini Recorder")
            .with_modes([HP29, HP59])
            .with_format_change(ms(30), HP59),
    );
    let config = DetectorConfig::default().with_poll_interval(ms(10));
    let mut detector = FormatDetector::with_config(device, config);

    detector
        .configure_routing(VideoConnection::Sdi, AudioConnection::Embedded)
        .unwrap();
    detector.start_detection().unwrap();

    let start = Instant::now();
    let outcome = detector.await_resolution(ms(2000));
    let elapsed = start.elapsed();
    detector.stop_detection().unwrap();

    assert_eq!(outcome, Outcome::Resolved(HP59));
    // One poll interval of slack plus scheduling noise
    assert!(elapsed < ms(500), "took {:?}", elapsed);
}

#[test]
#[serial]
fn test_late_format_change_cannot_alter_result() {
    init_logging();
    let device = Arc::new(
        SimulatedDevice::new("DeckLink Mini Recorder")
            .with_modes([HP29, HP59])
            .with_frame(ms(5), InputFrame::with_signal())
            .with_format_change(ms(400), HP59),
    );
    let mut detector = FormatDetector::new(device);

    detector.check_support().unwrap();
    detector
        .configure_routing(VideoConnection::Unchanged, AudioConnection::Unchanged)
        .unwrap();
    detector.start_detection().unwrap();
    assert_eq!(detector.await_resolution(ms(2000)), Outcome::Resolved(HP29));

    std::thread::sleep(ms(450));
    let session = detector.session().unwrap();
    assert_eq!(session.result().map(|(mode, _)| mode), Some(HP29));
    detector.stop_detection().unwrap();
}

#[test]
fn test_rejected_connector_fails_before_streaming() {
    let device = Arc::new(
        SimulatedDevice::new("DeckLink Mini Recorder").with_rejected_video(VideoConnection::Hdmi),
    );
    let mut detector = FormatDetector::new(device.clone());

    let err = detector
        .detect(VideoConnection::Hdmi, AudioConnection::Embedded, ms(2000))
        .unwrap_err();
    assert!(matches!(err, Error::Configuration { value: "hdmi", .. }));
    assert!(!device.calls().contains(&DeviceCall::StartStreams));
}

#[test]
#[serial]
fn test_detector_is_reusable() {
    let device = Arc::new(
        SimulatedDevice::new("DeckLink Mini Recorder")
            .with_modes([HP29, HP59])
            .with_format_change(ms(5), HP59),
    );
    let mut detector = FormatDetector::new(device);

    for _ in 0..3 {
        let mode = detector
            .detect(VideoConnection::Sdi, AudioConnection::Embedded, ms(2000))
            .unwrap();
        assert_eq!(mode.id(), HP59);
    }
}
