// This is free and unencumbered software released into the public domain.

use asimov_cameraview_module::shared::{
    AspectRatio, CameraEvent, CameraSelector, CameraSession, CaptureMode, Facing, Rotation,
    SessionState, Severity, Size, Viewport, channel_sink,
    drivers::virtual_camera::{VirtualCamera, VirtualDriver},
};
use std::{
    sync::mpsc::{Receiver, channel},
    time::{Duration, Instant},
};

fn cameras() -> Vec<VirtualCamera> {
    vec![
        VirtualCamera::new(Facing::Back, Rotation::Deg90)
            .with_preview_sizes(&[(32, 24), (64, 48), (64, 36)])
            .with_picture_sizes(&[(96, 72), (128, 96), (128, 72)]),
        VirtualCamera::new(Facing::Front, Rotation::Deg270)
            .with_preview_sizes(&[(32, 24)])
            .with_picture_sizes(&[(64, 48)]),
    ]
}

fn wait_for<T>(events: &Receiver<CameraEvent>, mut pick: impl FnMut(CameraEvent) -> Option<T>) -> T {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = events
            .recv_timeout(remaining)
            .expect("timed out waiting for a camera event");
        if let Some(found) = pick(event) {
            return found;
        }
    }
}

#[test]
fn captures_a_decodable_jpeg() {
    let (sink, events) = channel_sink(16);
    let session = CameraSession::spawn(Box::new(VirtualDriver::new(cameras())), sink).unwrap();
    session.open(Facing::Back).unwrap();
    session.start_preview().unwrap();
    session.capture().unwrap();

    let jpeg = wait_for(&events, |event| match event {
        CameraEvent::PictureTaken(data) => Some(data),
        CameraEvent::Error { error, .. } => panic!("unexpected error: {error}"),
        _ => None,
    });
    let image = image::load_from_memory(&jpeg).unwrap();
    assert_eq!((image.width(), image.height()), (128, 96));
    assert_eq!(session.state(), SessionState::Previewing);
}

#[test]
fn state_is_readable_without_a_round_trip() {
    let (sink, _events) = channel_sink(16);
    let session = CameraSession::spawn(Box::new(VirtualDriver::new(cameras())), sink).unwrap();
    assert_eq!(session.state(), SessionState::Closed);
    session.open(CameraSelector::Id(0)).unwrap();
    // queries run after everything queued before them
    let params = session.parameters().unwrap().unwrap();
    assert_eq!(session.state(), SessionState::Configured);
    assert_eq!(params.display_rotation, Rotation::Deg90);
    assert_eq!(
        session.supported_aspect_ratios().unwrap(),
        vec![AspectRatio::RATIO_4_3, AspectRatio::RATIO_16_9]
    );
}

#[test]
fn switches_facing() {
    let (sink, events) = channel_sink(16);
    let session = CameraSession::spawn(Box::new(VirtualDriver::new(cameras())), sink).unwrap();
    session.open(Facing::Back).unwrap();
    session.start_preview().unwrap();
    assert_eq!(session.next_camera().unwrap(), Some(1));
    session.change_facing(Facing::Front).unwrap();

    let camera = session.current_camera().unwrap().unwrap();
    assert_eq!(camera.facing, Facing::Front);
    assert_eq!(session.state(), SessionState::Previewing);
    assert_eq!(session.camera_ids_by_facing(Facing::Back).unwrap(), vec![0]);
    wait_for(&events, |event| matches!(event, CameraEvent::Opened { id: 1 }).then_some(()));
}

#[test]
fn rejected_ratio_keeps_the_preview_running() {
    let (sink, events) = channel_sink(16);
    let session = CameraSession::spawn(Box::new(VirtualDriver::new(cameras())), sink).unwrap();
    session.open(Facing::Front).unwrap();
    session.start_preview().unwrap();
    session.set_aspect_ratio(AspectRatio::RATIO_16_9).unwrap();

    let severity = wait_for(&events, |event| match event {
        CameraEvent::Error { severity, .. } => Some(severity),
        _ => None,
    });
    assert_eq!(severity, Severity::Warning);
    assert_eq!(session.config().unwrap().aspect_ratio, AspectRatio::RATIO_4_3);
    assert_eq!(session.state(), SessionState::Previewing);
}

#[test]
fn laid_out_surface_renegotiates_the_preview() {
    let (sink, _events) = channel_sink(16);
    let session = CameraSession::spawn(Box::new(VirtualDriver::new(cameras())), sink).unwrap();
    session.open(Facing::Back).unwrap();
    let preview = || session.parameters().unwrap().unwrap().preview_size;
    assert_eq!(preview(), Size::new(32, 24).unwrap());

    let viewport = Viewport::with_size(60, 40);
    session.set_surface(viewport.clone()).unwrap();
    assert_eq!(preview(), Size::new(64, 48).unwrap());

    viewport.resize(20, 10);
    session.surface_changed().unwrap();
    assert_eq!(preview(), Size::new(32, 24).unwrap());
}

#[test]
fn forwards_rotated_frames_in_continuous_mode() {
    let driver = VirtualDriver::new(cameras()).with_frame_interval(Duration::from_millis(5));
    let (sink, events) = channel_sink(4);
    let session = CameraSession::spawn(Box::new(driver), sink).unwrap();
    session.set_capture_mode(CaptureMode::ContinuousFrame).unwrap();
    session.open(Facing::Back).unwrap();
    session.start_preview().unwrap();

    let frame = wait_for(&events, |event| match event {
        CameraEvent::PreviewFrame(frame) => Some(frame),
        _ => None,
    });
    assert_eq!((frame.width, frame.height), (32, 24));
    assert_eq!(frame.rotation, Rotation::Deg90);

    drop(events);
    session.shutdown();
}

#[test]
fn dropping_the_session_releases_the_camera() {
    let driver = VirtualDriver::new(cameras());
    let stats = driver.stats();
    let (sink, _events) = channel_sink(16);
    let session = CameraSession::spawn(Box::new(driver), sink).unwrap();
    session.open(Facing::Back).unwrap();
    session.start_preview().unwrap();
    session.capture().unwrap();
    drop(session);
    assert_eq!(stats.opens(), 1);
    assert_eq!(stats.live_handles(), 0);
}

#[test]
fn full_event_queue_never_blocks_the_session() {
    let (done_tx, done_rx) = channel();
    std::thread::spawn(move || {
        let (sink, events) = channel_sink(1);
        let session = CameraSession::spawn(Box::new(VirtualDriver::new(cameras())), sink).unwrap();
        session.open(Facing::Back).unwrap();
        // the queue already holds Opened, so this warning has nowhere to go
        session.set_aspect_ratio(AspectRatio::of(1, 1).unwrap()).unwrap();
        let config = session.config().unwrap();
        session.shutdown();
        let first = events.try_recv().ok();
        let _ = done_tx.send((config.aspect_ratio, first));
    });

    let (ratio, first) = done_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("session blocked on a full event queue");
    assert_eq!(ratio, AspectRatio::RATIO_4_3);
    assert!(matches!(first, Some(CameraEvent::Opened { id: 0 })));
}
