// This is free and unencumbered software released into the public domain.

//! The camera session state machine.
//!
//! A [`CameraController`] owns at most one open device and drives it through
//! `Closed → Opening → Configured → Previewing ⇄ Capturing`, plus the
//! recording states. It is single-threaded: device callbacks are marshalled
//! into its inbox as [`DeviceMessage`]s and handled by [`CameraController::pump`]
//! (or by the [`CameraSession`](super::CameraSession) owner thread).

use crate::shared::{
    AspectRatio, CameraBackend, CameraConfig, CameraDescriptor, CameraDevice, CameraDriver,
    CameraError, CameraEvent, CameraId, CameraRegistry, Capabilities, CaptureMode, ConfigChange,
    DeviceEvent, DeviceEvents, DeviceMessage, DeviceParameters, EventSink, Facing, Flash, Frame,
    Marshal, PreviewSurface, RecordingRequest, Rotation, VideoConfig,
    choose_aspect_ratio_fallback, negotiate_parameters,
};
use bytes::Bytes;
use derive_more::Display;
use dogma::Named;
use scopeguard::ScopeGuard;
use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
        mpsc::{Receiver, channel},
    },
};

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    #[display("closed")]
    Closed = 0,
    #[display("opening")]
    Opening = 1,
    #[display("configured")]
    Configured = 2,
    #[display("previewing")]
    Previewing = 3,
    #[display("capturing")]
    Capturing = 4,
    #[display("recording")]
    Recording = 5,
    #[display("paused")]
    Paused = 6,
}

impl SessionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Opening,
            2 => Self::Configured,
            3 => Self::Previewing,
            4 => Self::Capturing,
            5 => Self::Recording,
            6 => Self::Paused,
            _ => Self::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Closed | Self::Opening)
    }
}

/// Which camera to open.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum CameraSelector {
    #[display("first {_0} camera")]
    Facing(Facing),
    #[display("camera {_0}")]
    Id(CameraId),
}

impl From<Facing> for CameraSelector {
    fn from(facing: Facing) -> Self {
        Self::Facing(facing)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Configured,
    Previewing,
    Capturing { focusing: bool },
    Recording,
    Paused,
}

impl Stage {
    fn state(self) -> SessionState {
        match self {
            Self::Configured => SessionState::Configured,
            Self::Previewing => SessionState::Previewing,
            Self::Capturing { .. } => SessionState::Capturing,
            Self::Recording => SessionState::Recording,
            Self::Paused => SessionState::Paused,
        }
    }
}

/// Outbound half of the controller: the host's sink plus the published state.
struct Reporter {
    sink: EventSink,
    state: Arc<AtomicU8>,
}

impl Reporter {
    fn emit(&self, event: CameraEvent) {
        (self.sink)(event)
    }

    fn warn(&self, error: CameraError) {
        log!(warn, %error, "camera warning");
        self.emit(CameraEvent::warning(error));
    }

    fn fail(&self, error: CameraError) {
        log!(error, %error, "camera error");
        self.emit(CameraEvent::error(error));
    }

    fn enter(&self, state: SessionState) {
        let previous = SessionState::from_u8(self.state.swap(state as u8, Ordering::SeqCst));
        if previous != state {
            log!(debug, from = %previous, to = %state, "session state changed");
        }
    }
}

struct OpenCamera {
    descriptor: CameraDescriptor,
    device: Box<dyn CameraDevice>,
    events: DeviceEvents,
    caps: Capabilities,
    params: DeviceParameters,
    stage: Stage,
    /// Reconfiguration requested mid-capture, applied once the picture lands.
    pending: Option<ConfigChange>,
    recording: Option<PathBuf>,
    /// Set from the moment the device accepts a still request until its
    /// picture arrives, even if the preview was stopped in between.
    picture_outstanding: bool,
}

pub struct CameraController {
    driver: Box<dyn CameraDriver>,
    out: Reporter,
    config: CameraConfig,
    surface: Option<Arc<dyn PreviewSurface>>,
    registry: CameraRegistry,
    camera: Option<OpenCamera>,
    generation: u64,
    marshal: Marshal,
    inbox: Option<Receiver<DeviceMessage>>,
}

impl core::fmt::Debug for CameraController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CameraController")
            .field("driver", &self.driver.name())
            .field("state", &self.state())
            .field("config", &self.config)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl CameraController {
    /// Creates a closed controller that queues device callbacks in its own
    /// inbox, to be handled by [`pump`](Self::pump).
    pub fn new(driver: Box<dyn CameraDriver>, sink: EventSink) -> Self {
        let (tx, rx) = channel::<DeviceMessage>();
        let marshal: Marshal = Arc::new(move |message| {
            let _ = tx.send(message);
        });
        let mut controller = Self::with_marshal(driver, sink, marshal);
        controller.inbox = Some(rx);
        controller
    }

    /// Creates a closed controller whose device callbacks go to `marshal`.
    pub(crate) fn with_marshal(driver: Box<dyn CameraDriver>, sink: EventSink, marshal: Marshal) -> Self {
        Self {
            driver,
            out: Reporter {
                sink,
                state: Arc::new(AtomicU8::new(SessionState::Closed as u8)),
            },
            config: CameraConfig::default(),
            surface: None,
            registry: CameraRegistry::default(),
            camera: None,
            generation: 0,
            marshal,
            inbox: None,
        }
    }

    pub fn with_config(mut self, config: CameraConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_surface(mut self, surface: Arc<dyn PreviewSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub(crate) fn state_handle(&self) -> Arc<AtomicU8> {
        Arc::clone(&self.out.state)
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.out.state.load(Ordering::SeqCst))
    }

    pub fn is_open(&self) -> bool {
        self.camera.is_some()
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn backend(&self) -> CameraBackend {
        self.driver.backend()
    }

    pub fn current_camera(&self) -> Option<CameraDescriptor> {
        self.camera.as_ref().map(|c| c.descriptor)
    }

    /// The parameter set last accepted by the open device.
    pub fn parameters(&self) -> Option<&DeviceParameters> {
        self.camera.as_ref().map(|c| &c.params)
    }

    /// Ratios the open camera can serve for both preview and stills. Empty
    /// while closed.
    pub fn supported_aspect_ratios(&self) -> Vec<AspectRatio> {
        self.camera
            .as_ref()
            .map(|c| c.caps.aspect_ratios())
            .unwrap_or_default()
    }

    /// Opens the selected camera, closing the current one first.
    ///
    /// On success the session is `Configured` and `Opened` is emitted. On
    /// failure every acquired resource is released, the session is `Closed`
    /// and the failure is reported with error severity.
    pub fn open(&mut self, selector: CameraSelector) {
        if self.camera.is_some() {
            self.close();
        }
        self.out.enter(SessionState::Opening);
        match self.try_open(selector) {
            Ok(camera) => {
                let id = camera.descriptor.id;
                log!(
                    info,
                    id,
                    facing = %camera.descriptor.facing,
                    preview = %camera.params.preview_size,
                    picture = %camera.params.picture_size,
                    "camera opened"
                );
                self.config.facing = camera.descriptor.facing;
                self.camera = Some(camera);
                self.out.enter(SessionState::Configured);
                self.out.emit(CameraEvent::Opened { id });
            },
            Err(error) => {
                self.out.enter(SessionState::Closed);
                self.out.fail(error);
            },
        }
    }

    fn try_open(&mut self, selector: CameraSelector) -> Result<OpenCamera, CameraError> {
        self.registry = CameraRegistry::enumerate(self.driver.as_ref())?;
        let descriptor = self.resolve(selector)?;

        self.generation += 1;
        let events = DeviceEvents::new(self.generation, Arc::clone(&self.marshal));
        let device = self
            .driver
            .open(descriptor.id, events.clone())
            .map_err(|e| CameraError::device_open(descriptor.id, e))?;
        let mut device = scopeguard::guard(device, |mut device| {
            log!(debug, "releasing device after failed open");
            device.release();
        });

        let caps = Capabilities::query(&**device);
        self.settle_aspect_ratio(&caps)?;
        let params =
            negotiate_parameters(&self.config, &descriptor, &caps, self.surface.as_deref())?;
        if params.flash != self.config.flash {
            self.out
                .warn(CameraError::unsupported(format!("flash mode {}", self.config.flash)));
        }
        device
            .set_parameters(&params)
            .map_err(|e| CameraError::device_parameter("opening the camera", e))?;
        if let Some(surface) = self.surface.as_ref().filter(|s| s.is_ready()) {
            device.attach_surface(surface)?;
        }

        Ok(OpenCamera {
            descriptor,
            device: ScopeGuard::into_inner(device),
            events,
            caps,
            params,
            stage: Stage::Configured,
            pending: None,
            recording: None,
            picture_outstanding: false,
        })
    }

    fn resolve(&self, selector: CameraSelector) -> Result<CameraDescriptor, CameraError> {
        match selector {
            CameraSelector::Id(id) => self.registry.get(id).copied().ok_or(CameraError::NoCamera),
            CameraSelector::Facing(facing) => {
                if let Some(camera) = self.registry.first_facing(facing) {
                    return Ok(*camera);
                }
                let camera = self
                    .registry
                    .cameras()
                    .first()
                    .copied()
                    .ok_or(CameraError::NoCamera)?;
                self.out.warn(CameraError::unsupported(format!(
                    "no {facing} camera, using camera {}",
                    camera.id
                )));
                Ok(camera)
            },
        }
    }

    /// Falls back to a supported ratio when the stored one isn't offered.
    fn settle_aspect_ratio(&mut self, caps: &Capabilities) -> Result<(), CameraError> {
        let requested = self.config.aspect_ratio;
        if caps.supports(&requested) {
            return Ok(());
        }
        let fallback = choose_aspect_ratio_fallback(&caps.preview_sizes, AspectRatio::RATIO_4_3)
            .ok_or_else(|| {
                CameraError::unsupported("no aspect ratio offers both preview and picture sizes")
            })?;
        log!(info, %requested, %fallback, "falling back to a supported aspect ratio");
        self.config.aspect_ratio = fallback;
        self.out.warn(CameraError::UnsupportedAspectRatio(requested));
        Ok(())
    }

    /// Starts the preview of a configured camera. Does nothing if the preview
    /// is already running.
    pub fn start_preview(&mut self) {
        let Some(camera) = self.camera.as_mut() else {
            self.out.warn(CameraError::NotOpen);
            return;
        };
        if camera.stage != Stage::Configured {
            return;
        }
        match camera.device.start_preview() {
            Ok(()) => {
                camera.stage = Stage::Previewing;
                self.out.enter(SessionState::Previewing);
            },
            Err(error) => self.out.fail(error),
        }
    }

    /// Stops the preview, abandoning any capture and stopping any recording.
    pub fn stop_preview(&mut self) {
        let Some(camera) = self.camera.as_mut() else {
            return;
        };
        Self::halt(camera, &self.out);
        let pending = camera.pending.take();
        if let Some(change) = pending {
            self.reconfigure(change);
        }
    }

    /// Winds an open camera back to `Configured`. Device failures on the way
    /// are reported as warnings.
    fn halt(camera: &mut OpenCamera, out: &Reporter) {
        match camera.stage {
            Stage::Configured => return,
            Stage::Recording | Stage::Paused => Self::finish_recording(camera, out),
            Stage::Capturing { .. } => {
                log!(debug, "abandoning in-flight capture");
                let _ = camera.device.cancel_auto_focus();
            },
            Stage::Previewing => {},
        }
        if let Err(error) = camera.device.stop_preview() {
            out.warn(error);
        }
        camera.stage = Stage::Configured;
        out.enter(SessionState::Configured);
    }

    fn finish_recording(camera: &mut OpenCamera, out: &Reporter) {
        if let Err(error) = camera.device.stop_recording() {
            out.fail(error);
        }
        camera.stage = Stage::Previewing;
        if let Some(path) = camera.recording.take() {
            log!(info, path = %path.display(), "recording stopped");
            out.emit(CameraEvent::RecordingStopped { path });
        }
    }

    /// Releases the camera. Safe to call in any state, including mid-capture
    /// and while already closed.
    pub fn close(&mut self) {
        let Some(mut camera) = self.camera.take() else {
            return;
        };
        Self::halt(&mut camera, &self.out);
        if let Some(change) = camera.pending.take() {
            self.config.apply(&change);
        }
        camera.device.release();
        log!(info, id = camera.descriptor.id, "camera closed");
        self.out.enter(SessionState::Closed);
        self.out.emit(CameraEvent::Closed);
    }

    /// Applies a batch of setting changes with at most one preview restart.
    ///
    /// While closed the changes are only stored. Mid-capture they are deferred
    /// until the picture completes; while recording they are refused. A facing
    /// change reopens the camera. Anything the open device can't serve is
    /// reported as a warning and leaves the previous configuration in place.
    pub fn reconfigure(&mut self, change: ConfigChange) {
        let change = change.diff(&self.config);
        if change.is_empty() {
            return;
        }
        let Some(camera) = self.camera.as_mut() else {
            self.config.apply(&change);
            return;
        };

        match camera.stage {
            Stage::Capturing { .. } => {
                log!(debug, "deferring reconfiguration until the capture completes");
                camera
                    .pending
                    .get_or_insert_with(ConfigChange::default)
                    .merge(&change);
                return;
            },
            Stage::Recording | Stage::Paused => {
                self.out
                    .warn(CameraError::IllegalState("cannot reconfigure while recording"));
                return;
            },
            Stage::Configured | Stage::Previewing => {},
        }

        if let Some(facing) = change.facing {
            let resume = camera.stage == Stage::Previewing;
            self.config.apply(&change);
            self.open(CameraSelector::Facing(facing));
            if resume && self.camera.is_some() {
                self.start_preview();
            }
            return;
        }

        if let Some(ratio) = change.aspect_ratio {
            if !camera.caps.supports(&ratio) {
                self.out.warn(CameraError::UnsupportedAspectRatio(ratio));
                return;
            }
        }

        let mut next = self.config.clone();
        next.apply(&change);
        self.apply_config(next, change.flash.is_some());
    }

    /// Renegotiates for `next` and pushes the result to the device, stopping
    /// and restarting a running preview around the change.
    fn apply_config(&mut self, next: CameraConfig, flash_requested: bool) {
        let Some(camera) = self.camera.as_mut() else {
            self.config = next;
            return;
        };
        let params = match negotiate_parameters(
            &next,
            &camera.descriptor,
            &camera.caps,
            self.surface.as_deref(),
        ) {
            Ok(params) => params,
            Err(error) => {
                self.out.warn(error);
                return;
            },
        };
        if flash_requested && params.flash != next.flash {
            self.out
                .warn(CameraError::unsupported(format!("flash mode {}", next.flash)));
        }
        if params == camera.params {
            self.config = next;
            return;
        }

        let restart = camera.stage == Stage::Previewing;
        if restart {
            if let Err(error) = camera.device.stop_preview() {
                self.out.warn(error);
            }
        }
        match camera.device.set_parameters(&params) {
            Ok(()) => {
                log!(
                    debug,
                    preview = %params.preview_size,
                    picture = %params.picture_size,
                    rotation = %params.display_rotation,
                    "parameters applied"
                );
                camera.params = params;
                self.config = next;
            },
            Err(error) => {
                let error = CameraError::device_parameter("reconfiguring the camera", error);
                match camera.device.set_parameters(&camera.params) {
                    Ok(()) => self.out.warn(error),
                    Err(_) => self.out.fail(error),
                }
            },
        }
        if restart {
            if let Err(error) = camera.device.start_preview() {
                camera.stage = Stage::Configured;
                self.out.enter(SessionState::Configured);
                self.out.fail(error);
            }
        }
    }

    pub fn set_aspect_ratio(&mut self, ratio: AspectRatio) {
        self.reconfigure(ConfigChange::new().aspect_ratio(ratio));
    }

    pub fn change_facing(&mut self, facing: Facing) {
        self.reconfigure(ConfigChange::new().facing(facing));
    }

    pub fn change_display_orientation(&mut self, rotation: Rotation) {
        self.reconfigure(ConfigChange::new().display_rotation(rotation));
    }

    pub fn set_flash(&mut self, flash: Flash) {
        self.reconfigure(ConfigChange::new().flash(flash));
    }

    pub fn set_auto_focus(&mut self, enabled: bool) {
        self.reconfigure(ConfigChange::new().auto_focus(enabled));
    }

    pub fn set_capture_mode(&mut self, mode: CaptureMode) {
        self.reconfigure(ConfigChange::new().capture_mode(mode));
    }

    pub fn set_jpeg_quality(&mut self, quality: u8) {
        self.reconfigure(ConfigChange::new().jpeg_quality(quality));
    }

    /// Replaces the preview surface and renegotiates for it.
    pub fn set_surface(&mut self, surface: Arc<dyn PreviewSurface>) {
        self.surface = Some(surface);
        self.surface_changed();
    }

    /// Call after the preview surface was laid out or resized.
    pub fn surface_changed(&mut self) {
        let Some(camera) = self.camera.as_mut() else {
            return;
        };
        let Some(surface) = self.surface.as_ref().filter(|s| s.is_ready()) else {
            return;
        };
        if let Err(error) = camera.device.attach_surface(surface) {
            self.out.fail(error);
            return;
        }
        let stage = camera.stage;
        match stage {
            Stage::Configured | Stage::Previewing => {
                let next = self.config.clone();
                self.apply_config(next, false);
            },
            _ => {
                log!(debug, "surface changed mid-capture, keeping current sizes");
            },
        }
    }

    /// Takes one still picture. Requires a running preview; a request while a
    /// capture is already in flight is dropped.
    pub fn capture(&mut self) {
        let auto_focus = self.config.auto_focus;
        let Some(camera) = self.camera.as_mut() else {
            self.out.warn(CameraError::NotOpen);
            return;
        };
        if camera.picture_outstanding {
            log!(debug, reason = %CameraError::CaptureInProgress, "dropping capture request");
            return;
        }
        match camera.stage {
            Stage::Previewing => {},
            Stage::Capturing { .. } => {
                log!(debug, reason = %CameraError::CaptureInProgress, "dropping capture request");
                return;
            },
            _ => {
                self.out
                    .warn(CameraError::IllegalState("capture requires an idle running preview"));
                return;
            },
        }

        let focusing = auto_focus && camera.params.focus_mode.is_some_and(|m| m.is_continuous());
        camera.stage = Stage::Capturing { focusing };
        self.out.enter(SessionState::Capturing);
        let result = if focusing {
            let _ = camera.device.cancel_auto_focus();
            camera.device.auto_focus(camera.events.focus_callback())
        } else {
            Self::issue_capture(camera)
        };
        if let Err(error) = result {
            camera.stage = Stage::Previewing;
            self.out.enter(SessionState::Previewing);
            self.out.fail(error);
        }
    }

    pub fn start_recording(&mut self, output: impl Into<PathBuf>, config: VideoConfig) {
        let mode = self.config.capture_mode;
        let Some(camera) = self.camera.as_mut() else {
            self.out.warn(CameraError::NotOpen);
            return;
        };
        if mode != CaptureMode::VideoCapture {
            self.out
                .warn(CameraError::IllegalState("recording requires video capture mode"));
            return;
        }
        if camera.stage != Stage::Previewing {
            self.out
                .warn(CameraError::IllegalState("recording requires an idle running preview"));
            return;
        }
        let request = RecordingRequest {
            output: output.into(),
            size: camera.params.video_size,
            orientation_hint: camera.params.capture_rotation,
            config,
        };
        match camera.device.start_recording(&request) {
            Ok(()) => {
                log!(info, path = %request.output.display(), size = %request.size, "recording started");
                camera.stage = Stage::Recording;
                camera.recording = Some(request.output.clone());
                self.out.enter(SessionState::Recording);
                self.out.emit(CameraEvent::RecordingStarted {
                    path: request.output,
                });
            },
            Err(error) => self.out.fail(error),
        }
    }

    pub fn stop_recording(&mut self) {
        let Some(camera) = self.camera.as_mut() else {
            self.out.warn(CameraError::NotOpen);
            return;
        };
        if !matches!(camera.stage, Stage::Recording | Stage::Paused) {
            self.out.warn(CameraError::IllegalState("no recording in progress"));
            return;
        }
        Self::finish_recording(camera, &self.out);
        self.out.enter(SessionState::Previewing);
    }

    pub fn pause_recording(&mut self) {
        self.toggle_recording(Stage::Recording, Stage::Paused);
    }

    pub fn resume_recording(&mut self) {
        self.toggle_recording(Stage::Paused, Stage::Recording);
    }

    fn toggle_recording(&mut self, from: Stage, to: Stage) {
        let Some(camera) = self.camera.as_mut() else {
            self.out.warn(CameraError::NotOpen);
            return;
        };
        if camera.stage != from {
            self.out.warn(CameraError::IllegalState(match to {
                Stage::Paused => "no active recording to pause",
                _ => "no paused recording to resume",
            }));
            return;
        }
        let result = match to {
            Stage::Paused => camera.device.pause_recording(),
            _ => camera.device.resume_recording(),
        };
        match result {
            Ok(()) => {
                camera.stage = to;
                self.out.enter(to.state());
                self.out.emit(match to {
                    Stage::Paused => CameraEvent::RecordingPaused,
                    _ => CameraEvent::RecordingResumed,
                });
            },
            Err(error) => self.out.warn(error),
        }
    }

    /// Cameras with the given facing, in enumeration order.
    pub fn camera_ids_by_facing(&mut self, facing: Facing) -> Vec<CameraId> {
        self.refresh_registry();
        self.registry.by_facing(facing)
    }

    /// All cameras currently present.
    pub fn cameras(&mut self) -> Vec<CameraDescriptor> {
        self.refresh_registry();
        self.registry.cameras().to_vec()
    }

    /// The camera a "switch camera" control should open next.
    pub fn next_camera(&mut self) -> Option<CameraId> {
        self.refresh_registry();
        let current = match &self.camera {
            Some(camera) => camera.descriptor.id,
            None => match self.registry.first_facing(self.config.facing) {
                Some(camera) => camera.id,
                None => return self.registry.cameras().first().map(|c| c.id),
            },
        };
        self.registry.next_camera(current)
    }

    fn refresh_registry(&mut self) {
        match CameraRegistry::enumerate(self.driver.as_ref()) {
            Ok(registry) => self.registry = registry,
            Err(error) => self.out.warn(error),
        }
    }

    /// Handles every device notification queued since the last call. Returns
    /// how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(message) = self.inbox.as_ref().and_then(|rx| rx.try_recv().ok()) {
            self.handle_device_message(message);
            handled += 1;
        }
        handled
    }

    /// Dispatches one device notification. Notifications from a device that
    /// has since been closed or replaced are ignored.
    pub fn handle_device_message(&mut self, message: DeviceMessage) {
        if self.camera.is_none() || message.generation != self.generation {
            log!(trace, generation = message.generation, "ignoring stale device event");
            return;
        }
        match message.event {
            DeviceEvent::FocusCompleted { success } => self.on_focus_completed(success),
            DeviceEvent::PictureTaken(result) => self.on_picture_taken(result),
            DeviceEvent::Frame(frame) => self.on_frame(frame),
            DeviceEvent::Error(error) => self.out.fail(error),
            DeviceEvent::Disconnected => {
                self.out.fail(CameraError::Disconnected);
                self.close();
            },
        }
    }

    fn on_focus_completed(&mut self, success: bool) {
        let Some(camera) = self.camera.as_mut() else {
            return;
        };
        if camera.stage != (Stage::Capturing { focusing: true }) {
            return;
        }
        if !success {
            log!(debug, "focus pass did not converge, capturing anyway");
        }
        camera.stage = Stage::Capturing { focusing: false };
        if let Err(error) = Self::issue_capture(camera) {
            camera.stage = Stage::Previewing;
            self.out.enter(SessionState::Previewing);
            self.out.fail(error);
        }
    }

    fn issue_capture(camera: &mut OpenCamera) -> Result<(), CameraError> {
        camera
            .device
            .capture_photo(camera.events.picture_callback())?;
        camera.picture_outstanding = true;
        Ok(())
    }

    fn on_picture_taken(&mut self, result: Result<Bytes, CameraError>) {
        let Some(camera) = self.camera.as_mut() else {
            return;
        };
        camera.picture_outstanding = false;
        if camera.stage != (Stage::Capturing { focusing: false }) {
            log!(debug, "discarding the picture of an abandoned capture");
            return;
        }
        let _ = camera.device.cancel_auto_focus();
        camera.stage = Stage::Previewing;
        self.out.enter(SessionState::Previewing);
        match result {
            Ok(data) => {
                log!(debug, bytes = data.len(), "picture taken");
                self.out.emit(CameraEvent::PictureTaken(data));
            },
            Err(error) => self.out.fail(error),
        }
        let pending = camera.pending.take();
        if let Some(change) = pending {
            self.reconfigure(change);
        }
    }

    fn on_frame(&mut self, frame: Frame) {
        let Some(camera) = self.camera.as_ref() else {
            return;
        };
        if self.config.capture_mode != CaptureMode::ContinuousFrame
            || camera.stage == Stage::Configured
        {
            return;
        }
        let rotation = camera.params.capture_rotation;
        self.out
            .emit(CameraEvent::PreviewFrame(frame.with_rotation(rotation)));
    }
}

impl Drop for CameraController {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{
        FocusMode, Severity, Size, Viewport, channel_sink,
        drivers::virtual_camera::{VirtualCamera, VirtualDriver, VirtualStats},
    };
    use std::sync::Mutex;

    fn small_back() -> VirtualCamera {
        VirtualCamera::new(Facing::Back, Rotation::Deg90)
            .with_preview_sizes(&[(160, 120), (320, 240), (320, 180), (640, 360)])
            .with_picture_sizes(&[(320, 240), (640, 480), (640, 360)])
            .with_flash_modes(&[Flash::Off, Flash::On])
    }

    fn small_front() -> VirtualCamera {
        VirtualCamera::new(Facing::Front, Rotation::Deg270)
            .with_preview_sizes(&[(160, 120), (320, 240)])
            .with_picture_sizes(&[(320, 240)])
    }

    struct Harness {
        controller: CameraController,
        events: Receiver<CameraEvent>,
        stats: Arc<VirtualStats>,
        faults: Arc<Mutex<crate::shared::drivers::virtual_camera::VirtualFaults>>,
    }

    impl Harness {
        fn new(cameras: Vec<VirtualCamera>) -> Self {
            let driver = VirtualDriver::new(cameras).with_inline_callbacks();
            let (stats, faults) = (driver.stats(), driver.faults());
            let (sink, events) = channel_sink(64);
            Self {
                controller: CameraController::new(Box::new(driver), sink),
                events,
                stats,
                faults,
            }
        }

        fn phone() -> Self {
            Self::new(vec![small_back(), small_front()])
        }

        fn previewing(mut self) -> Self {
            self.controller.open(CameraSelector::Facing(Facing::Back));
            self.controller.start_preview();
            assert_eq!(self.controller.state(), SessionState::Previewing);
            self.drain();
            self
        }

        fn drain(&self) -> Vec<CameraEvent> {
            self.events.try_iter().collect()
        }

        fn severities(&self) -> Vec<Severity> {
            self.drain()
                .into_iter()
                .filter_map(|e| match e {
                    CameraEvent::Error { severity, .. } => Some(severity),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn open_negotiates_parameters() {
        let mut h = Harness::phone();
        h.controller.open(CameraSelector::Facing(Facing::Back));
        assert_eq!(h.controller.state(), SessionState::Configured);
        let params = h.controller.parameters().unwrap().clone();
        // no surface yet, so the smallest 4:3 preview
        assert_eq!(params.preview_size, Size::new(160, 120).unwrap());
        assert_eq!(params.picture_size, Size::new(640, 480).unwrap());
        assert_eq!(params.display_rotation, Rotation::Deg90);
        assert!(matches!(h.drain().as_slice(), [CameraEvent::Opened { id: 0 }]));
        assert_eq!(
            h.controller.supported_aspect_ratios(),
            vec![AspectRatio::RATIO_4_3, AspectRatio::RATIO_16_9]
        );
    }

    #[test]
    fn open_with_laid_out_surface_picks_covering_preview() {
        let viewport = Viewport::with_size(300, 200);
        let driver = VirtualDriver::new(vec![small_back()]).with_inline_callbacks();
        let mut controller = CameraController::new(Box::new(driver), crate::shared::null_sink())
            .with_surface(viewport.clone());
        controller.open(CameraSelector::Facing(Facing::Back));
        let preview = |c: &CameraController| c.parameters().unwrap().preview_size;
        assert_eq!(preview(&controller), Size::new(320, 240).unwrap());

        // nothing 4:3 covers 600x400, so the largest is used
        viewport.resize(600, 400);
        controller.surface_changed();
        assert_eq!(preview(&controller), Size::new(320, 240).unwrap());

        controller.set_aspect_ratio(AspectRatio::RATIO_16_9);
        assert_eq!(preview(&controller), Size::new(640, 360).unwrap());
    }

    #[test]
    fn failed_open_releases_the_device() {
        let mut h = Harness::phone();
        h.faults.lock().unwrap().set_parameters = true;
        h.controller.open(CameraSelector::Facing(Facing::Back));
        assert_eq!(h.controller.state(), SessionState::Closed);
        assert!(!h.controller.is_open());
        assert_eq!(h.stats.opens(), 1);
        assert_eq!(h.stats.live_handles(), 0);
        assert_eq!(h.severities(), vec![Severity::Error]);

        h.faults.lock().unwrap().set_parameters = false;
        h.faults.lock().unwrap().open = true;
        h.controller.open(CameraSelector::Id(1));
        assert_eq!(h.controller.state(), SessionState::Closed);
        assert_eq!(h.stats.live_handles(), 0);
    }

    #[test]
    fn unknown_camera_id_fails_open() {
        let mut h = Harness::phone();
        h.controller.open(CameraSelector::Id(7));
        assert_eq!(h.controller.state(), SessionState::Closed);
        assert_eq!(h.stats.opens(), 0);
        assert_eq!(h.severities(), vec![Severity::Error]);
    }

    #[test]
    fn missing_facing_falls_back_to_first_camera() {
        let mut h = Harness::new(vec![small_back()]);
        h.controller.open(CameraSelector::Facing(Facing::Front));
        assert_eq!(h.controller.state(), SessionState::Configured);
        assert_eq!(h.controller.config().facing, Facing::Back);
        assert_eq!(h.severities(), vec![Severity::Warning]);
    }

    #[test]
    fn unsupported_stored_ratio_falls_back_on_open() {
        let mut h = Harness::phone();
        h.controller.set_aspect_ratio(AspectRatio::of(1, 1).unwrap());
        h.controller.open(CameraSelector::Facing(Facing::Back));
        assert_eq!(h.controller.state(), SessionState::Configured);
        assert_eq!(h.controller.config().aspect_ratio, AspectRatio::RATIO_4_3);
        assert_eq!(h.severities(), vec![Severity::Warning]);
    }

    #[test]
    fn second_capture_in_flight_is_dropped() {
        let mut h = Harness::phone().previewing();
        h.controller.capture();
        h.controller.capture();
        assert_eq!(h.controller.state(), SessionState::Capturing);
        assert_eq!(h.stats.captures(), 1);
        assert_eq!(h.stats.focus_passes(), 0);

        h.controller.pump();
        assert_eq!(h.controller.state(), SessionState::Previewing);
        let pictures = h
            .drain()
            .into_iter()
            .filter(|e| matches!(e, CameraEvent::PictureTaken(_)))
            .count();
        assert_eq!(pictures, 1);
    }

    #[test]
    fn restarted_preview_waits_for_the_abandoned_picture() {
        let mut h = Harness::phone().previewing();
        h.controller.capture();
        h.controller.stop_preview();
        h.controller.start_preview();
        assert_eq!(h.controller.state(), SessionState::Previewing);
        h.controller.capture();
        assert_eq!(h.stats.captures(), 1);

        // the late picture belongs to the abandoned request
        h.controller.pump();
        assert_eq!(h.controller.state(), SessionState::Previewing);
        assert!(!h.drain().iter().any(|e| matches!(e, CameraEvent::PictureTaken(_))));

        h.controller.capture();
        assert_eq!(h.stats.captures(), 2);
        h.controller.pump();
        let pictures = h
            .drain()
            .into_iter()
            .filter(|e| matches!(e, CameraEvent::PictureTaken(_)))
            .count();
        assert_eq!(pictures, 1);
        assert_eq!(h.controller.state(), SessionState::Previewing);
    }

    #[test]
    fn continuous_focus_runs_a_focus_pass_before_capturing() {
        let back = small_back().with_focus_modes(&[FocusMode::Auto, FocusMode::ContinuousPicture]);
        let mut h = Harness::new(vec![back]).previewing();
        h.controller.capture();
        assert_eq!(h.stats.focus_passes(), 1);
        assert_eq!(h.stats.captures(), 0);
        h.controller.pump();
        assert_eq!(h.stats.captures(), 1);
        assert_eq!(h.controller.state(), SessionState::Previewing);

        h.controller.set_auto_focus(false);
        h.controller.capture();
        h.controller.pump();
        assert_eq!(h.stats.focus_passes(), 1);
        assert_eq!(h.stats.captures(), 2);
    }

    #[test]
    fn failed_picture_returns_to_preview() {
        let mut h = Harness::phone().previewing();
        h.faults.lock().unwrap().picture = true;
        h.controller.capture();
        h.controller.pump();
        assert_eq!(h.controller.state(), SessionState::Previewing);
        assert_eq!(h.severities(), vec![Severity::Error]);
    }

    #[test]
    fn capture_requires_preview() {
        let mut h = Harness::phone();
        h.controller.capture();
        h.controller.open(CameraSelector::Facing(Facing::Back));
        h.controller.capture();
        assert_eq!(h.stats.captures(), 0);
        assert_eq!(h.controller.state(), SessionState::Configured);
    }

    #[test]
    fn aspect_ratio_set_while_closed_is_kept_for_open() {
        let mut h = Harness::phone();
        h.controller.set_aspect_ratio(AspectRatio::RATIO_16_9);
        assert_eq!(h.controller.config().aspect_ratio, AspectRatio::RATIO_16_9);
        h.controller.open(CameraSelector::Facing(Facing::Back));
        assert_eq!(
            h.controller.parameters().unwrap().picture_size,
            Size::new(640, 360).unwrap()
        );
    }

    #[test]
    fn unsupported_ratio_while_open_is_rejected() {
        let mut h = Harness::phone().previewing();
        let before = h.controller.parameters().unwrap().clone();
        h.controller.set_aspect_ratio(AspectRatio::of(1, 1).unwrap());
        assert_eq!(h.controller.config().aspect_ratio, AspectRatio::RATIO_4_3);
        assert_eq!(h.controller.parameters(), Some(&before));
        assert_eq!(h.controller.state(), SessionState::Previewing);
        assert_eq!(h.severities(), vec![Severity::Warning]);
    }

    #[test]
    fn batched_changes_restart_preview_once() {
        let mut h = Harness::phone().previewing();
        let (starts, stops, sets) = (
            h.stats.preview_starts(),
            h.stats.preview_stops(),
            h.stats.parameter_sets(),
        );
        h.controller.reconfigure(
            ConfigChange::new()
                .aspect_ratio(AspectRatio::RATIO_16_9)
                .flash(Flash::On)
                .display_rotation(Rotation::Deg90),
        );
        assert_eq!(h.stats.preview_starts(), starts + 1);
        assert_eq!(h.stats.preview_stops(), stops + 1);
        assert_eq!(h.stats.parameter_sets(), sets + 1);
        let params = h.controller.parameters().unwrap();
        assert_eq!(params.flash, Flash::On);
        assert_eq!(params.display_rotation, Rotation::Deg0);
        assert_eq!(params.capture_rotation, Rotation::Deg180);
        assert!(h.severities().is_empty());
    }

    #[test]
    fn unsupported_flash_falls_back_with_warning() {
        let mut h = Harness::new(vec![small_front()]).previewing();
        h.controller.set_flash(Flash::Torch);
        assert_eq!(h.controller.config().flash, Flash::Torch);
        assert_eq!(h.controller.parameters().unwrap().flash, Flash::Off);
        assert_eq!(h.severities(), vec![Severity::Warning]);
    }

    #[test]
    fn rejected_parameters_keep_previous_configuration() {
        let mut h = Harness::phone().previewing();
        let before = h.controller.parameters().unwrap().clone();
        h.faults.lock().unwrap().set_parameters = true;
        h.controller.set_aspect_ratio(AspectRatio::RATIO_16_9);
        assert_eq!(h.controller.parameters(), Some(&before));
        assert_eq!(h.controller.config().aspect_ratio, AspectRatio::RATIO_4_3);
        assert_eq!(h.controller.state(), SessionState::Previewing);
        // restoring also fails while the fault is armed
        assert_eq!(h.severities(), vec![Severity::Error]);
    }

    #[test]
    fn facing_change_reopens_and_resumes_preview() {
        let mut h = Harness::phone().previewing();
        h.controller.change_facing(Facing::Front);
        assert_eq!(h.controller.current_camera().unwrap().facing, Facing::Front);
        assert_eq!(h.controller.state(), SessionState::Previewing);
        assert_eq!(h.stats.opens(), 2);
        assert_eq!(h.stats.live_handles(), 1);
        let events = h.drain();
        assert!(matches!(
            events.as_slice(),
            [CameraEvent::Closed, CameraEvent::Opened { id: 1 }]
        ));
    }

    #[test]
    fn changes_during_capture_apply_after_the_picture() {
        let mut h = Harness::phone().previewing();
        h.controller.capture();
        h.controller.set_flash(Flash::On);
        h.controller.set_jpeg_quality(50);
        assert_eq!(h.controller.parameters().unwrap().flash, Flash::Off);
        h.controller.pump();
        let params = h.controller.parameters().unwrap();
        assert_eq!((params.flash, params.jpeg_quality), (Flash::On, 50));
        assert_eq!(h.controller.state(), SessionState::Previewing);
    }

    #[test]
    fn stale_callbacks_are_ignored() {
        let mut h = Harness::phone().previewing();
        h.controller.capture();
        // the picture is queued for the first open; reopen before handling it
        h.controller.open(CameraSelector::Facing(Facing::Back));
        h.controller.start_preview();
        h.drain();
        h.controller.pump();
        assert_eq!(h.controller.state(), SessionState::Previewing);
        assert!(
            !h.drain()
                .iter()
                .any(|e| matches!(e, CameraEvent::PictureTaken(_)))
        );
    }

    #[test]
    fn close_is_safe_in_every_state() {
        let mut h = Harness::phone();
        h.controller.close();
        assert_eq!(h.controller.state(), SessionState::Closed);

        let mut h = h.previewing();
        h.controller.capture();
        h.controller.close();
        h.controller.close();
        assert_eq!(h.controller.state(), SessionState::Closed);
        assert_eq!(h.stats.live_handles(), 0);
        h.controller.pump();
        assert!(h.drain().iter().all(|e| !matches!(e, CameraEvent::PictureTaken(_))));
    }

    #[test]
    fn recording_lifecycle() {
        let mut h = Harness::phone().previewing();
        h.controller.start_recording("clip.mp4", VideoConfig::default());
        assert_eq!(h.controller.state(), SessionState::Previewing);
        assert_eq!(h.severities(), vec![Severity::Warning]);

        h.controller.set_capture_mode(CaptureMode::VideoCapture);
        h.controller.start_recording("clip.mp4", VideoConfig::default());
        assert_eq!(h.controller.state(), SessionState::Recording);
        h.controller.pause_recording();
        assert_eq!(h.controller.state(), SessionState::Paused);
        h.controller.set_flash(Flash::On);
        h.controller.resume_recording();
        assert_eq!(h.controller.state(), SessionState::Recording);
        h.controller.stop_recording();
        assert_eq!(h.controller.state(), SessionState::Previewing);

        let events = h.drain();
        assert!(matches!(events.first(), Some(CameraEvent::RecordingStarted { .. })));
        assert!(matches!(
            events.last(),
            Some(CameraEvent::RecordingStopped { path }) if path == &PathBuf::from("clip.mp4")
        ));
        assert_eq!(h.controller.config().flash, Flash::Off);
    }

    #[test]
    fn disconnect_closes_the_session() {
        let mut h = Harness::phone().previewing();
        let generation = h.controller.generation;
        h.controller.handle_device_message(DeviceMessage {
            generation,
            event: DeviceEvent::Disconnected,
        });
        assert_eq!(h.controller.state(), SessionState::Closed);
        assert_eq!(h.stats.live_handles(), 0);
    }

    #[test]
    fn next_camera_cycles_between_facings() {
        let mut h = Harness::phone();
        assert_eq!(h.controller.next_camera(), Some(1));
        assert_eq!(h.controller.camera_ids_by_facing(Facing::Front), vec![1]);
        h.controller.open(CameraSelector::Id(1));
        assert_eq!(h.controller.next_camera(), Some(0));
    }
}
