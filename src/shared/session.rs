// This is free and unencumbered software released into the public domain.

//! A [`CameraController`] running on its own owner thread.
//!
//! Every host call and every device callback is queued as a command and
//! handled in order on that thread, so the controller never sees concurrent
//! access. The session state can be read without a round trip.

use crate::shared::{
    AspectRatio, CameraConfig, CameraController, CameraDescriptor, CameraDriver, CameraError,
    CameraId, CameraSelector, CaptureMode, ConfigChange, DeviceMessage, DeviceParameters,
    EventSink, Facing, Flash, Marshal, PreviewSurface, Rotation, SessionState, VideoConfig,
};
use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
        mpsc::{Receiver, Sender, channel, sync_channel},
    },
    thread::JoinHandle,
};

type Query = Box<dyn FnOnce(&mut CameraController) + Send + 'static>;

enum Command {
    Open(CameraSelector),
    StartPreview,
    StopPreview,
    Close,
    Reconfigure(ConfigChange),
    Capture,
    StartRecording(PathBuf, VideoConfig),
    StopRecording,
    PauseRecording,
    ResumeRecording,
    SetSurface(Arc<dyn PreviewSurface>),
    SurfaceChanged,
    Query(Query),
    Device(DeviceMessage),
    Shutdown,
}

pub struct CameraSession {
    tx: Sender<Command>,
    state: Arc<AtomicU8>,
    join: Option<JoinHandle<()>>,
}

impl core::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CameraSession")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl CameraSession {
    pub fn spawn(driver: Box<dyn CameraDriver>, sink: EventSink) -> Result<Self, CameraError> {
        Self::spawn_with(driver, sink, CameraConfig::default(), None)
    }

    /// Starts the owner thread with initial settings and, optionally, a
    /// preview surface.
    pub fn spawn_with(
        driver: Box<dyn CameraDriver>,
        sink: EventSink,
        config: CameraConfig,
        surface: Option<Arc<dyn PreviewSurface>>,
    ) -> Result<Self, CameraError> {
        let (tx, rx) = channel::<Command>();
        let device_tx = tx.clone();
        let marshal: Marshal = Arc::new(move |message| {
            let _ = device_tx.send(Command::Device(message));
        });

        let mut controller = CameraController::with_marshal(driver, sink, marshal).with_config(config);
        if let Some(surface) = surface {
            controller = controller.with_surface(surface);
        }
        let state = controller.state_handle();

        let join = std::thread::Builder::new()
            .name("camera-session".into())
            .spawn(move || run(controller, rx))
            .map_err(|e| CameraError::driver("spawning the session thread", e))?;

        Ok(Self {
            tx,
            state,
            join: Some(join),
        })
    }

    /// The current state, without waiting for queued commands.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn send(&self, command: Command) -> Result<(), CameraError> {
        self.tx.send(command).map_err(|_| CameraError::Closed)
    }

    /// Runs `f` on the owner thread after every command queued before it, and
    /// waits for its result.
    pub fn query<R: Send + 'static>(
        &self,
        f: impl FnOnce(&mut CameraController) -> R + Send + 'static,
    ) -> Result<R, CameraError> {
        let (reply_tx, reply_rx) = sync_channel::<R>(1);
        self.send(Command::Query(Box::new(move |controller| {
            let _ = reply_tx.send(f(controller));
        })))?;
        reply_rx.recv().map_err(|_| CameraError::Closed)
    }

    pub fn open(&self, selector: impl Into<CameraSelector>) -> Result<(), CameraError> {
        self.send(Command::Open(selector.into()))
    }

    pub fn start_preview(&self) -> Result<(), CameraError> {
        self.send(Command::StartPreview)
    }

    pub fn stop_preview(&self) -> Result<(), CameraError> {
        self.send(Command::StopPreview)
    }

    pub fn close(&self) -> Result<(), CameraError> {
        self.send(Command::Close)
    }

    pub fn reconfigure(&self, change: ConfigChange) -> Result<(), CameraError> {
        self.send(Command::Reconfigure(change))
    }

    pub fn set_aspect_ratio(&self, ratio: AspectRatio) -> Result<(), CameraError> {
        self.reconfigure(ConfigChange::new().aspect_ratio(ratio))
    }

    pub fn change_facing(&self, facing: Facing) -> Result<(), CameraError> {
        self.reconfigure(ConfigChange::new().facing(facing))
    }

    pub fn change_display_orientation(&self, rotation: Rotation) -> Result<(), CameraError> {
        self.reconfigure(ConfigChange::new().display_rotation(rotation))
    }

    pub fn set_flash(&self, flash: Flash) -> Result<(), CameraError> {
        self.reconfigure(ConfigChange::new().flash(flash))
    }

    pub fn set_auto_focus(&self, enabled: bool) -> Result<(), CameraError> {
        self.reconfigure(ConfigChange::new().auto_focus(enabled))
    }

    pub fn set_capture_mode(&self, mode: CaptureMode) -> Result<(), CameraError> {
        self.reconfigure(ConfigChange::new().capture_mode(mode))
    }

    pub fn set_jpeg_quality(&self, quality: u8) -> Result<(), CameraError> {
        self.reconfigure(ConfigChange::new().jpeg_quality(quality))
    }

    pub fn capture(&self) -> Result<(), CameraError> {
        self.send(Command::Capture)
    }

    pub fn start_recording(
        &self,
        output: impl Into<PathBuf>,
        config: VideoConfig,
    ) -> Result<(), CameraError> {
        self.send(Command::StartRecording(output.into(), config))
    }

    pub fn stop_recording(&self) -> Result<(), CameraError> {
        self.send(Command::StopRecording)
    }

    pub fn pause_recording(&self) -> Result<(), CameraError> {
        self.send(Command::PauseRecording)
    }

    pub fn resume_recording(&self) -> Result<(), CameraError> {
        self.send(Command::ResumeRecording)
    }

    pub fn set_surface(&self, surface: Arc<dyn PreviewSurface>) -> Result<(), CameraError> {
        self.send(Command::SetSurface(surface))
    }

    pub fn surface_changed(&self) -> Result<(), CameraError> {
        self.send(Command::SurfaceChanged)
    }

    pub fn config(&self) -> Result<CameraConfig, CameraError> {
        self.query(|c| c.config().clone())
    }

    pub fn parameters(&self) -> Result<Option<DeviceParameters>, CameraError> {
        self.query(|c| c.parameters().cloned())
    }

    pub fn current_camera(&self) -> Result<Option<CameraDescriptor>, CameraError> {
        self.query(|c| c.current_camera())
    }

    pub fn supported_aspect_ratios(&self) -> Result<Vec<AspectRatio>, CameraError> {
        self.query(|c| c.supported_aspect_ratios())
    }

    pub fn camera_ids_by_facing(&self, facing: Facing) -> Result<Vec<CameraId>, CameraError> {
        self.query(move |c| c.camera_ids_by_facing(facing))
    }

    pub fn cameras(&self) -> Result<Vec<CameraDescriptor>, CameraError> {
        self.query(|c| c.cameras())
    }

    pub fn next_camera(&self) -> Result<Option<CameraId>, CameraError> {
        self.query(|c| c.next_camera())
    }

    /// Closes the camera and joins the owner thread.
    pub fn shutdown(mut self) {
        self.stop_thread();
    }

    /// Queues the shutdown behind every pending command and waits for it.
    fn stop_thread(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

fn run(mut controller: CameraController, rx: Receiver<Command>) {
    log!(debug, "session thread started");
    while let Ok(command) = rx.recv() {
        match command {
            Command::Shutdown => break,
            command => dispatch(&mut controller, command),
        }
    }
    controller.close();
    log!(debug, "session thread stopped");
}

fn dispatch(controller: &mut CameraController, command: Command) {
    match command {
        Command::Open(selector) => controller.open(selector),
        Command::StartPreview => controller.start_preview(),
        Command::StopPreview => controller.stop_preview(),
        Command::Close => controller.close(),
        Command::Reconfigure(change) => controller.reconfigure(change),
        Command::Capture => controller.capture(),
        Command::StartRecording(output, config) => controller.start_recording(output, config),
        Command::StopRecording => controller.stop_recording(),
        Command::PauseRecording => controller.pause_recording(),
        Command::ResumeRecording => controller.resume_recording(),
        Command::SetSurface(surface) => controller.set_surface(surface),
        Command::SurfaceChanged => controller.surface_changed(),
        Command::Query(f) => f(controller),
        Command::Device(message) => controller.handle_device_message(message),
        Command::Shutdown => {},
    }
}
