// This is free and unencumbered software released into the public domain.

//! The seam between the session controller and camera backends.

use crate::shared::{
    CameraDescriptor, CameraError, CameraId, Flash, FocusMode, Frame, PreviewSurface, Rotation,
    Size, VideoConfig,
};
use bytes::Bytes;
use derive_more::Display;
use std::{
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
};

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum CameraBackend {
    #[display("camera2")]
    Camera2,
    #[display("virtual")]
    Virtual,
}

/// Device enumeration and acquisition for one backend.
pub trait CameraDriver: dogma::Named + Send {
    fn backend(&self) -> CameraBackend;

    /// Number of cameras currently present.
    fn count(&self) -> Result<usize, CameraError>;

    /// Describes the camera at `index` (`0..count()`).
    fn describe(&self, index: usize) -> Result<CameraDescriptor, CameraError>;

    /// Acquires the device. Asynchronous notifications go through `events`.
    fn open(
        &mut self,
        id: CameraId,
        events: DeviceEvents,
    ) -> Result<Box<dyn CameraDevice>, CameraError>;
}

/// An open camera. Exclusively owned by one controller; never touched
/// concurrently.
pub trait CameraDevice: Send {
    fn supported_preview_sizes(&self) -> Vec<Size>;

    fn supported_picture_sizes(&self) -> Vec<Size>;

    fn supported_video_sizes(&self) -> Vec<Size> {
        Vec::new()
    }

    fn supported_flash_modes(&self) -> Vec<Flash> {
        vec![Flash::Off]
    }

    fn supported_focus_modes(&self) -> Vec<FocusMode> {
        vec![FocusMode::Fixed]
    }

    /// Applies a complete parameter set. Called with preview stopped.
    fn set_parameters(&mut self, params: &DeviceParameters) -> Result<(), CameraError>;

    fn attach_surface(&mut self, _surface: &Arc<dyn PreviewSurface>) -> Result<(), CameraError> {
        Ok(())
    }

    fn start_preview(&mut self) -> Result<(), CameraError>;

    fn stop_preview(&mut self) -> Result<(), CameraError>;

    /// Runs one focus pass and reports through `done`.
    fn auto_focus(&mut self, done: FocusCallback) -> Result<(), CameraError> {
        done.complete(true);
        Ok(())
    }

    fn cancel_auto_focus(&mut self) -> Result<(), CameraError> {
        Ok(())
    }

    /// Takes a still picture and reports the encoded bytes through `done`.
    /// The device must not be asked for a second picture before `done` fires.
    fn capture_photo(&mut self, done: PictureCallback) -> Result<(), CameraError>;

    fn start_recording(&mut self, _request: &RecordingRequest) -> Result<(), CameraError> {
        Err(CameraError::unsupported("video recording"))
    }

    fn stop_recording(&mut self) -> Result<(), CameraError> {
        Err(CameraError::unsupported("video recording"))
    }

    fn pause_recording(&mut self) -> Result<(), CameraError> {
        Err(CameraError::unsupported("pausing a recording"))
    }

    fn resume_recording(&mut self) -> Result<(), CameraError> {
        Err(CameraError::unsupported("resuming a recording"))
    }

    /// Frees the device. Must not fail; called exactly once.
    fn release(&mut self);
}

/// Everything the device needs for one configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceParameters {
    pub preview_size: Size,
    pub picture_size: Size,
    pub video_size: Size,
    pub display_rotation: Rotation,
    pub capture_rotation: Rotation,
    pub flash: Flash,
    pub focus_mode: Option<FocusMode>,
    pub jpeg_quality: u8,
    pub frame_buffer_depth: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordingRequest {
    pub output: PathBuf,
    pub size: Size,
    pub orientation_hint: Rotation,
    pub config: VideoConfig,
}

/// Device-originated notifications.
#[derive(Debug)]
pub enum DeviceEvent {
    FocusCompleted { success: bool },
    PictureTaken(Result<Bytes, CameraError>),
    Frame(Frame),
    Error(CameraError),
    Disconnected,
}

/// A device event stamped with the open that produced it.
#[derive(Debug)]
pub struct DeviceMessage {
    pub(crate) generation: u64,
    pub(crate) event: DeviceEvent,
}

pub(crate) type Marshal = Arc<dyn Fn(DeviceMessage) + Send + Sync + 'static>;

/// Posts device notifications back to the owning controller, from any thread.
#[derive(Clone)]
pub struct DeviceEvents {
    generation: u64,
    marshal: Marshal,
}

impl core::fmt::Debug for DeviceEvents {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceEvents")
            .field("generation", &self.generation)
            .finish()
    }
}

impl DeviceEvents {
    pub(crate) fn new(generation: u64, marshal: Marshal) -> Self {
        Self {
            generation,
            marshal,
        }
    }

    /// Events that go nowhere, for probing a device outside a session.
    pub fn detached() -> Self {
        Self::new(0, Arc::new(|_: DeviceMessage| {}))
    }

    pub fn post(&self, event: DeviceEvent) {
        (self.marshal)(DeviceMessage {
            generation: self.generation,
            event,
        });
    }

    pub fn frame(&self, frame: Frame) {
        self.post(DeviceEvent::Frame(frame));
    }

    pub fn error(&self, error: CameraError) {
        self.post(DeviceEvent::Error(error));
    }

    pub fn disconnected(&self) {
        self.post(DeviceEvent::Disconnected);
    }

    pub(crate) fn picture_callback(&self) -> PictureCallback {
        PictureCallback(self.clone())
    }

    pub(crate) fn focus_callback(&self) -> FocusCallback {
        FocusCallback(self.clone())
    }
}

/// Completion of one still capture. Consumed on use.
#[derive(Debug)]
pub struct PictureCallback(DeviceEvents);

impl PictureCallback {
    pub fn complete(self, result: Result<Bytes, CameraError>) {
        self.0.post(DeviceEvent::PictureTaken(result));
    }
}

/// Completion of one focus pass. Consumed on use.
#[derive(Debug)]
pub struct FocusCallback(DeviceEvents);

impl FocusCallback {
    pub fn complete(self, success: bool) {
        self.0.post(DeviceEvent::FocusCompleted { success });
    }
}

/// The single still capture a device may have outstanding.
#[derive(Clone, Debug, Default)]
pub struct PendingPicture(Arc<Mutex<Option<PictureCallback>>>);

impl PendingPicture {
    /// Holds `done` while `issue` submits the capture. The slot is freed again
    /// if `issue` fails.
    pub fn arm(
        &self,
        done: PictureCallback,
        issue: impl FnOnce() -> Result<(), CameraError>,
    ) -> Result<(), CameraError> {
        {
            let mut slot = self.slot();
            if slot.is_some() {
                return Err(CameraError::CaptureInProgress);
            }
            *slot = Some(done);
        }
        issue().inspect_err(|_| {
            self.take();
        })
    }

    pub fn is_armed(&self) -> bool {
        self.slot().is_some()
    }

    pub fn take(&self) -> Option<PictureCallback> {
        self.slot().take()
    }

    fn slot(&self) -> MutexGuard<'_, Option<PictureCallback>> {
        self.0.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    fn events() -> (DeviceEvents, std::sync::mpsc::Receiver<DeviceMessage>) {
        let (tx, rx) = channel();
        let marshal: Marshal = Arc::new(move |message| {
            let _ = tx.send(message);
        });
        (DeviceEvents::new(3, marshal), rx)
    }

    #[test]
    fn pending_picture_rejects_overlap() {
        let (events, rx) = events();
        let pending = PendingPicture::default();
        pending.arm(events.picture_callback(), || Ok(())).unwrap();
        assert!(matches!(
            pending.arm(events.picture_callback(), || Ok(())),
            Err(CameraError::CaptureInProgress)
        ));

        pending.take().unwrap().complete(Ok(Bytes::from_static(b"jpeg")));
        let message = rx.try_recv().unwrap();
        assert_eq!(message.generation, 3);
        assert!(matches!(message.event, DeviceEvent::PictureTaken(Ok(_))));
        assert!(!pending.is_armed());
    }

    #[test]
    fn failed_submission_frees_the_slot() {
        let (events, rx) = events();
        let pending = PendingPicture::default();
        let result = pending.arm(events.picture_callback(), || {
            Err(CameraError::IllegalState("capture session not configured"))
        });
        assert!(matches!(result, Err(CameraError::IllegalState(_))));
        assert!(!pending.is_armed());
        assert!(rx.try_recv().is_err());

        pending.arm(events.picture_callback(), || Ok(())).unwrap();
        assert!(pending.is_armed());
    }
}
