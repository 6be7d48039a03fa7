// This is free and unencumbered software released into the public domain.

//! An in-memory backend with scripted capabilities.
//!
//! Stills are synthetic JPEG gradients of the negotiated picture size. Every
//! device call is counted in [`VirtualStats`], and failures can be injected
//! through [`VirtualFaults`].

use crate::shared::{
    CameraBackend, CameraDescriptor, CameraDevice, CameraDriver, CameraError, CameraId,
    DeviceEvents, DeviceParameters, Facing, Flash, FocusCallback, FocusMode, Frame,
    PictureCallback, PreviewSurface, RecordingRequest, Rotation, Size,
};
use alloc::borrow::Cow;
use bytes::Bytes;
use image::{Rgb, RgbImage, codecs::jpeg::JpegEncoder};
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread::JoinHandle,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// What one virtual camera claims to support.
#[derive(Clone, Debug, PartialEq)]
pub struct VirtualCamera {
    pub facing: Facing,
    pub sensor_orientation: Rotation,
    pub preview_sizes: Vec<Size>,
    pub picture_sizes: Vec<Size>,
    pub video_sizes: Vec<Size>,
    pub flash_modes: Vec<Flash>,
    pub focus_modes: Vec<FocusMode>,
}

impl VirtualCamera {
    pub fn new(facing: Facing, sensor_orientation: Rotation) -> Self {
        Self {
            facing,
            sensor_orientation,
            preview_sizes: Vec::new(),
            picture_sizes: Vec::new(),
            video_sizes: Vec::new(),
            flash_modes: vec![Flash::Off],
            focus_modes: vec![FocusMode::Fixed],
        }
    }

    /// A typical phone main camera.
    pub fn back() -> Self {
        Self::new(Facing::Back, Rotation::Deg90)
            .with_preview_sizes(&[
                (176, 144),
                (320, 240),
                (640, 480),
                (1280, 720),
                (1440, 1080),
                (1920, 1080),
                (1920, 1080),
                (720, 720),
            ])
            .with_picture_sizes(&[(640, 480), (1280, 720), (2048, 1536), (1920, 1080)])
            .with_video_sizes(&[(640, 480), (1280, 720), (1920, 1080)])
            .with_flash_modes(&[Flash::Off, Flash::On, Flash::Auto, Flash::Torch, Flash::RedEye])
            .with_focus_modes(&[
                FocusMode::Auto,
                FocusMode::ContinuousPicture,
                FocusMode::ContinuousVideo,
                FocusMode::Infinity,
                FocusMode::Macro,
            ])
    }

    /// A typical phone selfie camera: no flash, fixed focus.
    pub fn front() -> Self {
        Self::new(Facing::Front, Rotation::Deg270)
            .with_preview_sizes(&[(320, 240), (640, 480), (1280, 720)])
            .with_picture_sizes(&[(640, 480), (1280, 720)])
            .with_video_sizes(&[(640, 480)])
    }

    pub fn with_preview_sizes(mut self, sizes: &[(u32, u32)]) -> Self {
        self.preview_sizes = to_sizes(sizes);
        self
    }

    pub fn with_picture_sizes(mut self, sizes: &[(u32, u32)]) -> Self {
        self.picture_sizes = to_sizes(sizes);
        self
    }

    pub fn with_video_sizes(mut self, sizes: &[(u32, u32)]) -> Self {
        self.video_sizes = to_sizes(sizes);
        self
    }

    pub fn with_flash_modes(mut self, modes: &[Flash]) -> Self {
        self.flash_modes = modes.to_vec();
        self
    }

    pub fn with_focus_modes(mut self, modes: &[FocusMode]) -> Self {
        self.focus_modes = modes.to_vec();
        self
    }
}

fn to_sizes(sizes: &[(u32, u32)]) -> Vec<Size> {
    sizes
        .iter()
        .filter_map(|&(w, h)| Size::new(w as i64, h as i64).ok())
        .collect()
}

/// Call counters shared between a driver and the devices it opened.
#[derive(Debug, Default)]
pub struct VirtualStats {
    opens: AtomicUsize,
    releases: AtomicUsize,
    parameter_sets: AtomicUsize,
    preview_starts: AtomicUsize,
    preview_stops: AtomicUsize,
    focus_passes: AtomicUsize,
    captures: AtomicUsize,
    recordings: AtomicUsize,
}

impl VirtualStats {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Devices opened and not yet released.
    pub fn live_handles(&self) -> usize {
        self.opens().saturating_sub(self.releases())
    }

    pub fn parameter_sets(&self) -> usize {
        self.parameter_sets.load(Ordering::SeqCst)
    }

    pub fn preview_starts(&self) -> usize {
        self.preview_starts.load(Ordering::SeqCst)
    }

    pub fn preview_stops(&self) -> usize {
        self.preview_stops.load(Ordering::SeqCst)
    }

    pub fn focus_passes(&self) -> usize {
        self.focus_passes.load(Ordering::SeqCst)
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn recordings(&self) -> usize {
        self.recordings.load(Ordering::SeqCst)
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Failures to inject into subsequent device calls.
#[derive(Clone, Debug, Default)]
pub struct VirtualFaults {
    pub open: bool,
    pub set_parameters: bool,
    pub start_preview: bool,
    pub capture: bool,
    /// Stills complete with an error instead of data.
    pub picture: bool,
}

#[derive(Debug)]
pub struct VirtualDriver {
    cameras: Vec<VirtualCamera>,
    stats: Arc<VirtualStats>,
    faults: Arc<Mutex<VirtualFaults>>,
    deferred: bool,
    frame_interval: Option<Duration>,
}

impl Default for VirtualDriver {
    fn default() -> Self {
        Self::new(vec![VirtualCamera::back(), VirtualCamera::front()])
    }
}

impl VirtualDriver {
    pub fn new(cameras: Vec<VirtualCamera>) -> Self {
        Self {
            cameras,
            stats: Arc::default(),
            faults: Arc::default(),
            deferred: true,
            frame_interval: None,
        }
    }

    /// Completes focus and capture callbacks before the device call returns
    /// instead of on a worker thread.
    pub fn with_inline_callbacks(mut self) -> Self {
        self.deferred = false;
        self
    }

    /// Emits synthetic preview frames at this interval while previewing.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    pub fn stats(&self) -> Arc<VirtualStats> {
        Arc::clone(&self.stats)
    }

    pub fn faults(&self) -> Arc<Mutex<VirtualFaults>> {
        Arc::clone(&self.faults)
    }
}

fn faults(shared: &Mutex<VirtualFaults>) -> VirtualFaults {
    shared.lock().unwrap_or_else(|p| p.into_inner()).clone()
}

impl dogma::Named for VirtualDriver {
    fn name(&self) -> Cow<'_, str> {
        "virtual".into()
    }
}

impl CameraDriver for VirtualDriver {
    fn backend(&self) -> CameraBackend {
        CameraBackend::Virtual
    }

    fn count(&self) -> Result<usize, CameraError> {
        Ok(self.cameras.len())
    }

    fn describe(&self, index: usize) -> Result<CameraDescriptor, CameraError> {
        let camera = self.cameras.get(index).ok_or(CameraError::NoCamera)?;
        Ok(CameraDescriptor::new(
            index as CameraId,
            camera.facing,
            camera.sensor_orientation,
        ))
    }

    fn open(
        &mut self,
        id: CameraId,
        events: DeviceEvents,
    ) -> Result<Box<dyn CameraDevice>, CameraError> {
        if faults(&self.faults).open {
            return Err(CameraError::other("injected open failure"));
        }
        let camera = self
            .cameras
            .get(id as usize)
            .cloned()
            .ok_or(CameraError::NoCamera)?;
        VirtualStats::bump(&self.stats.opens);
        Ok(Box::new(VirtualDevice {
            camera,
            events,
            stats: Arc::clone(&self.stats),
            faults: Arc::clone(&self.faults),
            deferred: self.deferred,
            frame_interval: self.frame_interval,
            params: None,
            frames: None,
            recording: None,
            released: false,
        }))
    }
}

/// Background thread posting preview frames until stopped.
#[derive(Debug)]
struct FramePump {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl FramePump {
    fn spawn(events: DeviceEvents, size: Size, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop2 = Arc::clone(&stop);
        let join = std::thread::spawn(move || {
            let mut sequence: u32 = 0;
            while !stop2.load(Ordering::Relaxed) {
                events.frame(render_frame(size, sequence));
                sequence = sequence.wrapping_add(1);
                std::thread::sleep(interval);
            }
        });
        Self {
            stop,
            join: Some(join),
        }
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

#[derive(Debug)]
pub struct VirtualDevice {
    camera: VirtualCamera,
    events: DeviceEvents,
    stats: Arc<VirtualStats>,
    faults: Arc<Mutex<VirtualFaults>>,
    deferred: bool,
    frame_interval: Option<Duration>,
    params: Option<DeviceParameters>,
    frames: Option<FramePump>,
    recording: Option<RecordingRequest>,
    released: bool,
}

impl VirtualDevice {
    fn params(&self) -> Result<&DeviceParameters, CameraError> {
        self.params
            .as_ref()
            .ok_or(CameraError::IllegalState("parameters were never applied"))
    }

    fn ensure_live(&self) -> Result<(), CameraError> {
        if self.released {
            return Err(CameraError::Closed);
        }
        Ok(())
    }

    fn run(&self, job: impl FnOnce() + Send + 'static) {
        if self.deferred {
            std::thread::spawn(job);
        } else {
            job();
        }
    }
}

impl CameraDevice for VirtualDevice {
    fn supported_preview_sizes(&self) -> Vec<Size> {
        self.camera.preview_sizes.clone()
    }

    fn supported_picture_sizes(&self) -> Vec<Size> {
        self.camera.picture_sizes.clone()
    }

    fn supported_video_sizes(&self) -> Vec<Size> {
        self.camera.video_sizes.clone()
    }

    fn supported_flash_modes(&self) -> Vec<Flash> {
        self.camera.flash_modes.clone()
    }

    fn supported_focus_modes(&self) -> Vec<FocusMode> {
        self.camera.focus_modes.clone()
    }

    fn set_parameters(&mut self, params: &DeviceParameters) -> Result<(), CameraError> {
        self.ensure_live()?;
        if faults(&self.faults).set_parameters {
            return Err(CameraError::other("injected parameter rejection"));
        }
        if !self.camera.preview_sizes.contains(&params.preview_size)
            || !self.camera.picture_sizes.contains(&params.picture_size)
        {
            return Err(CameraError::invalid_config(format!(
                "preview {} / picture {} not advertised",
                params.preview_size, params.picture_size
            )));
        }
        VirtualStats::bump(&self.stats.parameter_sets);
        self.params = Some(params.clone());
        Ok(())
    }

    fn attach_surface(&mut self, surface: &Arc<dyn PreviewSurface>) -> Result<(), CameraError> {
        self.ensure_live()?;
        if !surface.is_ready() {
            return Err(CameraError::IllegalState("surface is not laid out"));
        }
        Ok(())
    }

    fn start_preview(&mut self) -> Result<(), CameraError> {
        self.ensure_live()?;
        if faults(&self.faults).start_preview {
            return Err(CameraError::other("injected preview failure"));
        }
        let size = self.params()?.preview_size;
        VirtualStats::bump(&self.stats.preview_starts);
        if let (None, Some(interval)) = (&self.frames, self.frame_interval) {
            self.frames = Some(FramePump::spawn(self.events.clone(), size, interval));
        }
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<(), CameraError> {
        VirtualStats::bump(&self.stats.preview_stops);
        if let Some(mut frames) = self.frames.take() {
            frames.stop();
        }
        Ok(())
    }

    fn auto_focus(&mut self, done: FocusCallback) -> Result<(), CameraError> {
        self.ensure_live()?;
        VirtualStats::bump(&self.stats.focus_passes);
        self.run(move || done.complete(true));
        Ok(())
    }

    fn capture_photo(&mut self, done: PictureCallback) -> Result<(), CameraError> {
        self.ensure_live()?;
        let faults = faults(&self.faults);
        if faults.capture {
            return Err(CameraError::other("injected capture failure"));
        }
        let params = self.params()?;
        let (size, quality) = (params.picture_size, params.jpeg_quality);
        VirtualStats::bump(&self.stats.captures);
        if faults.picture {
            self.run(move || done.complete(Err(CameraError::other("injected picture failure"))));
        } else {
            self.run(move || done.complete(render_jpeg(size, quality)));
        }
        Ok(())
    }

    fn start_recording(&mut self, request: &RecordingRequest) -> Result<(), CameraError> {
        self.ensure_live()?;
        if self.recording.is_some() {
            return Err(CameraError::IllegalState("already recording"));
        }
        VirtualStats::bump(&self.stats.recordings);
        self.recording = Some(request.clone());
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<(), CameraError> {
        self.recording
            .take()
            .map(|_| ())
            .ok_or(CameraError::IllegalState("not recording"))
    }

    fn pause_recording(&mut self) -> Result<(), CameraError> {
        self.recording
            .as_ref()
            .map(|_| ())
            .ok_or(CameraError::IllegalState("not recording"))
    }

    fn resume_recording(&mut self) -> Result<(), CameraError> {
        self.pause_recording()
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        if let Some(mut frames) = self.frames.take() {
            frames.stop();
        }
        self.recording = None;
        self.released = true;
        VirtualStats::bump(&self.stats.releases);
    }
}

fn render_jpeg(size: Size, quality: u8) -> Result<Bytes, CameraError> {
    let (w, h) = (size.width.max(1), size.height.max(1));
    let image = RgbImage::from_fn(size.width, size.height, |x, y| {
        Rgb([(x * 255 / w) as u8, (y * 255 / h) as u8, 0x80])
    });
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode_image(&image)
        .map_err(|e| CameraError::driver("encoding a virtual still", e))?;
    Ok(Bytes::from(out))
}

fn render_frame(size: Size, sequence: u32) -> Frame {
    let shade = (sequence % 256) as u8;
    let data: Vec<u8> = (0..size.area())
        .flat_map(|i| [(i % 256) as u8, shade, 0x40])
        .collect();
    let timestamp_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    Frame::new_rgb(data, size.width, size.height, timestamp_ns)
}
