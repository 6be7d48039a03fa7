// This is free and unencumbered software released into the public domain.

//! Android camera2 backend over the NDK.
//!
//! Preview frames come from a YUV image reader and stills from a JPEG image
//! reader, both bound into one capture session. Video recording needs
//! `MediaRecorder`, which the NDK lacks, so it is reported as unsupported.

use super::android::{
    AndroidCameraDevice, CameraCaptureSession, CameraManager, CameraMetadata, CameraOutputTarget,
    CameraStatus, CaptureRequest, CaptureSessionOutput, CaptureSessionOutputContainer, FORMAT_JPEG,
    FORMAT_YUV_420_888, ImageReader, af_mode, flash_controls,
};
use crate::shared::{
    CameraBackend, CameraDescriptor, CameraDevice, CameraDriver, CameraError, CameraId,
    DeviceEvents, DeviceParameters, Flash, FocusCallback, FocusMode, Frame, PendingPicture,
    PictureCallback, PixelFormat, Size,
};
use alloc::borrow::Cow;
use bytes::Bytes;
use ndk_sys::{ACameraDevice_request_template, acamera_metadata_tag, android_get_device_api_level};

const AF_TRIGGER_START: u8 = 1;
const AF_TRIGGER_CANCEL: u8 = 2;

/// The oldest API level whose NDK camera2 support is usable.
pub const MIN_API_LEVEL: u32 = 24;

pub fn api_level() -> u32 {
    unsafe { android_get_device_api_level() as u32 }
}

#[derive(Debug)]
pub struct Camera2Driver {
    manager: CameraManager,
    api_level: u32,
}

impl Camera2Driver {
    pub fn new() -> Result<Self, CameraError> {
        let api_level = api_level();
        if api_level < MIN_API_LEVEL {
            return Err(CameraError::unsupported(format!(
                "camera2 needs API level {MIN_API_LEVEL}, device has {api_level}"
            )));
        }
        log!(debug, api_level, "camera2 driver ready");
        Ok(Self {
            manager: CameraManager::new(),
            api_level,
        })
    }

    pub fn api_level(&self) -> u32 {
        self.api_level
    }

    fn camera_ids(&self) -> Result<Vec<String>, CameraError> {
        self.manager
            .camera_ids()
            .map_err(|e| CameraError::driver("listing cameras", e))
    }

    fn characteristics(&self, id: &str) -> Result<CameraMetadata, CameraError> {
        self.manager
            .characteristics(id)
            .map_err(|e| CameraError::driver("reading camera characteristics", e))
    }
}

impl dogma::Named for Camera2Driver {
    fn name(&self) -> Cow<'_, str> {
        "camera2".into()
    }
}

impl CameraDriver for Camera2Driver {
    fn backend(&self) -> CameraBackend {
        CameraBackend::Camera2
    }

    fn count(&self) -> Result<usize, CameraError> {
        Ok(self.camera_ids()?.len())
    }

    fn describe(&self, index: usize) -> Result<CameraDescriptor, CameraError> {
        let ids = self.camera_ids()?;
        let id = ids.get(index).ok_or(CameraError::NoCamera)?;
        let metadata = self.characteristics(id)?;
        Ok(CameraDescriptor::new(
            index as CameraId,
            metadata.facing(),
            metadata.sensor_orientation(),
        ))
    }

    fn open(
        &mut self,
        id: CameraId,
        events: DeviceEvents,
    ) -> Result<Box<dyn CameraDevice>, CameraError> {
        let ids = self.camera_ids()?;
        let name = ids.get(id as usize).ok_or(CameraError::NoCamera)?;
        let metadata = self.characteristics(name)?;
        let device = self
            .manager
            .open_camera(name, events.clone())
            .map_err(|e| CameraError::driver("opening the camera device", e))?;
        log!(debug, id, name = %name, "camera2 device opened");
        Ok(Box::new(Camera2Device {
            preview_sizes: metadata.output_sizes(FORMAT_YUV_420_888),
            picture_sizes: metadata.output_sizes(FORMAT_JPEG),
            flash_modes: metadata.flash_modes(),
            focus_modes: metadata.focus_modes(),
            events,
            params: None,
            picture: PendingPicture::default(),
            session: None,
            preview_reader: None,
            still_reader: None,
            device,
        }))
    }
}

fn status_error(context: &'static str) -> impl FnOnce(CameraStatus) -> CameraError {
    move |status| {
        if status.is_disconnected() {
            CameraError::Disconnected
        } else {
            CameraError::driver(context, status)
        }
    }
}

#[derive(Debug)]
pub struct Camera2Device {
    preview_sizes: Vec<Size>,
    picture_sizes: Vec<Size>,
    flash_modes: Vec<Flash>,
    focus_modes: Vec<FocusMode>,
    events: DeviceEvents,
    params: Option<DeviceParameters>,
    /// The still capture awaiting its JPEG.
    picture: PendingPicture,
    // drop order: the session must go before its readers and device
    session: Option<CameraCaptureSession>,
    preview_reader: Option<ImageReader>,
    still_reader: Option<ImageReader>,
    device: AndroidCameraDevice,
}

impl Camera2Device {
    fn session(&mut self) -> Result<&mut CameraCaptureSession, CameraError> {
        self.session
            .as_mut()
            .ok_or(CameraError::IllegalState("capture session not configured"))
    }

    fn rebuild_session(&mut self, params: &DeviceParameters) -> Result<(), CameraError> {
        self.session = None;
        self.preview_reader = None;
        self.still_reader = None;

        let events = self.events.clone();
        let preview_reader = ImageReader::new(
            params.preview_size,
            FORMAT_YUV_420_888,
            i32::from(params.frame_buffer_depth),
            Box::new(move |reader| match reader.acquire_next_image() {
                Ok(image) => {
                    if let Some(frame) = yuv_frame(&image) {
                        events.frame(frame);
                    }
                },
                Err(_) => {
                    log!(trace, "preview image unavailable");
                },
            }),
        )
        .map_err(|e| CameraError::driver("creating the preview reader", e))?;

        let events = self.events.clone();
        let pending = self.picture.clone();
        let still_reader = ImageReader::new(
            params.picture_size,
            FORMAT_JPEG,
            2,
            Box::new(move |reader| {
                let result = reader
                    .acquire_next_image()
                    .and_then(|image| image.plane_data(0))
                    .map(Bytes::from)
                    .map_err(|e| CameraError::driver("reading the still image", e));
                match pending.take() {
                    Some(done) => done.complete(result),
                    None => events.error(CameraError::other("still image without a capture request")),
                }
            }),
        )
        .map_err(|e| CameraError::driver("creating the still reader", e))?;

        let mut outputs = CaptureSessionOutputContainer::new()
            .map_err(status_error("creating session outputs"))?;
        for reader in [&preview_reader, &still_reader] {
            let window = reader
                .window()
                .map_err(|e| CameraError::driver("reading an image reader window", e))?;
            let output =
                CaptureSessionOutput::new(window).map_err(status_error("creating a session output"))?;
            outputs.add(output).map_err(status_error("adding a session output"))?;
        }
        let session = CameraCaptureSession::open(&self.device, outputs)
            .map_err(status_error("creating the capture session"))?;

        self.preview_reader = Some(preview_reader);
        self.still_reader = Some(still_reader);
        self.session = Some(session);
        Ok(())
    }

    /// Builds a request into one reader with the focus and flash controls applied.
    fn request(
        &self,
        template: ACameraDevice_request_template,
        still: bool,
    ) -> Result<CaptureRequest, CameraError> {
        let params = self
            .params
            .as_ref()
            .ok_or(CameraError::IllegalState("parameters were never applied"))?;
        let reader = if still { &self.still_reader } else { &self.preview_reader };
        let window = reader
            .as_ref()
            .ok_or(CameraError::IllegalState("capture session not configured"))?
            .window()
            .map_err(|e| CameraError::driver("reading an image reader window", e))?;

        let build = || -> Result<CaptureRequest, CameraStatus> {
            let mut request = CaptureRequest::new(&self.device, template)?;
            request.add_target(CameraOutputTarget::new(window)?)?;
            let (ae_mode, flash_mode) = flash_controls(params.flash);
            request.set_u8(acamera_metadata_tag::ACAMERA_CONTROL_AF_MODE, af_mode(params.focus_mode))?;
            request.set_u8(acamera_metadata_tag::ACAMERA_CONTROL_AE_MODE, ae_mode)?;
            request.set_u8(acamera_metadata_tag::ACAMERA_FLASH_MODE, flash_mode)?;
            if still {
                request.set_u8(acamera_metadata_tag::ACAMERA_JPEG_QUALITY, params.jpeg_quality)?;
                request.set_i32(
                    acamera_metadata_tag::ACAMERA_JPEG_ORIENTATION,
                    params.capture_rotation.degrees() as i32,
                )?;
            }
            Ok(request)
        };
        build().map_err(status_error("building a capture request"))
    }

    fn trigger_focus(&mut self, trigger: u8, done: impl FnOnce(bool) + Send + 'static) -> Result<(), CameraError> {
        let mut request = self.request(ACameraDevice_request_template::TEMPLATE_PREVIEW, false)?;
        request
            .set_u8(acamera_metadata_tag::ACAMERA_CONTROL_AF_TRIGGER, trigger)
            .map_err(status_error("setting the focus trigger"))?;
        self.session()?
            .capture(&request, Box::new(done))
            .map_err(status_error("triggering focus"))
    }
}

impl CameraDevice for Camera2Device {
    fn supported_preview_sizes(&self) -> Vec<Size> {
        self.preview_sizes.clone()
    }

    fn supported_picture_sizes(&self) -> Vec<Size> {
        self.picture_sizes.clone()
    }

    fn supported_flash_modes(&self) -> Vec<Flash> {
        self.flash_modes.clone()
    }

    fn supported_focus_modes(&self) -> Vec<FocusMode> {
        self.focus_modes.clone()
    }

    fn set_parameters(&mut self, params: &DeviceParameters) -> Result<(), CameraError> {
        let resized = self.params.as_ref().is_none_or(|old| {
            old.preview_size != params.preview_size || old.picture_size != params.picture_size
        });
        if resized || self.session.is_none() {
            self.rebuild_session(params)?;
        }
        self.params = Some(params.clone());
        Ok(())
    }

    fn start_preview(&mut self) -> Result<(), CameraError> {
        let request = self.request(ACameraDevice_request_template::TEMPLATE_PREVIEW, false)?;
        self.session()?
            .set_repeating_request(&request)
            .map_err(status_error("starting the preview"))
    }

    fn stop_preview(&mut self) -> Result<(), CameraError> {
        match self.session.as_mut() {
            Some(session) => session
                .stop_repeating()
                .map_err(status_error("stopping the preview")),
            None => Ok(()),
        }
    }

    fn auto_focus(&mut self, done: FocusCallback) -> Result<(), CameraError> {
        self.trigger_focus(AF_TRIGGER_START, move |ok| done.complete(ok))
    }

    fn cancel_auto_focus(&mut self) -> Result<(), CameraError> {
        if self.session.is_none() {
            return Ok(());
        }
        self.trigger_focus(AF_TRIGGER_CANCEL, |_| {})
    }

    fn capture_photo(&mut self, done: PictureCallback) -> Result<(), CameraError> {
        let request = self.request(ACameraDevice_request_template::TEMPLATE_STILL_CAPTURE, true)?;
        let session = self
            .session
            .as_mut()
            .ok_or(CameraError::IllegalState("capture session not configured"))?;
        let pending = self.picture.clone();
        self.picture.arm(done, move || {
            session
                .capture(
                    &request,
                    Box::new(move |ok| {
                        if ok {
                            return;
                        }
                        if let Some(done) = pending.take() {
                            done.complete(Err(CameraError::other("still capture failed")));
                        }
                    }),
                )
                .map_err(status_error("capturing a still"))
        })
    }

    fn release(&mut self) {
        self.session = None;
        self.preview_reader = None;
        self.still_reader = None;
        self.picture.take();
        if let Err(_status) = self.device.close() {
            log!(warn, status = %_status, "closing the camera device failed");
        }
    }
}

fn yuv_frame(image: &super::android::AndroidImage) -> Option<Frame> {
    let (width, height) = image.dimensions().ok()?;
    let stride = image.row_stride(0).ok()?;
    let mut data = Vec::new();
    for plane in 0..image.plane_count().ok()? {
        data.extend_from_slice(&image.plane_data(plane).ok()?);
    }
    Some(Frame {
        data: data.into(),
        width,
        height,
        stride,
        pixel_format: PixelFormat::Yuv420,
        timestamp_ns: image.timestamp().ok()?.max(0) as u64,
        rotation: Default::default(),
    })
}
