// This is free and unencumbered software released into the public domain.

use super::{AndroidCameraDevice, CameraOutputTarget, CameraResult, CameraStatus};
use core::ptr::null_mut;
use ndk_sys::{
    ACameraDevice_createCaptureRequest, ACameraDevice_request_template, ACaptureRequest,
    ACaptureRequest_addTarget, ACaptureRequest_free, ACaptureRequest_setEntry_i32,
    ACaptureRequest_setEntry_u8, acamera_metadata_tag,
};

#[derive(Debug)]
pub struct CaptureRequest {
    pub(crate) handle: *mut ACaptureRequest,
    targets: Vec<CameraOutputTarget>,
}

unsafe impl Send for CaptureRequest {}

impl Drop for CaptureRequest {
    fn drop(&mut self) {
        unsafe { ACaptureRequest_free(self.handle) }
        self.handle = null_mut();
        self.targets.clear();
    }
}

impl CaptureRequest {
    /// See: https://developer.android.com/ndk/reference/group/camera#acameradevice_createcapturerequest
    pub fn new(
        device: &AndroidCameraDevice,
        template: ACameraDevice_request_template,
    ) -> CameraResult<Self> {
        let mut result = Self {
            handle: null_mut(),
            targets: Vec::new(),
        };
        CameraStatus::check(unsafe {
            ACameraDevice_createCaptureRequest(device.handle, template, &mut result.handle)
        })?;
        Ok(result)
    }

    pub fn add_target(&mut self, target: CameraOutputTarget) -> CameraResult {
        CameraStatus::check(unsafe { ACaptureRequest_addTarget(self.handle, target.handle) })?;
        self.targets.push(target);
        Ok(())
    }

    pub fn set_u8(&mut self, tag: acamera_metadata_tag, value: u8) -> CameraResult {
        CameraStatus::check(unsafe { ACaptureRequest_setEntry_u8(self.handle, tag.0, 1, &value) })
    }

    pub fn set_i32(&mut self, tag: acamera_metadata_tag, value: i32) -> CameraResult {
        CameraStatus::check(unsafe { ACaptureRequest_setEntry_i32(self.handle, tag.0, 1, &value) })
    }
}
