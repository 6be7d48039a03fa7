// This is free and unencumbered software released into the public domain.

use super::{AndroidCameraDevice, CameraMetadata, CameraResult, CameraStatus};
use crate::shared::DeviceEvents;
use alloc::ffi::CString;
use core::{ffi::CStr, ptr::null_mut};
use ndk_sys::{
    ACameraManager, ACameraManager_create, ACameraManager_delete,
    ACameraManager_deleteCameraIdList, ACameraManager_getCameraCharacteristics,
    ACameraManager_getCameraIdList, ACameraManager_openCamera, camera_status_t,
};
use scopeguard::defer;

#[derive(Debug)]
pub struct CameraManager {
    pub(crate) handle: *mut ACameraManager,
}

// The NDK camera manager is thread-safe.
unsafe impl Send for CameraManager {}

impl Drop for CameraManager {
    fn drop(&mut self) {
        unsafe {
            ACameraManager_delete(self.handle);
        }
        self.handle = null_mut();
    }
}

impl CameraManager {
    pub fn new() -> Self {
        Self {
            handle: unsafe { ACameraManager_create() },
        }
    }

    /// See: https://developer.android.com/ndk/reference/group/camera#acameramanager_getcameraidlist
    pub fn camera_ids(&self) -> CameraResult<Vec<String>> {
        let mut list_ptr = null_mut();
        CameraStatus::check(unsafe { ACameraManager_getCameraIdList(self.handle, &mut list_ptr) })?;
        defer! {
            unsafe { ACameraManager_deleteCameraIdList(list_ptr); }
        }

        let list = unsafe { &*list_ptr };
        if list.numCameras < 1 {
            return Ok(Vec::new());
        }
        let ids = unsafe { core::slice::from_raw_parts(list.cameraIds, list.numCameras as usize) };
        Ok(ids
            .iter()
            .map(|p| unsafe { CStr::from_ptr(*p) }.to_string_lossy().into_owned())
            .collect())
    }

    /// See: https://developer.android.com/ndk/reference/group/camera#acameramanager_getcameracharacteristics
    pub fn characteristics(&self, id: &str) -> CameraResult<CameraMetadata> {
        let id = camera_id(id)?;
        let mut result = CameraMetadata::default();
        CameraStatus::check(unsafe {
            ACameraManager_getCameraCharacteristics(self.handle, id.as_ptr(), &mut result.handle)
        })?;
        Ok(result)
    }

    /// See: https://developer.android.com/ndk/reference/group/camera#acameramanager_opencamera
    pub fn open_camera(&self, id: &str, events: DeviceEvents) -> CameraResult<AndroidCameraDevice> {
        let id = camera_id(id)?;
        let mut device = AndroidCameraDevice::new(events);
        CameraStatus::check(unsafe {
            ACameraManager_openCamera(
                self.handle,
                id.as_ptr(),
                &mut *device.state_callbacks,
                &mut device.handle,
            )
        })?;
        Ok(device)
    }
}

fn camera_id(id: &str) -> CameraResult<CString> {
    CString::new(id).map_err(|_| CameraStatus(camera_status_t::ACAMERA_ERROR_INVALID_PARAMETER))
}
