// This is free and unencumbered software released into the public domain.

use super::{CameraResult, CameraStatus, NativeWindow};
use core::ptr::null_mut;
use ndk_sys::{ACaptureSessionOutput, ACaptureSessionOutput_create, ACaptureSessionOutput_free};

#[derive(Debug)]
pub struct CaptureSessionOutput {
    pub(crate) handle: *mut ACaptureSessionOutput,
}

unsafe impl Send for CaptureSessionOutput {}

impl Drop for CaptureSessionOutput {
    fn drop(&mut self) {
        unsafe { ACaptureSessionOutput_free(self.handle) };
        self.handle = null_mut();
    }
}

impl CaptureSessionOutput {
    /// See: https://developer.android.com/ndk/reference/group/camera#acapturesessionoutput_create
    pub fn new(window: NativeWindow) -> CameraResult<Self> {
        let mut result = Self { handle: null_mut() };
        CameraStatus::check(unsafe { ACaptureSessionOutput_create(window.handle, &mut result.handle) })?;
        Ok(result)
    }
}
