// This is free and unencumbered software released into the public domain.

use super::{CameraResult, CameraStatus, CaptureSessionOutput};
use core::ptr::null_mut;
use ndk_sys::{
    ACaptureSessionOutputContainer, ACaptureSessionOutputContainer_add,
    ACaptureSessionOutputContainer_create, ACaptureSessionOutputContainer_free,
};

/// Session outputs. Owns the outputs added to it, which must outlive the
/// container.
#[derive(Debug)]
pub struct CaptureSessionOutputContainer {
    pub(crate) handle: *mut ACaptureSessionOutputContainer,
    outputs: Vec<CaptureSessionOutput>,
}

unsafe impl Send for CaptureSessionOutputContainer {}

impl Drop for CaptureSessionOutputContainer {
    fn drop(&mut self) {
        // See: https://developer.android.com/ndk/reference/group/camera#acapturesessionoutputcontainer_free
        unsafe { ACaptureSessionOutputContainer_free(self.handle) };
        self.handle = null_mut();
        self.outputs.clear();
    }
}

impl CaptureSessionOutputContainer {
    /// See: https://developer.android.com/ndk/reference/group/camera#acapturesessionoutputcontainer_create
    pub fn new() -> CameraResult<Self> {
        let mut result = Self {
            handle: null_mut(),
            outputs: Vec::new(),
        };
        CameraStatus::check(unsafe { ACaptureSessionOutputContainer_create(&mut result.handle) })?;
        Ok(result)
    }

    /// See: https://developer.android.com/ndk/reference/group/camera#acapturesessionoutputcontainer_add
    pub fn add(&mut self, output: CaptureSessionOutput) -> CameraResult {
        CameraStatus::check(unsafe { ACaptureSessionOutputContainer_add(self.handle, output.handle) })?;
        self.outputs.push(output);
        Ok(())
    }
}
