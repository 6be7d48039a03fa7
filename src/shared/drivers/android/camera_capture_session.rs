// This is free and unencumbered software released into the public domain.

use super::{
    AndroidCameraDevice, CameraResult, CameraStatus, CaptureRequest, CaptureSessionOutputContainer,
};
use core::{ffi::c_void, mem::zeroed, ptr::null_mut};
use ndk_sys::{
    ACameraCaptureSession, ACameraCaptureSession_captureCallbacks, ACameraCaptureSession_capture,
    ACameraCaptureSession_close, ACameraCaptureSession_setRepeatingRequest,
    ACameraCaptureSession_stateCallbacks, ACameraCaptureSession_stopRepeating,
    ACameraDevice_createCaptureSession, ACameraMetadata, ACaptureRequest,
};

/// Invoked once when a one-shot capture finishes, with `true` on success.
pub type CaptureDone = Box<dyn FnOnce(bool) + Send + 'static>;

#[derive(Debug)]
pub struct CameraCaptureSession {
    handle: *mut ACameraCaptureSession,
    state_callbacks: Box<ACameraCaptureSession_stateCallbacks>,
    outputs: CaptureSessionOutputContainer,
}

unsafe impl Send for CameraCaptureSession {}

impl Drop for CameraCaptureSession {
    fn drop(&mut self) {
        self.close()
    }
}

impl CameraCaptureSession {
    /// See: https://developer.android.com/ndk/reference/group/camera#acameradevice_createcapturesession
    pub fn open(
        device: &AndroidCameraDevice,
        outputs: CaptureSessionOutputContainer,
    ) -> CameraResult<Self> {
        let mut result = Self {
            handle: null_mut(),
            state_callbacks: Box::new(unsafe { zeroed() }),
            outputs,
        };
        CameraStatus::check(unsafe {
            ACameraDevice_createCaptureSession(
                device.handle,
                result.outputs.handle,
                &*result.state_callbacks,
                &mut result.handle,
            )
        })?;
        Ok(result)
    }

    /// Submits one request; `done` runs when it completes or fails.
    pub fn capture(&mut self, request: &CaptureRequest, done: CaptureDone) -> CameraResult {
        unsafe extern "C" fn on_completed(
            context: *mut c_void,
            _session: *mut ACameraCaptureSession,
            _request: *mut ACaptureRequest,
            _result: *const ACameraMetadata,
        ) {
            let done = unsafe { Box::from_raw(context as *mut CaptureDone) };
            done(true);
        }

        unsafe extern "C" fn on_failed(
            context: *mut c_void,
            _session: *mut ACameraCaptureSession,
            _request: *mut ACaptureRequest,
            _failure: *mut ndk_sys::ACameraCaptureFailure,
        ) {
            let done = unsafe { Box::from_raw(context as *mut CaptureDone) };
            done(false);
        }

        let context = Box::into_raw(Box::new(done));
        let mut callbacks: ACameraCaptureSession_captureCallbacks = unsafe { zeroed() };
        callbacks.context = context as *mut c_void;
        callbacks.onCaptureCompleted = Some(on_completed);
        callbacks.onCaptureFailed = Some(on_failed);

        let mut requests = request.handle;
        let status = unsafe {
            ACameraCaptureSession_capture(self.handle, &mut callbacks, 1, &mut requests, null_mut())
        };
        if let Err(error) = CameraStatus::check(status) {
            drop(unsafe { Box::from_raw(context) });
            return Err(error);
        }
        Ok(())
    }

    /// See: https://developer.android.com/ndk/reference/group/camera#acameracapturesession_setrepeatingrequest
    pub fn set_repeating_request(&mut self, request: &CaptureRequest) -> CameraResult {
        let mut requests = request.handle;
        CameraStatus::check(unsafe {
            ACameraCaptureSession_setRepeatingRequest(
                self.handle,
                null_mut(),
                1,
                &mut requests,
                null_mut(),
            )
        })
    }

    /// See: https://developer.android.com/ndk/reference/group/camera#acameracapturesession_stoprepeating
    pub fn stop_repeating(&mut self) -> CameraResult {
        CameraStatus::check(unsafe { ACameraCaptureSession_stopRepeating(self.handle) })
    }

    pub fn close(&mut self) {
        if !self.handle.is_null() {
            unsafe { ACameraCaptureSession_close(self.handle) }
        }
        self.handle = null_mut();
    }
}
