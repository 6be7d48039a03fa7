// This is free and unencumbered software released into the public domain.

use super::{CameraResult, CameraStatus};
use crate::shared::{CameraError, DeviceEvents};
use core::{
    ffi::{c_int, c_void},
    ptr::null_mut,
};
use ndk_sys::{ACameraDevice, ACameraDevice_StateCallbacks, ACameraDevice_close};

/// An open `ACameraDevice`. State callbacks are forwarded to the session as
/// device events.
#[derive(Debug)]
pub struct AndroidCameraDevice {
    pub(crate) handle: *mut ACameraDevice,
    pub(crate) state_callbacks: Box<ACameraDevice_StateCallbacks>,
    events: *mut DeviceEvents,
}

unsafe impl Send for AndroidCameraDevice {}

impl Drop for AndroidCameraDevice {
    fn drop(&mut self) {
        let _ = self.close();
        if !self.events.is_null() {
            drop(unsafe { Box::from_raw(self.events) });
            self.events = null_mut();
        }
    }
}

impl AndroidCameraDevice {
    pub(crate) fn new(events: DeviceEvents) -> Self {
        unsafe extern "C" fn on_disconnected(context: *mut c_void, _device: *mut ACameraDevice) {
            let events = unsafe { &*(context as *const DeviceEvents) };
            events.disconnected();
        }

        unsafe extern "C" fn on_error(context: *mut c_void, _device: *mut ACameraDevice, error: c_int) {
            let events = unsafe { &*(context as *const DeviceEvents) };
            events.error(CameraError::other(format!("camera device error {error}")));
        }

        let events = Box::into_raw(Box::new(events));
        Self {
            handle: null_mut(),
            state_callbacks: Box::new(ACameraDevice_StateCallbacks {
                context: events as *mut c_void,
                onDisconnected: Some(on_disconnected),
                onError: Some(on_error),
            }),
            events,
        }
    }

    /// See: https://developer.android.com/ndk/reference/group/camera#acameradevice_close
    pub fn close(&mut self) -> CameraResult {
        if self.handle.is_null() {
            return Ok(());
        }
        let status = unsafe { ACameraDevice_close(self.handle) };
        self.handle = null_mut();
        CameraStatus::check(status)
    }
}
