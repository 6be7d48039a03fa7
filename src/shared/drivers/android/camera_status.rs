// This is free and unencumbered software released into the public domain.

use derive_more::Display;
use ndk_sys::camera_status_t;

pub type CameraResult<T = ()> = core::result::Result<T, CameraStatus>;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[display("camera status {}", _0.0)]
pub struct CameraStatus(pub(crate) camera_status_t);

impl core::error::Error for CameraStatus {}

impl CameraStatus {
    pub(crate) fn check(status: camera_status_t) -> CameraResult {
        if status == camera_status_t::ACAMERA_OK {
            Ok(())
        } else {
            Err(Self(status))
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.0 == camera_status_t::ACAMERA_ERROR_CAMERA_DISCONNECTED
    }
}

impl From<camera_status_t> for CameraStatus {
    fn from(input: camera_status_t) -> Self {
        Self(input)
    }
}
