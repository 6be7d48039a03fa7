// This is free and unencumbered software released into the public domain.

use crate::shared::{Facing, Flash, FocusMode, Rotation, Size};
use core::{mem::zeroed, ptr::null_mut};
use ndk_sys::{
    ACameraMetadata, ACameraMetadata_const_entry, ACameraMetadata_free,
    ACameraMetadata_getConstEntry, acamera_metadata_tag, camera_status_t,
};

pub(crate) const FORMAT_JPEG: i32 = 0x100;
pub(crate) const FORMAT_YUV_420_888: i32 = 0x23;

const LENS_FACING_FRONT: u8 = 0;
const LENS_FACING_BACK: u8 = 1;

const AF_MODE_AUTO: u8 = 1;
const AF_MODE_MACRO: u8 = 2;
const AF_MODE_CONTINUOUS_VIDEO: u8 = 3;
const AF_MODE_CONTINUOUS_PICTURE: u8 = 4;

/// Static characteristics of one camera.
#[derive(Debug)]
pub struct CameraMetadata {
    pub(crate) handle: *mut ACameraMetadata,
}

impl Default for CameraMetadata {
    fn default() -> Self {
        Self { handle: null_mut() }
    }
}

impl Drop for CameraMetadata {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { ACameraMetadata_free(self.handle) };
        }
        self.handle = null_mut();
    }
}

impl CameraMetadata {
    fn entry(&self, tag: acamera_metadata_tag) -> Option<ACameraMetadata_const_entry> {
        let mut entry: ACameraMetadata_const_entry = unsafe { zeroed() };
        let status = unsafe { ACameraMetadata_getConstEntry(self.handle, tag.0, &mut entry) };
        (status == camera_status_t::ACAMERA_OK && entry.count > 0).then_some(entry)
    }

    fn u8s(&self, tag: acamera_metadata_tag) -> Vec<u8> {
        self.entry(tag)
            .map(|e| unsafe { core::slice::from_raw_parts(e.data.u8_, e.count as usize) }.to_vec())
            .unwrap_or_default()
    }

    fn i32s(&self, tag: acamera_metadata_tag) -> Vec<i32> {
        self.entry(tag)
            .map(|e| unsafe { core::slice::from_raw_parts(e.data.i32_, e.count as usize) }.to_vec())
            .unwrap_or_default()
    }

    pub fn facing(&self) -> Facing {
        match self.u8s(acamera_metadata_tag::ACAMERA_LENS_FACING).first() {
            Some(&LENS_FACING_FRONT) => Facing::Front,
            Some(&LENS_FACING_BACK) => Facing::Back,
            _ => Facing::External,
        }
    }

    pub fn sensor_orientation(&self) -> Rotation {
        self.i32s(acamera_metadata_tag::ACAMERA_SENSOR_ORIENTATION)
            .first()
            .and_then(|&degrees| Rotation::from_degrees(degrees).ok())
            .unwrap_or_default()
    }

    /// Output sizes for an image format, from the stream configuration table.
    pub fn output_sizes(&self, format: i32) -> Vec<Size> {
        self.i32s(acamera_metadata_tag::ACAMERA_SCALER_AVAILABLE_STREAM_CONFIGURATIONS)
            .chunks_exact(4)
            // [format, width, height, is_input]
            .filter(|c| c[0] == format && c[3] == 0)
            .filter_map(|c| Size::new(c[1] as i64, c[2] as i64).ok())
            .collect()
    }

    pub fn flash_modes(&self) -> Vec<Flash> {
        let available = self
            .u8s(acamera_metadata_tag::ACAMERA_FLASH_INFO_AVAILABLE)
            .first()
            .is_some_and(|&v| v != 0);
        if available {
            vec![Flash::Off, Flash::On, Flash::Torch, Flash::Auto, Flash::RedEye]
        } else {
            vec![Flash::Off]
        }
    }

    pub fn focus_modes(&self) -> Vec<FocusMode> {
        let modes: Vec<FocusMode> = self
            .u8s(acamera_metadata_tag::ACAMERA_CONTROL_AF_AVAILABLE_MODES)
            .into_iter()
            .filter_map(|mode| match mode {
                AF_MODE_AUTO => Some(FocusMode::Auto),
                AF_MODE_MACRO => Some(FocusMode::Macro),
                AF_MODE_CONTINUOUS_VIDEO => Some(FocusMode::ContinuousVideo),
                AF_MODE_CONTINUOUS_PICTURE => Some(FocusMode::ContinuousPicture),
                _ => None,
            })
            .collect();
        if modes.is_empty() {
            vec![FocusMode::Fixed]
        } else {
            modes
        }
    }
}

/// Camera2 value of `CONTROL_AF_MODE` for a focus mode.
pub(crate) fn af_mode(mode: Option<FocusMode>) -> u8 {
    match mode {
        Some(FocusMode::Auto) => AF_MODE_AUTO,
        Some(FocusMode::Macro) => AF_MODE_MACRO,
        Some(FocusMode::ContinuousVideo) => AF_MODE_CONTINUOUS_VIDEO,
        Some(FocusMode::ContinuousPicture) => AF_MODE_CONTINUOUS_PICTURE,
        Some(FocusMode::Fixed | FocusMode::Infinity) | None => 0,
    }
}

/// Camera2 values of `CONTROL_AE_MODE` and `FLASH_MODE` for a flash mode.
pub(crate) fn flash_controls(flash: Flash) -> (u8, u8) {
    match flash {
        Flash::Off => (1, 0),
        Flash::On => (3, 0),
        Flash::Auto => (2, 0),
        Flash::RedEye => (4, 0),
        Flash::Torch => (1, 2),
    }
}
