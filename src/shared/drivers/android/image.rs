// This is free and unencumbered software released into the public domain.

use super::{MediaResult, MediaStatus};
use core::ptr::null_mut;
use ndk_sys::{
    AImage, AImage_delete, AImage_getHeight, AImage_getNumberOfPlanes, AImage_getPlaneData,
    AImage_getPlaneRowStride, AImage_getTimestamp, AImage_getWidth,
};

#[derive(Debug)]
pub struct AndroidImage {
    pub(crate) handle: *mut AImage,
}

impl Default for AndroidImage {
    fn default() -> Self {
        Self { handle: null_mut() }
    }
}

impl Drop for AndroidImage {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { AImage_delete(self.handle) };
        }
        self.handle = null_mut();
    }
}

impl AndroidImage {
    pub fn timestamp(&self) -> MediaResult<i64> {
        let mut result = 0;
        MediaStatus::check(unsafe { AImage_getTimestamp(self.handle, &mut result) })?;
        Ok(result)
    }

    pub fn dimensions(&self) -> MediaResult<(u32, u32)> {
        let (mut width, mut height) = (0, 0);
        MediaStatus::check(unsafe { AImage_getWidth(self.handle, &mut width) })?;
        MediaStatus::check(unsafe { AImage_getHeight(self.handle, &mut height) })?;
        Ok((width as u32, height as u32))
    }

    pub fn plane_count(&self) -> MediaResult<usize> {
        let mut result = 0;
        MediaStatus::check(unsafe { AImage_getNumberOfPlanes(self.handle, &mut result) })?;
        Ok(result as usize)
    }

    pub fn row_stride(&self, plane: usize) -> MediaResult<u32> {
        let mut result = 0;
        MediaStatus::check(unsafe {
            AImage_getPlaneRowStride(self.handle, plane as _, &mut result)
        })?;
        Ok(result as u32)
    }

    /// Copies out the bytes of one plane. For JPEG images plane 0 holds the
    /// whole encoded file.
    pub fn plane_data(&self, plane: usize) -> MediaResult<Vec<u8>> {
        let mut data = null_mut();
        let mut len = 0;
        MediaStatus::check(unsafe {
            AImage_getPlaneData(self.handle, plane as _, &mut data, &mut len)
        })?;
        if data.is_null() || len <= 0 {
            return Ok(Vec::new());
        }
        Ok(unsafe { core::slice::from_raw_parts(data, len as usize) }.to_vec())
    }
}
