// This is free and unencumbered software released into the public domain.

use super::{AndroidImage, MediaResult, MediaStatus, NativeWindow};
use crate::shared::Size;
use core::{ffi::c_void, ptr::null_mut};
use ndk_sys::{
    AImageReader, AImageReader_ImageListener, AImageReader_acquireNextImage, AImageReader_delete,
    AImageReader_getWindow, AImageReader_new, AImageReader_setImageListener,
};

pub type ImageHandler = Box<dyn Fn(&ImageReader) + Send + Sync + 'static>;

/// An `AImageReader` delivering each new image to a handler on an NDK thread.
pub struct ImageReader {
    pub(crate) handle: *mut AImageReader,
    handler: *mut ImageHandler,
}

unsafe impl Send for ImageReader {}

impl core::fmt::Debug for ImageReader {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ImageReader").field("handle", &self.handle).finish()
    }
}

impl Drop for ImageReader {
    fn drop(&mut self) {
        unsafe { AImageReader_delete(self.handle) };
        self.handle = null_mut();
        if !self.handler.is_null() {
            drop(unsafe { Box::from_raw(self.handler) });
            self.handler = null_mut();
        }
    }
}

impl ImageReader {
    /// See: https://developer.android.com/ndk/reference/group/media#aimagereader_new
    pub fn new(size: Size, format: i32, max_images: i32, handler: ImageHandler) -> MediaResult<Self> {
        let mut result = Self {
            handle: null_mut(),
            handler: Box::into_raw(Box::new(handler)),
        };
        MediaStatus::check(unsafe {
            AImageReader_new(
                size.width as _,
                size.height as _,
                format,
                max_images,
                &mut result.handle,
            )
        })?;

        unsafe extern "C" fn on_image_available(context: *mut c_void, reader: *mut AImageReader) {
            let handler = unsafe { &*(context as *const ImageHandler) };
            let reader = core::mem::ManuallyDrop::new(ImageReader {
                handle: reader,
                handler: null_mut(),
            });
            handler(&reader);
        }
        let mut listener = AImageReader_ImageListener {
            context: result.handler as *mut c_void,
            onImageAvailable: Some(on_image_available),
        };
        MediaStatus::check(unsafe { AImageReader_setImageListener(result.handle, &mut listener) })?;
        Ok(result)
    }

    /// See: https://developer.android.com/ndk/reference/group/media#aimagereader_getwindow
    pub fn window(&self) -> MediaResult<NativeWindow> {
        let mut handle = null_mut();
        MediaStatus::check(unsafe { AImageReader_getWindow(self.handle, &mut handle) })?;
        Ok(NativeWindow { handle })
    }

    pub fn acquire_next_image(&self) -> MediaResult<AndroidImage> {
        let mut result = AndroidImage::default();
        MediaStatus::check(unsafe { AImageReader_acquireNextImage(self.handle, &mut result.handle) })?;
        Ok(result)
    }
}
