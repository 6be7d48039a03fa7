// This is free and unencumbered software released into the public domain.

use ndk_sys::ANativeWindow;

/// A window owned by an [`ImageReader`](super::ImageReader). Never released
/// directly; it lives as long as the reader.
#[derive(Clone, Copy, Debug)]
pub struct NativeWindow {
    pub(crate) handle: *mut ANativeWindow,
}
