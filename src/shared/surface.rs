// This is free and unencumbered software released into the public domain.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

/// The view the preview is rendered into. Owned by the host.
pub trait PreviewSurface: Send + Sync {
    /// Whether the surface has been laid out and can be bound.
    fn is_ready(&self) -> bool;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// A surface whose state the host updates from its layout callbacks.
///
/// After calling [`Viewport::resize`] the host should notify the session with
/// `surface_changed()` so sizes get renegotiated.
#[derive(Debug, Default)]
pub struct Viewport {
    ready: AtomicBool,
    // width in the high half, height in the low half
    dimensions: AtomicU64,
}

impl Viewport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_size(width: u32, height: u32) -> Arc<Self> {
        let viewport = Self::new();
        viewport.resize(width, height);
        viewport
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.dimensions
            .store(((width as u64) << 32) | height as u64, Ordering::Release);
        self.ready.store(width > 0 && height > 0, Ordering::Release);
    }

    pub fn invalidate(&self) {
        self.ready.store(false, Ordering::Release);
    }

    fn dimensions(&self) -> (u32, u32) {
        let packed = self.dimensions.load(Ordering::Acquire);
        ((packed >> 32) as u32, packed as u32)
    }
}

impl PreviewSurface for Viewport {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }
}
