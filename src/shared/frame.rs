// This is free and unencumbered software released into the public domain.

use super::Rotation;
use bytes::Bytes;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Bgra8,
    Nv21,
    Yuv420,
}

/// One preview frame as delivered by a backend.
#[derive(Clone, Debug)]
pub struct Frame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub pixel_format: PixelFormat,
    pub timestamp_ns: u64,
    /// How far the frame must be turned to appear upright.
    pub rotation: Rotation,
}

impl Frame {
    pub fn new_rgb(data: impl Into<Bytes>, width: u32, height: u32, timestamp_ns: u64) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            stride: width.saturating_mul(3),
            pixel_format: PixelFormat::Rgb8,
            timestamp_ns,
            rotation: Rotation::Deg0,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }
}
