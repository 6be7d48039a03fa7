// This is free and unencumbered software released into the public domain.

use super::CameraError;
use core::str::FromStr;
use derive_more::Display;

/// Which way a lens points relative to the device screen.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Facing {
    #[default]
    #[display("back")]
    Back,
    #[display("front")]
    Front,
    #[display("external")]
    External,
}

impl Facing {
    /// Cycle order used when stepping through cameras.
    pub const ALL: [Facing; 3] = [Facing::Back, Facing::Front, Facing::External];
}

impl FromStr for Facing {
    type Err = CameraError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "back" | "rear" => Ok(Facing::Back),
            "front" | "user" => Ok(Facing::Front),
            "external" => Ok(Facing::External),
            other => Err(CameraError::invalid_config(format!(
                "unknown facing {other:?}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
pub enum Flash {
    #[default]
    #[display("off")]
    Off,
    #[display("on")]
    On,
    #[display("torch")]
    Torch,
    #[display("auto")]
    Auto,
    #[display("red-eye")]
    RedEye,
}

impl FromStr for Flash {
    type Err = CameraError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Flash::Off),
            "on" => Ok(Flash::On),
            "torch" => Ok(Flash::Torch),
            "auto" => Ok(Flash::Auto),
            "red-eye" | "redeye" => Ok(Flash::RedEye),
            other => Err(CameraError::invalid_config(format!(
                "unknown flash mode {other:?}"
            ))),
        }
    }
}

/// Focus modes a device may advertise.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum FocusMode {
    #[display("continuous-picture")]
    ContinuousPicture,
    #[display("continuous-video")]
    ContinuousVideo,
    #[display("auto")]
    Auto,
    #[display("macro")]
    Macro,
    #[display("fixed")]
    Fixed,
    #[display("infinity")]
    Infinity,
}

impl FocusMode {
    pub fn is_continuous(&self) -> bool {
        matches!(self, FocusMode::ContinuousPicture | FocusMode::ContinuousVideo)
    }
}

#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
pub enum CaptureMode {
    /// Still pictures on request.
    #[default]
    #[display("single")]
    SingleCapture,
    /// Preview frames are forwarded to the host as they arrive.
    #[display("continuous")]
    ContinuousFrame,
    #[display("video")]
    VideoCapture,
}

impl FromStr for CaptureMode {
    type Err = CameraError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "single" | "still" => Ok(CaptureMode::SingleCapture),
            "continuous" | "frames" => Ok(CaptureMode::ContinuousFrame),
            "video" => Ok(CaptureMode::VideoCapture),
            other => Err(CameraError::invalid_config(format!(
                "unknown capture mode {other:?}"
            ))),
        }
    }
}
