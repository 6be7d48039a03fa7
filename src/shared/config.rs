// This is free and unencumbered software released into the public domain.

use crate::shared::{AspectRatio, CaptureMode, Facing, Flash, Rotation};
use core::time::Duration;

/// Session settings. Changes made while the camera is closed are kept until
/// the next open; changes made while it is open go through
/// [`CameraController::reconfigure`](super::CameraController::reconfigure).
#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    pub aspect_ratio: AspectRatio,
    pub facing: Facing,
    pub flash: Flash,
    pub auto_focus: bool,
    pub display_rotation: Rotation,
    pub capture_mode: CaptureMode,
    pub jpeg_quality: u8,
    /// How many preview buffers the device may hold at once.
    pub frame_buffer_depth: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::RATIO_4_3,
            facing: Facing::Back,
            flash: Flash::Off,
            auto_focus: true,
            display_rotation: Rotation::Deg0,
            capture_mode: CaptureMode::SingleCapture,
            jpeg_quality: 90,
            frame_buffer_depth: 4,
        }
    }
}

impl CameraConfig {
    pub fn new(aspect_ratio: AspectRatio, facing: Facing) -> Self {
        Self {
            aspect_ratio,
            facing,
            ..Default::default()
        }
    }

    pub fn with_flash(mut self, flash: Flash) -> Self {
        self.flash = flash;
        self
    }

    pub fn with_auto_focus(mut self, enabled: bool) -> Self {
        self.auto_focus = enabled;
        self
    }

    pub fn with_display_rotation(mut self, rotation: Rotation) -> Self {
        self.display_rotation = rotation;
        self
    }

    pub fn with_capture_mode(mut self, mode: CaptureMode) -> Self {
        self.capture_mode = mode;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.min(100);
        self
    }

    pub fn with_frame_buffer_depth(mut self, depth: u8) -> Self {
        self.frame_buffer_depth = depth.max(1);
        self
    }

    /// Overlays every field `change` sets; later writes win.
    pub fn apply(&mut self, change: &ConfigChange) {
        if let Some(ratio) = change.aspect_ratio {
            self.aspect_ratio = ratio;
        }
        if let Some(facing) = change.facing {
            self.facing = facing;
        }
        if let Some(flash) = change.flash {
            self.flash = flash;
        }
        if let Some(auto_focus) = change.auto_focus {
            self.auto_focus = auto_focus;
        }
        if let Some(rotation) = change.display_rotation {
            self.display_rotation = rotation;
        }
        if let Some(mode) = change.capture_mode {
            self.capture_mode = mode;
        }
        if let Some(quality) = change.jpeg_quality {
            self.jpeg_quality = quality.min(100);
        }
    }
}

/// A batch of settings to change together.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ConfigChange {
    pub aspect_ratio: Option<AspectRatio>,
    pub facing: Option<Facing>,
    pub flash: Option<Flash>,
    pub auto_focus: Option<bool>,
    pub display_rotation: Option<Rotation>,
    pub capture_mode: Option<CaptureMode>,
    pub jpeg_quality: Option<u8>,
}

impl ConfigChange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = Some(ratio);
        self
    }

    pub fn facing(mut self, facing: Facing) -> Self {
        self.facing = Some(facing);
        self
    }

    pub fn flash(mut self, flash: Flash) -> Self {
        self.flash = Some(flash);
        self
    }

    pub fn auto_focus(mut self, enabled: bool) -> Self {
        self.auto_focus = Some(enabled);
        self
    }

    pub fn display_rotation(mut self, rotation: Rotation) -> Self {
        self.display_rotation = Some(rotation);
        self
    }

    pub fn capture_mode(mut self, mode: CaptureMode) -> Self {
        self.capture_mode = Some(mode);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = Some(quality);
        self
    }

    /// Folds `later` into `self`, with `later` winning on conflicts.
    pub fn merge(&mut self, later: &ConfigChange) {
        self.aspect_ratio = later.aspect_ratio.or(self.aspect_ratio);
        self.facing = later.facing.or(self.facing);
        self.flash = later.flash.or(self.flash);
        self.auto_focus = later.auto_focus.or(self.auto_focus);
        self.display_rotation = later.display_rotation.or(self.display_rotation);
        self.capture_mode = later.capture_mode.or(self.capture_mode);
        self.jpeg_quality = later.jpeg_quality.or(self.jpeg_quality);
    }

    /// Drops fields that already match `config`.
    pub fn diff(&self, config: &CameraConfig) -> ConfigChange {
        fn changed<T: PartialEq + Copy>(value: Option<T>, current: T) -> Option<T> {
            value.filter(|v| *v != current)
        }
        ConfigChange {
            aspect_ratio: changed(self.aspect_ratio, config.aspect_ratio),
            facing: changed(self.facing, config.facing),
            flash: changed(self.flash, config.flash),
            auto_focus: changed(self.auto_focus, config.auto_focus),
            display_rotation: changed(self.display_rotation, config.display_rotation),
            capture_mode: changed(self.capture_mode, config.capture_mode),
            jpeg_quality: changed(self.jpeg_quality.map(|q| q.min(100)), config.jpeg_quality),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ConfigChange::default()
    }
}

/// Encoder settings for a recording.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoConfig {
    pub frame_rate: u32,
    pub bit_rate: u32,
    pub audio: bool,
    pub max_duration: Option<Duration>,
    pub max_file_size: Option<u64>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            bit_rate: 10_000_000,
            audio: true,
            max_duration: None,
            max_file_size: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_changes_win() {
        let mut pending = ConfigChange::new().flash(Flash::On).facing(Facing::Front);
        pending.merge(&ConfigChange::new().flash(Flash::Torch));
        assert_eq!(pending.flash, Some(Flash::Torch));
        assert_eq!(pending.facing, Some(Facing::Front));

        let mut config = CameraConfig::default();
        config.apply(&pending);
        assert_eq!(config.flash, Flash::Torch);
        assert_eq!(config.facing, Facing::Front);
    }

    #[test]
    fn diff_drops_unchanged_fields() {
        let config = CameraConfig::default();
        let change = ConfigChange::new()
            .aspect_ratio(AspectRatio::RATIO_4_3)
            .flash(Flash::Auto);
        let diff = change.diff(&config);
        assert_eq!(diff, ConfigChange::new().flash(Flash::Auto));
        assert!(ConfigChange::new().facing(Facing::Back).diff(&config).is_empty());
    }

    #[test]
    fn jpeg_quality_is_clamped() {
        assert_eq!(CameraConfig::default().with_jpeg_quality(250).jpeg_quality, 100);
    }

    #[test]
    fn frame_buffer_depth_is_at_least_one() {
        assert_eq!(CameraConfig::default().frame_buffer_depth, 4);
        assert_eq!(CameraConfig::default().with_frame_buffer_depth(0).frame_buffer_depth, 1);
    }
}
