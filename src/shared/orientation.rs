// This is free and unencumbered software released into the public domain.

//! Display and capture rotation.
//!
//! The two values differ on purpose. Display rotation turns the live preview
//! so it looks upright on screen; capture rotation is what the persisted
//! picture or recording must be rotated by (EXIF tag, pixel transform or
//! recorder orientation hint, depending on the backend).

use super::{CameraDescriptor, CameraError, Facing};
use core::{fmt, str::FromStr};

/// A right-angle rotation, clockwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: i32) -> Result<Self, CameraError> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(CameraError::invalid_config(format!(
                "rotation must be one of 0, 90, 180, 270; got {other}"
            ))),
        }
    }

    #[inline]
    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    fn wrap(degrees: u32) -> Self {
        match degrees % 360 {
            90 => Rotation::Deg90,
            180 => Rotation::Deg180,
            270 => Rotation::Deg270,
            _ => Rotation::Deg0,
        }
    }

    pub fn is_landscape(&self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.degrees())
    }
}

impl FromStr for Rotation {
    type Err = CameraError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let degrees = input
            .trim()
            .trim_end_matches('°')
            .parse::<i32>()
            .map_err(|_| CameraError::invalid_config(format!("bad rotation {input:?}")))?;
        Rotation::from_degrees(degrees)
    }
}

/// How many degrees the live preview must be rotated for a device held at
/// `device_rotation`.
pub fn display_rotation(camera: &CameraDescriptor, device_rotation: Rotation) -> Rotation {
    let sensor = camera.sensor_orientation.degrees();
    let device = device_rotation.degrees();
    match camera.facing {
        Facing::Front => Rotation::wrap((360 - (sensor + device) % 360) % 360),
        Facing::Back | Facing::External => Rotation::wrap((sensor + 360 - device) % 360),
    }
}

/// How many degrees the captured output must be rotated to view correctly.
pub fn capture_rotation(camera: &CameraDescriptor, device_rotation: Rotation) -> Rotation {
    let sensor = camera.sensor_orientation.degrees();
    let device = device_rotation.degrees();
    match camera.facing {
        Facing::Front => Rotation::wrap((sensor + device) % 360),
        Facing::Back | Facing::External => {
            // Landscape output is flipped half a turn relative to the preview.
            let landscape_flip = if device_rotation.is_landscape() { 180 } else { 0 };
            Rotation::wrap((sensor + 360 - device + landscape_flip) % 360)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROTATIONS: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    fn camera(facing: Facing, sensor: i32) -> CameraDescriptor {
        CameraDescriptor::new(0, facing, Rotation::from_degrees(sensor).unwrap())
    }

    #[test]
    fn front_camera_rotations() {
        let front = camera(Facing::Front, 270);
        assert_eq!(display_rotation(&front, Rotation::Deg0).degrees(), 90);
        assert_eq!(capture_rotation(&front, Rotation::Deg0).degrees(), 270);
    }

    #[test]
    fn back_camera_landscape_flip() {
        let back = camera(Facing::Back, 90);
        assert_eq!(display_rotation(&back, Rotation::Deg90).degrees(), 0);
        assert_eq!(capture_rotation(&back, Rotation::Deg90).degrees(), 180);
    }

    #[test]
    fn back_camera_values_diverge_only_in_landscape() {
        for sensor in [0, 90, 180, 270] {
            let back = camera(Facing::Back, sensor);
            for device in ROTATIONS {
                let display = display_rotation(&back, device).degrees();
                let capture = capture_rotation(&back, device).degrees();
                if device.is_landscape() {
                    assert_ne!(display, capture, "sensor={sensor} device={device}");
                } else {
                    assert_eq!(display, capture, "sensor={sensor} device={device}");
                }
            }
        }
    }

    #[test]
    fn front_camera_display_mirrors_capture() {
        for sensor in [0, 90, 180, 270] {
            let front = camera(Facing::Front, sensor);
            for device in ROTATIONS {
                let display = display_rotation(&front, device).degrees();
                let capture = capture_rotation(&front, device).degrees();
                assert_eq!((display + capture) % 360, 0, "sensor={sensor} device={device}");
            }
        }
    }

    #[test]
    fn external_cameras_follow_back_formula() {
        let external = camera(Facing::External, 0);
        let back = camera(Facing::Back, 0);
        for device in ROTATIONS {
            assert_eq!(display_rotation(&external, device), display_rotation(&back, device));
            assert_eq!(capture_rotation(&external, device), capture_rotation(&back, device));
        }
    }

    #[test]
    fn rejects_non_right_angles() {
        assert!(Rotation::from_degrees(45).is_err());
        assert_eq!("270".parse::<Rotation>().unwrap(), Rotation::Deg270);
    }
}
