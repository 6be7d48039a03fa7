// This is free and unencumbered software released into the public domain.

use super::{CameraBackend, CameraDriver, CameraError, drivers::virtual_camera::VirtualDriver};

/// Opens the best available camera backend, or the `preferred` one.
///
/// On Android with the `android` feature this is camera2 when the platform
/// supports it; everywhere else it is the virtual backend.
pub fn open_driver(preferred: Option<CameraBackend>) -> Result<Box<dyn CameraDriver>, CameraError> {
    match preferred {
        Some(CameraBackend::Virtual) => Ok(Box::new(VirtualDriver::default())),
        Some(CameraBackend::Camera2) => open_camera2(),
        None => open_camera2().or_else(|_error| {
            log!(debug, error = %_error, "falling back to the virtual camera backend");
            Ok(Box::new(VirtualDriver::default()) as Box<dyn CameraDriver>)
        }),
    }
}

fn open_camera2() -> Result<Box<dyn CameraDriver>, CameraError> {
    cfg_if::cfg_if! {
        if #[cfg(all(feature = "android", target_os = "android"))] {
            Ok(Box::new(super::drivers::camera2::Camera2Driver::new()?))
        } else {
            Err(CameraError::NoDriver)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dogma::Named;

    #[test]
    fn virtual_backend_is_always_available() {
        let driver = open_driver(Some(CameraBackend::Virtual)).unwrap();
        assert_eq!(driver.backend(), CameraBackend::Virtual);
        assert_eq!(driver.name(), "virtual");
    }

    #[cfg(not(target_os = "android"))]
    #[test]
    fn falls_back_to_virtual_off_device() {
        assert!(matches!(
            open_driver(Some(CameraBackend::Camera2)),
            Err(CameraError::NoDriver)
        ));
        assert_eq!(open_driver(None).unwrap().backend(), CameraBackend::Virtual);
    }
}
