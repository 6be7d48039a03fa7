// This is free and unencumbered software released into the public domain.

//! CLI helpers (error reporting, verbosity handling, camera listing).
//!
//! This module must compile even when the crate feature `cli` is disabled,
//! because the library is built in non-CLI configurations.

#[cfg(feature = "cli")]
use crate::shared::{
    AspectRatio, CameraDescriptor, CameraDriver, CameraError, CameraRegistry, Capabilities,
    DeviceEvents, Flash, FocusMode, Size,
};

#[cfg(feature = "cli")]
use asimov_module::SysexitsError::{self, *};

#[cfg(feature = "cli")]
use clientele::StandardOptions;

#[cfg(feature = "cli")]
pub fn handle_error(err: &CameraError, flags: &StandardOptions) -> SysexitsError {
    #[cfg(feature = "tracing")]
    {
        use asimov_module::tracing::{debug, error};

        error!(target: "asimov_cameraview_module", %err, "camera command failed");

        if flags.debug || flags.verbose >= 2 {
            debug!(target: "asimov_cameraview_module", ?err, "detailed error");
        }
    }

    report_error(err, flags);
    map_error_to_sysexit(err)
}

#[cfg(feature = "cli")]
pub fn info_user(flags: &StandardOptions, msg: &str) {
    if flags.debug || flags.verbose >= 1 {
        eprintln!("INFO: {msg}");
    }

    #[cfg(feature = "tracing")]
    asimov_module::tracing::info!(target: "asimov_cameraview_module", "{msg}");
}

#[cfg(feature = "cli")]
pub fn warn_user(flags: &StandardOptions, msg: &str) {
    if flags.debug || flags.verbose >= 1 {
        eprintln!("WARN: {msg}");
    }

    #[cfg(feature = "tracing")]
    asimov_module::tracing::warn!(target: "asimov_cameraview_module", "{msg}");
}

#[cfg(feature = "cli")]
pub fn warn_user_with_error(flags: &StandardOptions, msg: &str, error: &dyn std::error::Error) {
    if flags.debug || flags.verbose >= 2 {
        eprintln!("WARN: {msg}: {error}");
    } else if flags.verbose >= 1 {
        eprintln!("WARN: {msg}");
    }

    #[cfg(feature = "tracing")]
    asimov_module::tracing::warn!(target: "asimov_cameraview_module", error = %error, "{msg}");
}

#[cfg(feature = "cli")]
fn report_error(err: &CameraError, flags: &StandardOptions) {
    use std::error::Error as _;
    use std::io::Write;

    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "ERROR: {err}");

    if flags.debug || flags.verbose >= 2 {
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = writeln!(stderr, "  Caused by: {}", cause);
            source = cause.source();
        }
    }
}

#[cfg(feature = "cli")]
pub fn map_error_to_sysexit(err: &CameraError) -> SysexitsError {
    match err {
        CameraError::NoDriver | CameraError::Unsupported(_) => EX_UNAVAILABLE,
        CameraError::NoCamera | CameraError::InvalidConfig(_) => EX_USAGE,
        CameraError::InvalidResolution { .. } | CameraError::UnsupportedAspectRatio(_) => {
            EX_USAGE
        },
        CameraError::NoCandidates | CameraError::DeviceParameter { .. } => EX_CONFIG,
        CameraError::DeviceOpen { .. } | CameraError::Disconnected => EX_UNAVAILABLE,
        CameraError::Closed | CameraError::NotOpen => EX_SOFTWARE,
        CameraError::CaptureInProgress | CameraError::IllegalState(_) => EX_SOFTWARE,
        CameraError::DriverError { .. } | CameraError::Other(_) => EX_SOFTWARE,
    }
}

/// One camera with the capabilities it reported when briefly opened.
#[cfg(feature = "cli")]
#[derive(Clone, Debug)]
pub struct CameraListing {
    pub camera: CameraDescriptor,
    pub aspect_ratios: Vec<AspectRatio>,
    pub largest_picture: Option<Size>,
    pub flash_modes: Vec<Flash>,
    pub focus_modes: Vec<FocusMode>,
}

/// Enumerates cameras and opens each one to read its capabilities. Cameras
/// that fail to open are listed without capabilities.
#[cfg(feature = "cli")]
pub fn list_cameras(
    driver: &mut dyn CameraDriver,
    flags: &StandardOptions,
) -> Result<Vec<CameraListing>, CameraError> {
    let registry = CameraRegistry::enumerate(driver)?;
    let mut listings = Vec::with_capacity(registry.cameras().len());
    for &camera in registry.cameras() {
        let caps = match driver.open(camera.id, DeviceEvents::detached()) {
            Ok(mut device) => {
                let caps = Capabilities::query(device.as_ref());
                device.release();
                caps
            },
            Err(err) => {
                warn_user_with_error(flags, &format!("cannot open camera {}", camera.id), &err);
                Capabilities::default()
            },
        };
        let aspect_ratios = caps.aspect_ratios();
        let largest_picture = aspect_ratios
            .iter()
            .filter_map(|ratio| caps.picture_sizes.sizes(ratio).last().copied())
            .max();
        listings.push(CameraListing {
            camera,
            aspect_ratios,
            largest_picture,
            flash_modes: caps.flash_modes,
            focus_modes: caps.focus_modes,
        });
    }
    Ok(listings)
}

// When `cli` is disabled, keep the module linkable without exposing CLI-only types.
#[cfg(not(feature = "cli"))]
#[inline]
pub fn info_user(_msg: &str) {}

#[cfg(not(feature = "cli"))]
#[inline]
pub fn warn_user(_msg: &str) {}
