// This is free and unencumbered software released into the public domain.

#[cfg(not(feature = "std"))]
compile_error!("asimov-cameraview-snapshot requires the 'std' feature");

use asimov_cameraview_module::{
    cli,
    shared::{
        AspectRatio, CameraBackend, CameraConfig, CameraError, CameraEvent, CameraSession, Facing,
        Flash, Rotation, Severity, channel_sink, open_driver,
    },
};
use asimov_module::SysexitsError::{self, *};
use clap::Parser;
use clientele::StandardOptions;
use std::{
    error::Error as StdError,
    path::PathBuf,
    sync::mpsc::RecvTimeoutError,
    time::{Duration, Instant},
};

#[derive(Debug, Parser)]
struct Options {
    #[clap(flatten)]
    flags: StandardOptions,

    /// Camera facing: back, front or external
    #[arg(short = 'f', long, default_value = "back")]
    facing: Facing,

    /// Aspect ratio, e.g. 4:3 or 16:9
    #[arg(short = 'r', long, default_value = "4:3")]
    ratio: AspectRatio,

    /// Flash mode: off, on, torch, auto or red-eye
    #[arg(long, default_value = "off")]
    flash: Flash,

    /// Device rotation in degrees (0, 90, 180, 270)
    #[arg(long, default_value = "0")]
    rotation: Rotation,

    /// JPEG quality (1-100)
    #[arg(short = 'q', long, default_value = "90")]
    quality: u8,

    /// Skip the focus pass before capturing
    #[arg(long)]
    no_autofocus: bool,

    /// Seconds to wait for the picture
    #[arg(short = 't', long, default_value = "10")]
    timeout: u64,

    /// Use the virtual backend even where a real camera is available
    #[arg(long = "virtual")]
    use_virtual: bool,

    /// Where to write the JPEG
    #[arg(value_name = "OUTPUT", default_value = "snapshot.jpg")]
    output: PathBuf,
}

pub fn main() -> Result<SysexitsError, Box<dyn StdError>> {
    asimov_module::dotenv().ok();
    let args = asimov_module::args_os()?;
    let options = Options::parse_from(args);

    if options.flags.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(EX_OK);
    }

    if options.flags.license {
        print!("{}", include_str!("../../UNLICENSE"));
        return Ok(EX_OK);
    }

    #[cfg(feature = "tracing")]
    asimov_module::init_tracing_subscriber(&options.flags).expect("failed to initialize logging");

    let exit_code = match run_snapshot(&options) {
        Ok(()) => EX_OK,
        Err(err) => cli::handle_error(&err, &options.flags),
    };

    Ok(exit_code)
}

fn run_snapshot(options: &Options) -> Result<(), CameraError> {
    let driver = open_driver(options.use_virtual.then_some(CameraBackend::Virtual))?;
    let config = CameraConfig::new(options.ratio, options.facing)
        .with_flash(options.flash)
        .with_auto_focus(!options.no_autofocus)
        .with_display_rotation(options.rotation)
        .with_jpeg_quality(options.quality);

    let (sink, events) = channel_sink(8);
    let session = CameraSession::spawn_with(driver, sink, config, None)?;
    session.open(options.facing)?;
    session.start_preview()?;
    session.capture()?;

    let deadline = Instant::now() + Duration::from_secs(options.timeout);
    let picture = loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(CameraEvent::PictureTaken(data)) => break data,
            Ok(CameraEvent::Opened { id }) => {
                cli::info_user(&options.flags, &format!("opened camera {id}"));
            },
            Ok(CameraEvent::Error {
                error,
                severity: Severity::Warning,
            }) => cli::warn_user_with_error(&options.flags, "camera warning", &error),
            Ok(CameraEvent::Error { error, .. }) => return Err(error),
            Ok(_) => continue,
            Err(RecvTimeoutError::Timeout) => {
                return Err(CameraError::other("timed out waiting for the picture"));
            },
            Err(RecvTimeoutError::Disconnected) => return Err(CameraError::Closed),
        }
    };

    if let Ok(Some(params)) = session.parameters() {
        cli::info_user(
            &options.flags,
            &format!(
                "captured {} at rotation {}",
                params.picture_size, params.capture_rotation
            ),
        );
    }
    session.shutdown();

    std::fs::write(&options.output, &picture)
        .map_err(|e| CameraError::driver("writing the picture", e))?;
    cli::info_user(
        &options.flags,
        &format!("wrote {} bytes to {}", picture.len(), options.output.display()),
    );
    Ok(())
}
