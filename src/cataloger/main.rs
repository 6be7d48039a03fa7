// This is free and unencumbered software released into the public domain.

#[cfg(not(feature = "std"))]
compile_error!("asimov-cameraview-cataloger requires the 'std' feature");

use asimov_cameraview_module::{
    cli,
    shared::{CameraBackend, CameraError, open_driver},
};
use asimov_module::SysexitsError::{self, *};
use clap::Parser;
use clientele::StandardOptions;
use serde_json::json;
use std::error::Error as StdError;

#[derive(Debug, Parser)]
struct Options {
    #[clap(flatten)]
    flags: StandardOptions,

    #[arg(
        value_name = "FORMAT",
        short = 'o',
        long = "output",
        value_enum,
        default_value = "text"
    )]
    output: OutputFormat,

    /// Camera backend to use (default: the best available)
    #[arg(value_name = "BACKEND", short = 'b', long = "backend", value_enum)]
    backend: Option<Backend>,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Jsonl,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Backend {
    Camera2,
    Virtual,
}

impl From<Backend> for CameraBackend {
    fn from(input: Backend) -> Self {
        match input {
            Backend::Camera2 => CameraBackend::Camera2,
            Backend::Virtual => CameraBackend::Virtual,
        }
    }
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

    let exit_code = match run_cataloger(&options) {
        Ok(()) => EX_OK,
        Err(err) => cli::handle_error(&err, &options.flags),
    };

    Ok(exit_code)
}

fn run_cataloger(options: &Options) -> Result<(), CameraError> {
    let mut driver = open_driver(options.backend.map(Into::into))?;
    cli::info_user(
        &options.flags,
        &format!("enumerating cameras with the {} backend", driver.backend()),
    );

    let listings = cli::list_cameras(driver.as_mut(), &options.flags)?;
    if listings.is_empty() {
        cli::warn_user(&options.flags, "no cameras found");
        return Ok(());
    }

    for listing in listings {
        let camera = listing.camera;
        let ratios: Vec<String> = listing.aspect_ratios.iter().map(|r| r.to_string()).collect();
        match options.output {
            OutputFormat::Text => {
                let largest = listing
                    .largest_picture
                    .map(|s| format!(", up to {s}"))
                    .unwrap_or_default();
                println!(
                    "{}: {} camera, sensor {}°, ratios [{}]{}",
                    camera.id,
                    camera.facing,
                    camera.sensor_orientation,
                    ratios.join(", "),
                    largest
                );
            },
            OutputFormat::Jsonl => {
                let flash: Vec<String> = listing.flash_modes.iter().map(|m| m.to_string()).collect();
                let focus: Vec<String> = listing.focus_modes.iter().map(|m| m.to_string()).collect();
                println!(
                    "{}",
                    json!({
                        "id": camera.id,
                        "facing": camera.facing.to_string(),
                        "sensor_orientation": camera.sensor_orientation.degrees(),
                        "aspect_ratios": ratios,
                        "largest_picture": listing.largest_picture.map(|s| s.to_string()),
                        "flash_modes": flash,
                        "focus_modes": focus,
                    })
                );
            },
        }
    }

    Ok(())
}
