// This is free and unencumbered software released into the public domain.

mod config;
pub use config::*;

mod controller;
pub use controller::*;

mod driver;
pub use driver::*;

pub mod drivers {
    #[cfg(all(feature = "android", target_os = "android"))]
    pub mod android;

    #[cfg(all(feature = "android", target_os = "android"))]
    pub mod camera2;

    pub mod virtual_camera;
}

mod error;
pub use error::*;

mod event;
pub use event::*;

mod frame;
pub use frame::*;

mod modes;
pub use modes::*;

mod negotiate;
pub use negotiate::*;

mod open;
pub use open::*;

mod orientation;
pub use orientation::*;

mod registry;
pub use registry::*;

mod session;
pub use session::*;

mod size;
pub use size::*;

mod surface;
pub use surface::*;
