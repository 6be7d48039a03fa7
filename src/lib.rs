// This is free and unencumbered software released into the public domain.

//! Camera view core: size/aspect-ratio negotiation, orientation correction,
//! and a session controller driving pluggable camera backends.

extern crate alloc;

/// Structured logging through `asimov_module::tracing`, compiled out when the
/// `tracing` feature is disabled.
macro_rules! log {
    ($level:ident, $($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        asimov_module::tracing::$level!(target: "asimov_cameraview_module", $($arg)+);
    };
}

pub mod cli;
pub mod shared;
