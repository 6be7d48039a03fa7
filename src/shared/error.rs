// This is free and unencumbered software released into the public domain.

use super::AspectRatio;
use derive_more::Display;
use std::error::Error as StdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("invalid resolution {width}x{height}")]
    InvalidResolution { width: i64, height: i64 },

    #[error("aspect ratio {0} is not supported")]
    UnsupportedAspectRatio(AspectRatio),

    #[error("no candidate sizes to choose from")]
    NoCandidates,

    #[error("failed to open camera {id}")]
    DeviceOpen {
        id: u32,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("device rejected parameters while {context}")]
    DeviceParameter {
        context: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("a capture is already in progress")]
    CaptureInProgress,

    #[error("no suitable camera backend available")]
    NoDriver,

    #[error("no camera device available")]
    NoCamera,

    #[error("camera is not open")]
    NotOpen,

    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("session closed")]
    Closed,

    #[error("camera device disconnected")]
    Disconnected,

    #[error("driver error while {context}")]
    DriverError {
        context: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("{0}")]
    Other(String),
}

impl CameraError {
    #[inline]
    pub fn driver(context: &'static str, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::DriverError {
            context,
            source: Box::new(source),
        }
    }

    #[inline]
    pub fn device_open(id: u32, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::DeviceOpen {
            id,
            source: Box::new(source),
        }
    }

    #[inline]
    pub fn device_parameter(
        context: &'static str,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::DeviceParameter {
            context,
            source: Box::new(source),
        }
    }

    #[inline]
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    #[inline]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    #[inline]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// How bad a reported failure is for the session.
///
/// Warnings leave the session in its previous valid configuration; errors
/// mean an operation failed outright (and, for opens, that the camera is closed).
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Severity {
    #[display("warning")]
    Warning,
    #[display("error")]
    Error,
}
