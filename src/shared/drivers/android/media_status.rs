// This is free and unencumbered software released into the public domain.

use derive_more::Display;
use ndk_sys::media_status_t;

pub type MediaResult<T = ()> = core::result::Result<T, MediaStatus>;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[display("media status {}", _0.0)]
pub struct MediaStatus(pub(crate) media_status_t);

impl core::error::Error for MediaStatus {}

impl MediaStatus {
    pub(crate) fn check(status: media_status_t) -> MediaResult {
        if status == media_status_t::AMEDIA_OK {
            Ok(())
        } else {
            Err(Self(status))
        }
    }
}

impl From<media_status_t> for MediaStatus {
    fn from(input: media_status_t) -> Self {
        Self(input)
    }
}
