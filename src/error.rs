// SPDX-License-Identifier: MPL-2.0
use crate::scsi::sg::SgIoError;
use std::io;
use thiserror::Error;

/// Errors returned by the pass-through codecs, the SG_IO transport and device discovery.
#[derive(Debug, Error)]
pub enum Error {
    /// The SG_IO call itself could not be issued (bad handle, permission, unsupported ioctl).
    #[error("SG_IO transport call failed: {0}")]
    Io(#[from] io::Error),
    /// The call completed but the info word reported a failure.
    #[error(transparent)]
    Protocol(#[from] SgIoError),
    /// The multiple count must be a power of two between 1 and 128.
    #[error("multiple count {0} is not a power of two in 1..=128")]
    InvalidMultipleCount(u8),
    /// The off-line time code for the given number of seconds does not fit in two bits.
    #[error("off-line time of {0}s does not fit the 2-bit off-line field")]
    InvalidOfflineTime(u8),
    /// A buffer had the wrong size for the structure it should hold.
    #[error("expected a buffer of {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required length in bytes
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },
    /// A device name pattern failed to compile.
    #[error("invalid device name pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
