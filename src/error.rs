// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors for the fallible edges of the crate: validating a
//! configuration that came from outside, and writing frames out.
//! The engine itself has no error paths.

use failure::Fail;
use std::io;

/// Everything that can go wrong outside the engine.
#[derive(Debug, Fail)]
pub enum MandelviewError {
    /// A configuration field is outside its domain.
    #[fail(display = "invalid configuration: {}", _0)]
    InvalidConfig(String),

    /// A surface was asked to save before anything was presented.
    #[fail(display = "no frame has been presented yet")]
    NoFrame,

    /// Writing a frame failed.
    #[fail(display = "could not write frame: {}", _0)]
    Io(#[cause] io::Error),
}

impl From<io::Error> for MandelviewError {
    fn from(err: io::Error) -> MandelviewError {
        MandelviewError::Io(err)
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, MandelviewError>;
