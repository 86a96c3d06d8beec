// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Mandelbrot compute engine
//!
//! The Mandelbrot set is the set of points `c` on the complex plane
//! for which repeatedly squaring and adding, `z <- z^2 + c` starting
//! from zero, never runs away to infinity.  The escape-time picture
//! colors every point outside the set by how quickly it runs away;
//! with a little renormalization that "velocity" becomes a continuous
//! value, and the color bands blend into one another instead of
//! stepping.
//!
//! This crate is the CPU side of an interactive viewer.  The
//! application hands a `ComputeEngine` a `RenderConfig` snapshot on
//! every tick.  Whenever the snapshot changes, the engine cancels
//! whatever it was computing, and restarts on a pool of worker
//! threads that stripe the rows of the picture between them.  The
//! display side can paint the buffer at any moment; while a run is in
//! progress it simply shows the rows that are done so far.

#![deny(missing_docs)]

pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod kernel;
pub mod palette;
pub mod planes;
pub mod run;
pub mod surface;

pub use buffer::{FrameView, PixelBuffer, PixelFormat, Storage};
pub use config::{ConfigHandle, RenderConfig};
pub use engine::{ComputeEngine, EngineOptions, EngineStats};
pub use error::MandelviewError;
pub use planes::{Pixel, Resolution, Vec2, Viewport};
pub use run::{Run, RunOutcome};
pub use surface::{Frame, ImageSurface, Surface};
