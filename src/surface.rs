// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Display surfaces.  The engine paints onto anything implementing
//! `Surface`; the window's GL blit lives outside this crate.  The
//! `ImageSurface` here keeps the last frame in memory and can write
//! it out as a binary PPM.
//!
//! Frames follow the `glDrawPixels` convention: row 0 is the bottom
//! row of the picture.

use std::fs::File;
use std::path::Path;

use image::pnm::{PNMEncoder, PNMSubtype, SampleEncoding};
use image::ColorType;

use crate::buffer::PixelFormat;
use crate::error::{MandelviewError, Result};
use crate::planes::{Pixel, Resolution};

/// Something that can show a frame.
pub trait Surface {
    /// Shows `pixels`, laid out as `format` at `resolution`.  The
    /// resolution is the one the frame was computed at, which may lag
    /// behind the window's.
    fn present(&mut self, resolution: Resolution, format: PixelFormat, pixels: &[u8]);
}

/// A presented frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Raster the bytes describe.
    pub resolution: Resolution,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Row-major bytes, bottom row first.
    pub pixels: Vec<u8>,
}

impl Frame {
    /// The bytes of one pixel.
    pub fn pixel(&self, pixel: Pixel) -> &[u8] {
        let channels = self.format.channels();
        let start = (pixel.1 * self.resolution.width + pixel.0) * channels;
        &self.pixels[start..start + channels]
    }

    /// RGB bytes, top row first, alpha dropped.
    pub fn to_rgb_top_down(&self) -> Vec<u8> {
        let channels = self.format.channels();
        let stride = self.resolution.width * channels;
        let mut out = Vec::with_capacity(self.resolution.len() * 3);
        if stride == 0 {
            return out;
        }
        for row in self.pixels.chunks(stride).rev() {
            for px in row.chunks(channels) {
                out.extend_from_slice(&px[..3]);
            }
        }
        out
    }
}

/// Keeps the most recent frame in memory.
#[derive(Debug, Default)]
pub struct ImageSurface {
    frame: Option<Frame>,
    presentations: usize,
}

impl ImageSurface {
    /// An empty surface.
    pub fn new() -> Self {
        ImageSurface::default()
    }

    /// The last frame presented.
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// How many frames were presented.
    pub fn presentations(&self) -> usize {
        self.presentations
    }

    /// Writes the last frame as a binary PPM.
    pub fn save_ppm<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let frame = self.frame.as_ref().ok_or(MandelviewError::NoFrame)?;
        let output = File::create(path)?;
        let mut encoder =
            PNMEncoder::new(output).with_subtype(PNMSubtype::Pixmap(SampleEncoding::Binary));
        encoder.encode(
            &frame.to_rgb_top_down()[..],
            frame.resolution.width as u32,
            frame.resolution.height as u32,
            ColorType::RGB(8),
        )?;
        Ok(())
    }
}

impl Surface for ImageSurface {
    fn present(&mut self, resolution: Resolution, format: PixelFormat, pixels: &[u8]) {
        self.presentations += 1;
        match self.frame.as_mut() {
            Some(frame) => {
                frame.resolution = resolution;
                frame.format = format;
                frame.pixels.clear();
                frame.pixels.extend_from_slice(pixels);
            }
            None => {
                self.frame = Some(Frame {
                    resolution,
                    format,
                    pixels: pixels.to_vec(),
                })
            }
        }
    }
}
